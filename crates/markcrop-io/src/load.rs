use std::path::Path;

use markcrop_pipeline::RgbImage;
use markcrop_pipeline::decode::decode_rgb;

use crate::error::LoadError;

/// Read and decode one source image.
///
/// # Errors
///
/// Returns [`LoadError::Read`] if the file cannot be read and
/// [`LoadError::Decode`] if its contents are empty or not a supported
/// image.
pub fn load_source(path: &Path) -> Result<RgbImage, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_rgb(&bytes).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(
            load_source(&path),
            Err(LoadError::Decode { .. })
        ));
    }

    #[test]
    fn empty_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            load_source(&path),
            Err(LoadError::Decode { .. })
        ));
    }

    #[test]
    fn png_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let img = RgbImage::from_pixel(12, 9, image::Rgb([10, 200, 30]));
        img.save(&path).unwrap();
        let loaded = load_source(&path).unwrap();
        assert_eq!(loaded, img);
    }
}
