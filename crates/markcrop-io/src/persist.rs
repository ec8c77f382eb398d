//! Crop persistence and output naming.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use markcrop_pipeline::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, PersistError};

/// Encoding used for persisted crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Baseline JPEG at [`OutputFormat::JPEG_QUALITY`].
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl OutputFormat {
    /// JPEG quality used for crops.
    pub const JPEG_QUALITY: u8 = 95;

    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// A crop written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifact {
    /// Sequential output index.
    pub index: usize,
    /// File name inside the output directory.
    pub file_name: String,
    /// Full path of the written file.
    pub path: PathBuf,
}

/// File name for the crop with output index `index`.
#[must_use]
pub fn artifact_name(index: usize, format: OutputFormat) -> String {
    format!("cropped_{index}.{}", format.extension())
}

/// Create `dir` and its parents if missing.
///
/// # Errors
///
/// Returns [`BatchError::CreateOutputDir`] if the directory cannot be
/// created.
pub fn ensure_output_dir(dir: &Path) -> Result<(), BatchError> {
    std::fs::create_dir_all(dir).map_err(|source| BatchError::CreateOutputDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Encode `image` into `dir` under its sequential name.
///
/// # Errors
///
/// Returns [`PersistError`] if the file cannot be created or encoded.
pub fn persist_region(
    image: &RgbImage,
    index: usize,
    dir: &Path,
    format: OutputFormat,
) -> Result<OutputArtifact, PersistError> {
    let file_name = artifact_name(index, format);
    let path = dir.join(&file_name);
    write_image(image, &path, format).map_err(|source| PersistError {
        path: path.clone(),
        source,
    })?;
    Ok(OutputArtifact {
        index,
        file_name,
        path,
    })
}

fn write_image(image: &RgbImage, path: &Path, format: OutputFormat) -> image::ImageResult<()> {
    let mut writer = BufWriter::new(File::create(path).map_err(image::ImageError::IoError)?);
    match format {
        OutputFormat::Jpeg => image.write_with_encoder(JpegEncoder::new_with_quality(
            &mut writer,
            OutputFormat::JPEG_QUALITY,
        ))?,
        OutputFormat::Png => image.write_with_encoder(PngEncoder::new(&mut writer))?,
    }
    writer.flush().map_err(image::ImageError::IoError)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sequential_and_follow_format() {
        assert_eq!(artifact_name(0, OutputFormat::Jpeg), "cropped_0.jpg");
        assert_eq!(artifact_name(12, OutputFormat::Png), "cropped_12.png");
    }

    #[test]
    fn ensure_output_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        ensure_output_dir(&out).unwrap();
        ensure_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn output_dir_under_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_output_dir(&file.join("sub")),
            Err(BatchError::CreateOutputDir { .. })
        ));
    }

    #[test]
    fn png_crop_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let crop = RgbImage::from_fn(7, 5, |x, y| {
            image::Rgb([u8::try_from(x * 30).unwrap(), u8::try_from(y * 40).unwrap(), 9])
        });
        let artifact = persist_region(&crop, 3, dir.path(), OutputFormat::Png).unwrap();
        assert_eq!(artifact.index, 3);
        assert_eq!(artifact.file_name, "cropped_3.png");
        let back = image::open(&artifact.path).unwrap().to_rgb8();
        assert_eq!(back, crop);
    }

    #[test]
    fn jpeg_crop_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let crop = RgbImage::from_pixel(33, 21, image::Rgb([240, 240, 240]));
        let artifact = persist_region(&crop, 0, dir.path(), OutputFormat::Jpeg).unwrap();
        assert!(artifact.path.ends_with("cropped_0.jpg"));
        let back = image::open(&artifact.path).unwrap();
        assert_eq!((back.width(), back.height()), (33, 21));
    }

    #[test]
    fn missing_directory_fails_to_persist() {
        let dir = tempfile::tempdir().unwrap();
        let crop = RgbImage::new(2, 2);
        let result = persist_region(&crop, 0, &dir.path().join("absent"), OutputFormat::Png);
        let err = result.unwrap_err();
        assert!(err.path.ends_with("cropped_0.png"));
    }
}
