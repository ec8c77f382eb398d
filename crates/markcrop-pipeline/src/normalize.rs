//! Lighting normalization in CIE L\*a\*b\*.
//!
//! Scans of the same marker vary in brightness across the page, which
//! moves pixels in and out of a fixed HSV band. Equalizing only the
//! lightness channel with [CLAHE](crate::clahe) evens out exposure while
//! leaving the chroma axes, and therefore hue relationships, untouched.
//!
//! L\* (0-100) is quantized to 8 bits for equalization; a\* and b\* stay
//! in floating point through the round trip.

use image::{GrayImage, RgbImage};
use palette::{FromColor, Lab, Srgb};

use crate::types::unit_to_u8;

/// Scale between L\* (0-100) and the 8-bit lightness channel.
const L_SCALE: f32 = 255.0 / 100.0;

/// Equalize the lightness of an RGB image.
///
/// Converts every pixel to L\*a\*b\* (D65), runs CLAHE with the given
/// clip limit and tile grid on L\* only, and converts back to sRGB,
/// clamping out-of-gamut results. The output has the same dimensions
/// as the input; the input is not modified.
#[must_use = "returns the normalized image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_lighting(image: &RgbImage, clip_limit: f32, tile_grid: u32) -> RgbImage {
    let (width, height) = image.dimensions();

    let lab: Vec<Lab> = image
        .pixels()
        .map(|p| Lab::from_color(Srgb::new(p.0[0], p.0[1], p.0[2]).into_format::<f32>()))
        .collect();

    let lightness = GrayImage::from_fn(width, height, |x, y| {
        let l = lab[pixel_index(width, x, y)].l;
        image::Luma([(l * L_SCALE).round().clamp(0.0, 255.0) as u8])
    });

    let equalized = crate::clahe::equalize(&lightness, clip_limit, tile_grid);

    RgbImage::from_fn(width, height, |x, y| {
        let original = lab[pixel_index(width, x, y)];
        let l = f32::from(equalized.get_pixel(x, y).0[0]) / L_SCALE;
        let rgb: Srgb = Srgb::from_color(Lab::new(l, original.a, original.b));
        image::Rgb([
            unit_to_u8(rgb.red),
            unit_to_u8(rgb.green),
            unit_to_u8(rgb.blue),
        ])
    })
}

/// Row-major index of pixel `(x, y)`.
const fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}
