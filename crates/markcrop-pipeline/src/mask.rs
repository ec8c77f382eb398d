//! Marker masks: HSV thresholding and morphological cleanup.
//!
//! A mask is a [`GrayImage`] aligned 1:1 with its source, where 255
//! marks a marker pixel and 0 is background.
//!
//! Morphology uses a square structuring element. A `k`x`k` square
//! applied `n` times is the same as one pass with a `(k / 2) * n`
//! Chebyshev radius, which is what `imageproc`'s distance-transform
//! based [`dilate`](imageproc::morphology::dilate) and
//! [`erode`](imageproc::morphology::erode) take. Pixels outside the
//! image never count as background, so strokes touching the border do
//! not erode away from it.

use image::{GrayImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use palette::{FromColor, Hsv, Srgb};

use crate::types::ColorBand;

/// Mask value for marker pixels.
pub const FOREGROUND: u8 = 255;

/// Build a binary mask of the pixels whose HSV color lies in `band`.
#[must_use = "returns the binary marker mask"]
pub fn threshold(image: &RgbImage, band: &ColorBand) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        let hsv: Hsv = Hsv::from_color(Srgb::new(p[0], p[1], p[2]).into_format::<f32>());
        let inside = band.contains(
            hsv.hue.into_positive_degrees(),
            hsv.saturation,
            hsv.value,
        );
        image::Luma([if inside { FOREGROUND } else { 0 }])
    })
}

/// Chebyshev radius equivalent to `iterations` passes of a square
/// `kernel_size` element, saturated to what `imageproc` accepts.
fn radius(kernel_size: u32, iterations: u32) -> u8 {
    u8::try_from((kernel_size / 2).saturating_mul(iterations)).unwrap_or(u8::MAX)
}

/// Morphological closing (dilate then erode): fills small gaps in
/// strokes.
#[must_use = "returns the closed mask"]
pub fn close(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let r = radius(kernel_size, iterations);
    if r == 0 {
        return mask.clone();
    }
    morphology::erode(&morphology::dilate(mask, Norm::LInf, r), Norm::LInf, r)
}

/// Morphological opening (erode then dilate): removes isolated specks.
#[must_use = "returns the opened mask"]
pub fn open(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let r = radius(kernel_size, iterations);
    if r == 0 {
        return mask.clone();
    }
    morphology::dilate(&morphology::erode(mask, Norm::LInf, r), Norm::LInf, r)
}

/// Grow a mask by a Chebyshev radius.
#[must_use = "returns the dilated mask"]
pub fn grow(mask: &GrayImage, radius: u32) -> GrayImage {
    let r = u8::try_from(radius).unwrap_or(u8::MAX);
    if r == 0 {
        return mask.clone();
    }
    morphology::dilate(mask, Norm::LInf, r)
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn foreground_count(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] == FOREGROUND)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_with_green_square(size: u32, from: u32, to: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                image::Rgb([0, 200, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        })
    }

    fn filled_mask(size: u32, on: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            image::Luma([if on(x, y) { FOREGROUND } else { 0 }])
        })
    }

    #[test]
    fn threshold_selects_green_only() {
        let img = white_with_green_square(10, 2, 5);
        let mask = threshold(&img, &ColorBand::GREEN);
        assert_eq!(foreground_count(&mask), 9);
        assert_eq!(mask.get_pixel(3, 3).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn threshold_ignores_black_text_and_red_ink() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => image::Rgb([0, 0, 0]),
            1 => image::Rgb([220, 20, 20]),
            2 => image::Rgb([128, 128, 128]),
            _ => image::Rgb([255, 255, 255]),
        });
        let mask = threshold(&img, &ColorBand::GREEN);
        assert_eq!(foreground_count(&mask), 0);
    }

    #[test]
    fn red_band_selects_red_ink() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([220, 20, 20])
            } else {
                image::Rgb([0, 200, 0])
            }
        });
        let mask = threshold(&img, &ColorBand::RED);
        assert_eq!(mask.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn radius_scales_with_iterations() {
        assert_eq!(radius(3, 1), 1);
        assert_eq!(radius(3, 2), 2);
        assert_eq!(radius(5, 3), 6);
        assert_eq!(radius(1, 10), 0);
        assert_eq!(radius(3, u32::MAX), u8::MAX);
    }

    #[test]
    fn open_removes_isolated_speck() {
        let mask = filled_mask(20, |x, y| {
            (x == 3 && y == 3) || ((8..16).contains(&x) && (8..16).contains(&y))
        });
        let opened = open(&mask, 3, 1);
        assert_eq!(opened.get_pixel(3, 3).0[0], 0, "speck should be removed");
        assert_eq!(opened.get_pixel(12, 12).0[0], FOREGROUND);
        assert_eq!(foreground_count(&opened), 64);
    }

    #[test]
    fn close_fills_one_pixel_gap() {
        // Horizontal 3-pixel-thick stroke with a one-column gap at x = 10.
        let mask = filled_mask(20, |x, y| (5..8).contains(&y) && (2..18).contains(&x) && x != 10);
        let closed = close(&mask, 3, 1);
        assert_eq!(closed.get_pixel(10, 6).0[0], FOREGROUND);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mask = filled_mask(8, |x, y| x == y);
        assert_eq!(open(&mask, 1, 3), mask);
        assert_eq!(close(&mask, 3, 0), mask);
        assert_eq!(grow(&mask, 0), mask);
    }

    #[test]
    fn grow_expands_by_radius() {
        let mask = filled_mask(9, |x, y| x == 4 && y == 4);
        let grown = grow(&mask, 1);
        assert_eq!(foreground_count(&grown), 9);
    }

    #[test]
    fn stroke_touching_border_survives_opening() {
        let mask = filled_mask(10, |x, _| x < 3);
        let opened = open(&mask, 3, 1);
        assert_eq!(foreground_count(&opened), 30);
    }
}
