//! Marker cleanup inside a crop.
//!
//! The padded crop can still contain the inner edge of the marker
//! stroke. The crop is normalized and thresholded on its own, and every
//! masked pixel is painted white. Morphology is skipped so thin stroke
//! remnants at the crop edge are not opened away before they are
//! painted. Painting repeats until the crop is stable.

use image::{GrayImage, Rgb, RgbImage};
use tracing::trace;

use crate::mask;
use crate::normalize::normalize_lighting;
use crate::types::{ExtractedRegion, PipelineConfig};

/// Replacement color for marker pixels.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Mask of the marker pixels in a crop, grown by
/// `config.paint_dilation`.
#[must_use = "returns the painting mask"]
pub fn marker_mask(crop: &RgbImage, config: &PipelineConfig) -> GrayImage {
    let normalized = normalize_lighting(crop, config.clahe_clip_limit, config.clahe_tile_size);
    let raw = mask::threshold(&normalized, &config.color_band);
    mask::grow(&raw, config.paint_dilation)
}

/// Paint every pixel set in `mask` white, in place.
///
/// Returns how many pixels changed color.
pub fn paint_white(crop: &mut RgbImage, mask: &GrayImage) -> u64 {
    let mut changed = 0;
    for (pixel, m) in crop.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == mask::FOREGROUND && *pixel != WHITE {
            *pixel = WHITE;
            changed += 1;
        }
    }
    changed
}

/// Repaint the marker pixels of one crop white.
///
/// Painting shifts the crop's luminance histogram, so the next
/// equalization can lift borderline pixels into the color band. The
/// crop is therefore re-masked and repainted until a pass changes
/// nothing. Every productive pass turns at least one pixel white, which
/// bounds the loop by the pixel count.
///
/// Returns the painted buffer and the number of pixels that changed.
/// Cleaning an already clean crop returns it unchanged with a count of 0.
#[must_use]
pub fn clean_crop(crop: &RgbImage, config: &PipelineConfig) -> (RgbImage, u64) {
    let mut painted = crop.clone();
    let mut total = 0;
    let mut passes = 0u32;
    loop {
        let mask = marker_mask(&painted, config);
        let changed = paint_white(&mut painted, &mask);
        if changed == 0 {
            break;
        }
        total += changed;
        passes += 1;
    }
    if passes > 1 {
        trace!(passes, painted = total, "repainted crop until stable");
    }
    (painted, total)
}

/// Apply [`clean_crop`] to a region's pixels in place.
///
/// Returns the number of pixels painted.
pub fn clean_region(region: &mut ExtractedRegion, config: &PipelineConfig) -> u64 {
    let (painted, count) = clean_crop(&region.image, config);
    region.image = painted;
    count
}
