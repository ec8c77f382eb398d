//! Region detection: marker mask, morphological cleanup, and candidate
//! discovery on a lighting-normalized image.
//!
//! Each function is one timed stage of [`Pipeline`](crate::Pipeline).
//! Area filtering happens at extraction so the discarded candidates can
//! be counted.

use image::{GrayImage, RgbImage};

use crate::contour;
use crate::mask;
use crate::types::{CandidateRegion, PipelineConfig};

/// Threshold `normalized` against the configured color band.
#[must_use = "returns the raw marker mask"]
pub fn threshold(normalized: &RgbImage, config: &PipelineConfig) -> GrayImage {
    mask::threshold(normalized, &config.color_band)
}

/// Morphological closing then opening with the configured kernel size,
/// `close_iterations` closing passes and `open_iterations` opening
/// passes.
#[must_use = "returns the cleaned mask"]
pub fn clean_mask(raw: &GrayImage, config: &PipelineConfig) -> GrayImage {
    let closed = mask::close(raw, config.morph_kernel_size, config.close_iterations);
    mask::open(&closed, config.morph_kernel_size, config.open_iterations)
}

/// Trace every external contour of `mask` into an unfiltered candidate,
/// in discovery order.
///
/// A mask without foreground pixels yields an empty list without
/// tracing.
#[must_use]
pub fn trace_candidates(mask: &GrayImage, source: usize) -> Vec<CandidateRegion> {
    if mask::foreground_count(mask) == 0 {
        return Vec::new();
    }
    contour::external_contours(mask)
        .into_iter()
        .map(|contour| {
            let area = contour::contour_area(&contour);
            CandidateRegion {
                source,
                contour,
                area,
            }
        })
        .collect()
}
