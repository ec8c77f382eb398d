//! Region extraction: area filter, inward padding, clamping, and crop.

use image::RgbImage;
use tracing::trace;

use crate::types::{
    BoundingBox, CandidateRegion, Dimensions, ExtractedRegion, PipelineConfig, PixelPoint,
    RegionOrder,
};

/// Result of extracting the candidates of one image.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Surviving regions, in output order.
    pub regions: Vec<ExtractedRegion>,
    /// Candidates dropped for enclosing less than the minimum area.
    pub too_small: usize,
    /// Candidates dropped because padding and clamping left no pixels.
    pub invalid_geometry: usize,
}

/// Axis-aligned bounding rectangle of a contour, or `None` if empty.
#[must_use]
pub fn bounding_box(contour: &[PixelPoint]) -> Option<BoundingBox> {
    let min_x = contour.iter().map(|p| p.x).min()?;
    let max_x = contour.iter().map(|p| p.x).max()?;
    let min_y = contour.iter().map(|p| p.y).min()?;
    let max_y = contour.iter().map(|p| p.y).max()?;
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Shrink `bounds` by `padding` on every side, then clamp it to an image
/// of `dimensions`.
///
/// Returns `None` when the result has no pixels left.
#[must_use]
pub fn pad_and_clamp(
    bounds: BoundingBox,
    padding: u32,
    dimensions: Dimensions,
) -> Option<BoundingBox> {
    let pad = i64::from(padding);
    let x = (i64::from(bounds.x) + pad).max(0);
    let y = (i64::from(bounds.y) + pad).max(0);
    let width = (i64::from(bounds.width) - 2 * pad).min(i64::from(dimensions.width) - x);
    let height = (i64::from(bounds.height) - 2 * pad).min(i64::from(dimensions.height) - y);

    if width <= 0 || height <= 0 {
        return None;
    }

    let clamped = BoundingBox {
        x: u32::try_from(x).ok()?,
        y: u32::try_from(y).ok()?,
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
    };
    clamped.fits_within(dimensions).then_some(clamped)
}

/// Crop the surviving candidates out of `image`.
///
/// Candidates below `config.min_region_area` are dropped first. The
/// rest keep their discovery order unless `config.region_order` asks
/// for reading order, in which case they are sorted by crop corner,
/// top to bottom and then left to right.
#[must_use]
pub fn extract_regions(
    image: &RgbImage,
    candidates: &[CandidateRegion],
    config: &PipelineConfig,
) -> Extraction {
    let dimensions = Dimensions::of(image);
    let mut extraction = Extraction::default();

    for candidate in candidates {
        if candidate.area < config.min_region_area {
            extraction.too_small += 1;
            continue;
        }
        let Some(bounds) = bounding_box(&candidate.contour)
            .and_then(|b| pad_and_clamp(b, config.crop_padding, dimensions))
        else {
            trace!(
                source = candidate.source,
                area = candidate.area,
                "candidate collapsed after padding"
            );
            extraction.invalid_geometry += 1;
            continue;
        };

        let crop = image::imageops::crop_imm(image, bounds.x, bounds.y, bounds.width, bounds.height)
            .to_image();
        extraction.regions.push(ExtractedRegion {
            source: candidate.source,
            bounds,
            contour_area: candidate.area,
            image: crop,
        });
    }

    if config.region_order == RegionOrder::Reading {
        extraction.regions.sort_by_key(|r| (r.bounds.y, r.bounds.x));
    }
    extraction
}
