//! markcrop-pipeline: marker-region detection and cropping (sans-IO).
//!
//! Finds the regions of a photographed page that a reader outlined
//! with a colored marker, crops them, and repaints leftover marker ink
//! white:
//!
//! lighting normalization -> HSV threshold -> closing/opening ->
//! external contours -> area filter -> padded, clamped crop ->
//! marker repaint.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and buffers and returns structured data. Filesystem
//! loading, persistence, and parallel batch execution live in
//! `markcrop-io`. The [`batch`] module holds the pure index-assignment
//! step those runners share.

pub mod batch;
pub mod clahe;
pub mod contour;
pub mod decode;
pub mod detect;
pub mod diagnostics;
pub mod extract;
pub mod mask;
pub mod normalize;
pub mod paint;
pub mod pipeline;
pub mod types;

pub use batch::{IndexedRegion, MergedBatch, SourceOutcome, SourceReport, SourceStatus, merge};
pub use diagnostics::{ImageDiagnostics, StageDiagnostics, StageMetrics};
pub use pipeline::{ImageRegions, Pipeline};
pub use types::{
    BoundingBox, CandidateRegion, ColorBand, Dimensions, ExtractedRegion, GrayImage,
    PipelineConfig, PipelineError, PixelPoint, RegionOrder, RgbImage,
};

/// Run every stage on an already decoded image.
///
/// `source` is the image's position in its batch and is stamped on
/// each region. The configuration is assumed valid.
#[must_use]
pub fn process_image(image: RgbImage, source: usize, config: &PipelineConfig) -> ImageRegions {
    Pipeline::new(image, source, config.clone())
        .normalize()
        .threshold()
        .clean_mask()
        .trace_contours()
        .extract()
        .paint()
        .into_result()
}

/// Decode raw image bytes and run the full pipeline.
///
/// Takes PNG, JPEG, BMP, or WebP bytes. A page without marker regions
/// is not an error: the result simply has no regions.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation, [`PipelineError::EmptyInput`] if `bytes` is empty, and
/// [`PipelineError::ImageDecode`] if the data cannot be decoded.
pub fn process(
    bytes: &[u8],
    source: usize,
    config: &PipelineConfig,
) -> Result<ImageRegions, PipelineError> {
    config.validate()?;
    let image = decode::decode_rgb(bytes)?;
    Ok(process_image(image, source, config))
}
