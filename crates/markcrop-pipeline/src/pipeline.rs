//! Incremental pipeline: advance one image stage by stage, inspecting
//! each intermediate before continuing.
//!
//! ```rust
//! # use markcrop_pipeline::{Pipeline, PipelineConfig, RgbImage};
//! let image = RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
//! let result = Pipeline::new(image, 0, PipelineConfig::default())
//!     .normalize()
//!     .threshold()
//!     .clean_mask()
//!     .trace_contours()
//!     .extract()
//!     .paint()
//!     .into_result();
//! assert!(result.regions.is_empty());
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered. Every stage is timed and its
//! metrics end up in the [`ImageDiagnostics`] of the final result.
//!
//! Stages assume a validated [`PipelineConfig`]; see
//! [`PipelineConfig::validate`].

use std::time::{Duration, Instant};

use tracing::debug;

use crate::diagnostics::{ImageDiagnostics, ImageSummary, StageDiagnostics, StageMetrics};
use crate::extract::Extraction;
use crate::types::{
    BoundingBox, CandidateRegion, Dimensions, ExtractedRegion, GrayImage, PipelineConfig, RgbImage,
};

/// Everything one source image produced.
#[derive(Debug, Clone)]
pub struct ImageRegions {
    /// Cleaned crops in output order.
    pub regions: Vec<ExtractedRegion>,
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Per-stage timing and counts.
    pub diagnostics: ImageDiagnostics,
}

impl ImageRegions {
    /// Crop rectangles of the regions, in output order.
    #[must_use]
    pub fn bounds(&self) -> Vec<BoundingBox> {
        self.regions.iter().map(|r| r.bounds).collect()
    }
}

/// Run `f` and measure how long it took.
fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}

/// State shared by every stage.
struct Context {
    config: PipelineConfig,
    source: usize,
    image: RgbImage,
    dimensions: Dimensions,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct Pending {
    ctx: Context,
}

impl Pending {
    /// The source image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.ctx.image
    }

    /// Equalize lighting and advance to [`Normalized`].
    pub fn normalize(self) -> Normalized {
        let config = &self.ctx.config;
        let (normalized, duration) = timed(|| {
            crate::normalize::normalize_lighting(
                &self.ctx.image,
                config.clahe_clip_limit,
                config.clahe_tile_size,
            )
        });
        let normalize = StageDiagnostics {
            duration,
            metrics: StageMetrics::Normalize {
                clip_limit: config.clahe_clip_limit,
                tile_grid: config.clahe_tile_size,
            },
        };
        Normalized {
            ctx: self.ctx,
            normalized,
            normalize,
        }
    }
}

// ───────────────────────── Stage 1: Normalized ───────────────────────

/// Pipeline state after lighting normalization.
#[must_use = "pipeline stages are consumed by advancing; call .threshold() to continue"]
pub struct Normalized {
    ctx: Context,
    normalized: RgbImage,
    normalize: StageDiagnostics,
}

impl Normalized {
    /// The lighting-normalized image.
    #[must_use]
    pub const fn normalized(&self) -> &RgbImage {
        &self.normalized
    }

    /// Threshold against the marker color band.
    pub fn threshold(self) -> Thresholded {
        let (raw_mask, duration) =
            timed(|| crate::detect::threshold(&self.normalized, &self.ctx.config));
        let marker_pixel_count = crate::mask::foreground_count(&raw_mask);
        let threshold = StageDiagnostics {
            duration,
            metrics: StageMetrics::Threshold {
                marker_pixel_count,
                total_pixel_count: self.ctx.dimensions.pixel_count(),
            },
        };
        Thresholded {
            ctx: self.ctx,
            raw_mask,
            marker_pixel_count,
            normalize: self.normalize,
            threshold,
        }
    }
}

// ───────────────────────── Stage 2: Thresholded ──────────────────────

/// Pipeline state after HSV thresholding.
#[must_use = "pipeline stages are consumed by advancing; call .clean_mask() to continue"]
pub struct Thresholded {
    ctx: Context,
    raw_mask: GrayImage,
    marker_pixel_count: u64,
    normalize: StageDiagnostics,
    threshold: StageDiagnostics,
}

impl Thresholded {
    /// The raw marker mask.
    #[must_use]
    pub const fn raw_mask(&self) -> &GrayImage {
        &self.raw_mask
    }

    /// Close then open the mask.
    pub fn clean_mask(self) -> Cleaned {
        let config = &self.ctx.config;
        let (mask, duration) = timed(|| crate::detect::clean_mask(&self.raw_mask, config));
        let pixels_after = crate::mask::foreground_count(&mask);
        let morphology = StageDiagnostics {
            duration,
            metrics: StageMetrics::Morphology {
                kernel_size: config.morph_kernel_size,
                close_iterations: config.close_iterations,
                open_iterations: config.open_iterations,
                pixels_before: self.marker_pixel_count,
                pixels_after,
            },
        };
        Cleaned {
            ctx: self.ctx,
            mask,
            normalize: self.normalize,
            threshold: self.threshold,
            morphology,
        }
    }
}

// ───────────────────────── Stage 3: Cleaned ──────────────────────────

/// Pipeline state after morphological cleanup.
#[must_use = "pipeline stages are consumed by advancing; call .trace_contours() to continue"]
pub struct Cleaned {
    ctx: Context,
    mask: GrayImage,
    normalize: StageDiagnostics,
    threshold: StageDiagnostics,
    morphology: StageDiagnostics,
}

impl Cleaned {
    /// The cleaned marker mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Trace external contours into candidate regions.
    ///
    /// An empty mask skips tracing and yields no candidates.
    pub fn trace_contours(self) -> Traced {
        let source = self.ctx.source;
        let (candidates, duration) =
            timed(|| crate::detect::trace_candidates(&self.mask, source));
        let max_area = candidates.iter().map(|c| c.area).fold(0.0, f64::max);
        debug!(source, contours = candidates.len(), max_area, "traced contours");
        let contour_tracing = StageDiagnostics {
            duration,
            metrics: StageMetrics::ContourTracing {
                contour_count: candidates.len(),
                max_area,
            },
        };
        Traced {
            ctx: self.ctx,
            candidates,
            normalize: self.normalize,
            threshold: self.threshold,
            morphology: self.morphology,
            contour_tracing,
        }
    }
}

// ───────────────────────── Stage 4: Traced ───────────────────────────

/// Pipeline state after contour tracing.
#[must_use = "pipeline stages are consumed by advancing; call .extract() to continue"]
pub struct Traced {
    ctx: Context,
    candidates: Vec<CandidateRegion>,
    normalize: StageDiagnostics,
    threshold: StageDiagnostics,
    morphology: StageDiagnostics,
    contour_tracing: StageDiagnostics,
}

impl Traced {
    /// Candidate regions in discovery order, before area filtering.
    #[must_use]
    pub fn candidates(&self) -> &[CandidateRegion] {
        &self.candidates
    }

    /// Filter, pad, clamp, and crop the candidates from the source image.
    pub fn extract(self) -> Extracted {
        let (extraction, duration) = timed(|| {
            crate::extract::extract_regions(&self.ctx.image, &self.candidates, &self.ctx.config)
        });
        let extraction_diag = StageDiagnostics {
            duration,
            metrics: StageMetrics::Extraction {
                region_count: extraction.regions.len(),
                too_small: extraction.too_small,
                invalid_geometry: extraction.invalid_geometry,
            },
        };
        Extracted {
            ctx: self.ctx,
            candidate_count: self.candidates.len(),
            extraction,
            normalize: self.normalize,
            threshold: self.threshold,
            morphology: self.morphology,
            contour_tracing: self.contour_tracing,
            extraction_diag,
        }
    }
}

// ───────────────────────── Stage 5: Extracted ────────────────────────

/// Pipeline state after cropping.
#[must_use = "pipeline stages are consumed by advancing; call .paint() to continue"]
pub struct Extracted {
    ctx: Context,
    candidate_count: usize,
    extraction: Extraction,
    normalize: StageDiagnostics,
    threshold: StageDiagnostics,
    morphology: StageDiagnostics,
    contour_tracing: StageDiagnostics,
    extraction_diag: StageDiagnostics,
}

impl Extracted {
    /// Crops before marker repainting.
    #[must_use]
    pub fn regions(&self) -> &[ExtractedRegion] {
        &self.extraction.regions
    }

    /// Repaint leftover marker pixels in every crop.
    pub fn paint(self) -> Painted {
        let config = &self.ctx.config;
        let mut regions = self.extraction.regions;
        let (painted_pixel_count, duration) = timed(|| {
            regions
                .iter_mut()
                .map(|region| crate::paint::clean_region(region, config))
                .sum::<u64>()
        });
        let painting = StageDiagnostics {
            duration,
            metrics: StageMetrics::Painting {
                region_count: regions.len(),
                painted_pixel_count,
            },
        };
        Painted {
            ctx: self.ctx,
            candidate_count: self.candidate_count,
            regions,
            normalize: self.normalize,
            threshold: self.threshold,
            morphology: self.morphology,
            contour_tracing: self.contour_tracing,
            extraction: self.extraction_diag,
            painting,
        }
    }
}

// ───────────────────────── Stage 6: Painted ──────────────────────────

/// Final pipeline state.
pub struct Painted {
    ctx: Context,
    candidate_count: usize,
    regions: Vec<ExtractedRegion>,
    normalize: StageDiagnostics,
    threshold: StageDiagnostics,
    morphology: StageDiagnostics,
    contour_tracing: StageDiagnostics,
    extraction: StageDiagnostics,
    painting: StageDiagnostics,
}

impl Painted {
    /// Cleaned crops in output order.
    #[must_use]
    pub fn regions(&self) -> &[ExtractedRegion] {
        &self.regions
    }

    /// Consume the pipeline, assembling the regions and diagnostics.
    #[must_use]
    pub fn into_result(self) -> ImageRegions {
        let total_duration: Duration = [
            &self.normalize,
            &self.threshold,
            &self.morphology,
            &self.contour_tracing,
            &self.extraction,
            &self.painting,
        ]
        .iter()
        .map(|s| s.duration)
        .sum();

        let summary = ImageSummary {
            candidate_count: self.candidate_count,
            region_count: self.regions.len(),
            ..ImageSummary::new(self.ctx.dimensions)
        };
        debug!(
            source = self.ctx.source,
            regions = self.regions.len(),
            "image processed"
        );

        ImageRegions {
            regions: self.regions,
            dimensions: self.ctx.dimensions,
            diagnostics: ImageDiagnostics {
                normalize: self.normalize,
                threshold: self.threshold,
                morphology: self.morphology,
                contour_tracing: self.contour_tracing,
                extraction: self.extraction,
                painting: self.painting,
                total_duration,
                summary,
            },
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental region-extraction pipeline for one decoded image.
///
/// `source` is the image's position in its batch; it is stamped on
/// every candidate and region.
pub struct Pipeline;

impl Pipeline {
    /// Store the image and config without processing anything.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: RgbImage, source: usize, config: PipelineConfig) -> Pending {
        let dimensions = Dimensions::of(&image);
        Pending {
            ctx: Context {
                config,
                source,
                image,
                dimensions,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page_with_ring() -> RgbImage {
        RgbImage::from_fn(120, 120, |x, y| {
            let inside = (20..=90).contains(&x) && (20..=90).contains(&y);
            let hollow = (24..=86).contains(&x) && (24..=86).contains(&y);
            if inside && !hollow {
                image::Rgb([0, 190, 30])
            } else {
                image::Rgb([250, 250, 250])
            }
        })
    }

    #[test]
    fn intermediates_are_inspectable() {
        let pending = Pipeline::new(page_with_ring(), 3, PipelineConfig::default());
        assert_eq!(pending.image().dimensions(), (120, 120));

        let normalized = pending.normalize();
        assert_eq!(normalized.normalized().dimensions(), (120, 120));

        let thresholded = normalized.threshold();
        assert!(crate::mask::foreground_count(thresholded.raw_mask()) > 0);

        let traced = thresholded.clean_mask().trace_contours();
        assert_eq!(traced.candidates().len(), 1);
        assert_eq!(traced.candidates()[0].source, 3);

        let extracted = traced.extract();
        assert_eq!(extracted.regions().len(), 1);

        let painted = extracted.paint();
        assert_eq!(painted.regions().len(), 1);
    }

    #[test]
    fn diagnostics_total_is_sum_of_stages() {
        let result = Pipeline::new(page_with_ring(), 0, PipelineConfig::default())
            .normalize()
            .threshold()
            .clean_mask()
            .trace_contours()
            .extract()
            .paint()
            .into_result();
        let d = &result.diagnostics;
        let sum = d.normalize.duration
            + d.threshold.duration
            + d.morphology.duration
            + d.contour_tracing.duration
            + d.extraction.duration
            + d.painting.duration;
        assert_eq!(d.total_duration, sum);
        assert_eq!(d.summary.candidate_count, 1);
        assert_eq!(d.summary.region_count, 1);
        assert!(matches!(
            d.extraction.metrics,
            StageMetrics::Extraction {
                region_count: 1,
                too_small: 0,
                invalid_geometry: 0
            }
        ));
    }

    #[test]
    fn blank_page_skips_tracing() {
        let image = RgbImage::from_pixel(40, 30, image::Rgb([255, 255, 255]));
        let result = Pipeline::new(image, 0, PipelineConfig::default())
            .normalize()
            .threshold()
            .clean_mask()
            .trace_contours()
            .extract()
            .paint()
            .into_result();
        assert!(result.regions.is_empty());
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 40,
                height: 30
            }
        );
    }
}
