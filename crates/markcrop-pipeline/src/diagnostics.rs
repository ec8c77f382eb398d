//! Per-image diagnostics: timing and counts for each pipeline stage.
//!
//! Every image run through [`process_image`](crate::process_image)
//! carries an [`ImageDiagnostics`] so batch callers can report where
//! time went and why candidates were dropped.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected while processing one source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDiagnostics {
    /// Stage 1: lighting normalization.
    pub normalize: StageDiagnostics,
    /// Stage 2: HSV thresholding.
    pub threshold: StageDiagnostics,
    /// Stage 3: closing and opening.
    pub morphology: StageDiagnostics,
    /// Stage 4: external contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 5: area filter, padding, clamping, crop.
    pub extraction: StageDiagnostics,
    /// Stage 6: marker repainting inside each crop.
    pub painting: StageDiagnostics,
    /// Total wall-clock duration across all stages (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts.
    pub summary: ImageSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Lighting normalization metrics.
    Normalize {
        /// CLAHE clip limit used.
        clip_limit: f32,
        /// CLAHE tiles per axis.
        tile_grid: u32,
    },
    /// Thresholding metrics.
    Threshold {
        /// Marker pixels in the raw mask.
        marker_pixel_count: u64,
        /// Total pixel count, for computing coverage.
        total_pixel_count: u64,
    },
    /// Morphological cleanup metrics.
    Morphology {
        /// Structuring element side length.
        kernel_size: u32,
        /// Closing passes.
        close_iterations: u32,
        /// Opening passes.
        open_iterations: u32,
        /// Marker pixels before cleanup.
        pixels_before: u64,
        /// Marker pixels after cleanup.
        pixels_after: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// External contours found.
        contour_count: usize,
        /// Largest enclosed area among them (0 if none).
        max_area: f64,
    },
    /// Extraction metrics.
    Extraction {
        /// Regions cropped.
        region_count: usize,
        /// Candidates below the minimum area.
        too_small: usize,
        /// Candidates with no pixels left after padding and clamping.
        invalid_geometry: usize,
    },
    /// Painting metrics.
    Painting {
        /// Crops painted.
        region_count: usize,
        /// Marker pixels repainted white across all crops.
        painted_pixel_count: u64,
    },
}

/// High-level counts for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Candidate regions traced.
    pub candidate_count: usize,
    /// Regions produced.
    pub region_count: usize,
}

impl ImageSummary {
    pub(crate) const fn new(dimensions: Dimensions) -> Self {
        Self {
            image_width: dimensions.width,
            image_height: dimensions.height,
            candidate_count: 0,
            region_count: 0,
        }
    }
}

impl ImageDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Image: {}x{}  |  Total duration: {:.3}ms",
            self.summary.image_width,
            self.summary.image_height,
            duration_ms(self.total_duration),
        ));
        lines.push(format!(
            "{:<18} {:>10} {:>8}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Normalize", &self.normalize),
            ("Threshold", &self.threshold),
            ("Morphology", &self.morphology),
            ("Contour Tracing", &self.contour_tracing),
            ("Extraction", &self.extraction),
            ("Painting", &self.painting),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<18} {ms:>8.3}ms {pct:>7.1}%  {details}"));
        }

        lines.push(format!(
            "Candidates: {}  |  Regions: {}",
            self.summary.candidate_count, self.summary.region_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Normalize {
            clip_limit,
            tile_grid,
        } => format!("clip={clip_limit:.1} grid={tile_grid}x{tile_grid}"),
        StageMetrics::Threshold {
            marker_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixel_count > 0 {
                *marker_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("marker={marker_pixel_count} ({coverage:.2}%)")
        }
        StageMetrics::Morphology {
            kernel_size,
            close_iterations,
            open_iterations,
            pixels_before,
            pixels_after,
        } => format!(
            "k={kernel_size} close={close_iterations} open={open_iterations} px={pixels_before}->{pixels_after}",
        ),
        StageMetrics::ContourTracing {
            contour_count,
            max_area,
        } => format!("{contour_count} contours, max area={max_area:.0}"),
        StageMetrics::Extraction {
            region_count,
            too_small,
            invalid_geometry,
        } => format!("{region_count} regions (too small={too_small} invalid={invalid_geometry})"),
        StageMetrics::Painting {
            region_count,
            painted_pixel_count,
        } => format!("{region_count} crops, {painted_pixel_count} px painted"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> ImageDiagnostics {
        ImageDiagnostics {
            normalize: stage(
                12,
                StageMetrics::Normalize {
                    clip_limit: 3.0,
                    tile_grid: 8,
                },
            ),
            threshold: stage(
                4,
                StageMetrics::Threshold {
                    marker_pixel_count: 1600,
                    total_pixel_count: 40_000,
                },
            ),
            morphology: stage(
                3,
                StageMetrics::Morphology {
                    kernel_size: 3,
                    close_iterations: 1,
                    open_iterations: 1,
                    pixels_before: 1600,
                    pixels_after: 1600,
                },
            ),
            contour_tracing: stage(
                1,
                StageMetrics::ContourTracing {
                    contour_count: 1,
                    max_area: 10_000.0,
                },
            ),
            extraction: stage(
                1,
                StageMetrics::Extraction {
                    region_count: 1,
                    too_small: 0,
                    invalid_geometry: 0,
                },
            ),
            painting: stage(
                2,
                StageMetrics::Painting {
                    region_count: 1,
                    painted_pixel_count: 388,
                },
            ),
            total_duration: Duration::from_millis(23),
            summary: ImageSummary {
                image_width: 200,
                image_height: 200,
                candidate_count: 1,
                region_count: 1,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        for name in [
            "Normalize",
            "Threshold",
            "Morphology",
            "Contour Tracing",
            "Extraction",
            "Painting",
        ] {
            assert!(report.contains(name), "missing {name} in:\n{report}");
        }
        assert!(report.contains("200x200"));
        assert!(report.contains("marker=1600 (4.00%)"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        let total = json["total_duration"].as_f64().unwrap();
        assert!((total - 0.023).abs() < 1e-9);
        let back: ImageDiagnostics = serde_json::from_value(json).unwrap();
        assert!((back.total_duration.as_secs_f64() - 0.023).abs() < 1e-9);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<ImageDiagnostics>(json).is_err());
    }
}
