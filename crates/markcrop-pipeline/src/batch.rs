//! Deterministic merge of per-source results into one numbered batch.
//!
//! Sources may be processed in any order, on any number of threads.
//! Output indices are assigned only here, by walking the outcomes in
//! source input order, so the numbering never depends on completion
//! order: every region of source `i` is numbered before any region of
//! source `i + 1`, and indices are contiguous from 0.

use serde::Serialize;

use crate::diagnostics::ImageDiagnostics;
use crate::pipeline::ImageRegions;
use crate::types::{BoundingBox, ExtractedRegion};

/// What happened to one source before the merge.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// The source was decoded and run through the pipeline.
    Processed(ImageRegions),
    /// The source could not be read or decoded; it contributes nothing.
    LoadFailed {
        /// Human-readable load error.
        message: String,
    },
    /// Work on the source was abandoned by cancellation.
    Cancelled,
}

/// Per-source status after the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// At least one region was produced.
    Regions {
        /// Number of regions.
        count: usize,
    },
    /// The source was processed but no region survived.
    NoRegions,
    /// The source could not be loaded.
    LoadFailed {
        /// Human-readable load error.
        message: String,
    },
    /// The source was not merged because the batch was cancelled.
    Cancelled,
}

/// Merge report for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    /// Position of the source in the batch input.
    pub source: usize,
    /// Outcome of the source.
    #[serde(flatten)]
    pub status: SourceStatus,
    /// Crop rectangles of the source's regions, in output order.
    pub bounds: Vec<BoundingBox>,
    /// Stage diagnostics, when the source was processed.
    pub diagnostics: Option<ImageDiagnostics>,
}

/// A region with its batch-wide output index.
#[derive(Debug, Clone)]
pub struct IndexedRegion {
    /// Sequential output index.
    pub index: usize,
    /// The cleaned crop.
    pub region: ExtractedRegion,
}

/// Result of merging every source of a batch.
#[derive(Debug, Clone, Default)]
pub struct MergedBatch {
    /// All regions, ordered by output index.
    pub regions: Vec<IndexedRegion>,
    /// One report per source, in input order.
    pub reports: Vec<SourceReport>,
}

impl MergedBatch {
    /// Whether the merge stopped early because of cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.reports
            .iter()
            .any(|r| r.status == SourceStatus::Cancelled)
    }
}

/// Hands out output indices for a single batch.
#[derive(Debug, Default)]
struct RegionCounter {
    next: usize,
}

impl RegionCounter {
    fn assign(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Number the regions of `outcomes`, which must be in source input
/// order.
///
/// The merge stops at the first cancelled source: that source and every
/// later one are reported as cancelled and contribute no regions, so
/// the result is always a complete prefix of the batch.
#[must_use]
pub fn merge(outcomes: Vec<SourceOutcome>) -> MergedBatch {
    let mut counter = RegionCounter::default();
    let mut merged = MergedBatch::default();
    let mut cancelled = false;

    for (source, outcome) in outcomes.into_iter().enumerate() {
        if cancelled || matches!(outcome, SourceOutcome::Cancelled) {
            cancelled = true;
            merged.reports.push(SourceReport {
                source,
                status: SourceStatus::Cancelled,
                bounds: Vec::new(),
                diagnostics: None,
            });
            continue;
        }

        match outcome {
            SourceOutcome::Processed(image) => {
                let bounds = image.bounds();
                let status = if image.regions.is_empty() {
                    SourceStatus::NoRegions
                } else {
                    SourceStatus::Regions {
                        count: image.regions.len(),
                    }
                };
                merged
                    .regions
                    .extend(image.regions.into_iter().map(|region| IndexedRegion {
                        index: counter.assign(),
                        region,
                    }));
                merged.reports.push(SourceReport {
                    source,
                    status,
                    bounds,
                    diagnostics: Some(image.diagnostics),
                });
            }
            SourceOutcome::LoadFailed { message } => {
                merged.reports.push(SourceReport {
                    source,
                    status: SourceStatus::LoadFailed { message },
                    bounds: Vec::new(),
                    diagnostics: None,
                });
            }
            SourceOutcome::Cancelled => {}
        }
    }

    merged
}
