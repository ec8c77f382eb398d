//! Filesystem batch runner.
//!
//! Sources are loaded and processed independently, in parallel by
//! default. Workers never number regions; the pure
//! [`merge`](markcrop_pipeline::merge) step assigns output indices in
//! source input order once every worker has returned, and only then are
//! the crops written.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use markcrop_pipeline::{PipelineConfig, SourceOutcome, SourceReport};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::BatchError;
use crate::load::load_source;
use crate::persist::{OutputArtifact, OutputFormat, ensure_output_dir, persist_region};

/// Cooperative cancellation flag shared between a batch and its caller.
///
/// Cancelling is checked before each source is loaded and again after
/// it is processed. A source cancelled mid-way contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pipeline configuration shared by every source.
    pub config: PipelineConfig,
    /// Encoding for the written crops.
    pub format: OutputFormat,
    /// Process sources on the rayon pool; `false` runs them in order on
    /// the calling thread.
    pub parallel: bool,
    /// Cancellation flag.
    pub cancel: CancellationToken,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            format: OutputFormat::default(),
            parallel: true,
            cancel: CancellationToken::new(),
        }
    }
}

/// Per-source entry of a batch result.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    /// Source path as given.
    pub path: PathBuf,
    /// Merge report for the source.
    #[serde(flatten)]
    pub report: SourceReport,
}

/// A crop whose index was assigned but whose file could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    /// Index the crop was assigned.
    pub index: usize,
    /// Source the crop came from.
    pub source: usize,
    /// Target path.
    pub path: PathBuf,
    pub message: String,
}

/// Result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// Written crops, ordered by index.
    pub artifacts: Vec<OutputArtifact>,
    /// Crops that could not be written. Their indices are not reused.
    pub write_failures: Vec<WriteFailure>,
    /// One record per source, in input order.
    pub sources: Vec<SourceRecord>,
    /// Whether the run stopped early.
    pub cancelled: bool,
}

impl BatchOutput {
    /// File names of the written crops, in index order.
    #[must_use]
    pub fn file_names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.file_name.as_str()).collect()
    }
}

/// Load and process one source.
fn run_source(index: usize, path: &Path, options: &BatchOptions) -> SourceOutcome {
    if options.cancel.is_cancelled() {
        return SourceOutcome::Cancelled;
    }
    let image = match load_source(path) {
        Ok(image) => image,
        Err(e) => {
            warn!(source = index, error = %e, "skipping source");
            return SourceOutcome::LoadFailed {
                message: e.to_string(),
            };
        }
    };
    debug!(
        source = index,
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded source"
    );

    let regions = markcrop_pipeline::process_image(image, index, &options.config);
    if options.cancel.is_cancelled() {
        return SourceOutcome::Cancelled;
    }
    SourceOutcome::Processed(regions)
}

/// Extract, clean, and write the marked regions of every source.
///
/// Crops are written to `output_dir` (created if missing) as
/// `cropped_<index>.<ext>`, numbered contiguously from 0 in source
/// order. A source that fails to load is skipped and reported, as is a
/// crop that cannot be written; a run with no regions at all is a valid,
/// empty result.
///
/// # Errors
///
/// Returns [`BatchError::InvalidConfig`] before touching the filesystem
/// if the configuration is invalid, and [`BatchError::CreateOutputDir`]
/// if the output directory cannot be created.
pub fn run_batch<P: AsRef<Path> + Sync>(
    sources: &[P],
    output_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchOutput, BatchError> {
    options.config.validate()?;
    ensure_output_dir(output_dir)?;

    let outcomes: Vec<SourceOutcome> = if options.parallel {
        sources
            .par_iter()
            .enumerate()
            .map(|(index, path)| run_source(index, path.as_ref(), options))
            .collect()
    } else {
        sources
            .iter()
            .enumerate()
            .map(|(index, path)| run_source(index, path.as_ref(), options))
            .collect()
    };

    let merged = markcrop_pipeline::merge(outcomes);
    let cancelled = merged.was_cancelled();

    let mut artifacts = Vec::with_capacity(merged.regions.len());
    let mut write_failures = Vec::new();
    for indexed in &merged.regions {
        match persist_region(&indexed.region.image, indexed.index, output_dir, options.format) {
            Ok(artifact) => {
                info!(
                    index = artifact.index,
                    source = indexed.region.source,
                    file = %artifact.file_name,
                    "wrote crop"
                );
                artifacts.push(artifact);
            }
            Err(e) => {
                warn!(index = indexed.index, error = %e, "skipping crop");
                write_failures.push(WriteFailure {
                    index: indexed.index,
                    source: indexed.region.source,
                    path: e.path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    let records: Vec<SourceRecord> = sources
        .iter()
        .zip(merged.reports)
        .map(|(path, report)| SourceRecord {
            path: path.as_ref().to_path_buf(),
            report,
        })
        .collect();

    info!(
        sources = sources.len(),
        crops = artifacts.len(),
        failed_writes = write_failures.len(),
        cancelled,
        "batch finished"
    );

    Ok(BatchOutput {
        artifacts,
        write_failures,
        sources: records,
        cancelled,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_clear_and_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn default_options_run_in_parallel() {
        let options = BatchOptions::default();
        assert!(options.parallel);
        assert_eq!(options.format, OutputFormat::Jpeg);
    }

    #[test]
    fn invalid_config_fails_before_creating_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let options = BatchOptions {
            config: PipelineConfig {
                clahe_tile_size: 0,
                ..PipelineConfig::default()
            },
            ..BatchOptions::default()
        };
        let result = run_batch::<PathBuf>(&[], &out, &options);
        assert!(matches!(result, Err(BatchError::InvalidConfig(_))));
        assert!(!out.exists());
    }

    #[test]
    fn empty_batch_creates_directory_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let output = run_batch::<PathBuf>(&[], &out, &BatchOptions::default()).unwrap();
        assert!(out.is_dir());
        assert!(output.artifacts.is_empty());
        assert!(output.write_failures.is_empty());
        assert!(output.sources.is_empty());
        assert!(!output.cancelled);
    }

    #[test]
    fn pre_cancelled_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let options = BatchOptions::default();
        options.cancel.cancel();
        let sources = [dir.path().join("a.png"), dir.path().join("b.png")];
        let output = run_batch(&sources, dir.path(), &options).unwrap();
        assert!(output.cancelled);
        assert!(output.artifacts.is_empty());
        assert_eq!(output.sources.len(), 2);
    }
}
