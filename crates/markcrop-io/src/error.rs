use std::path::PathBuf;

use markcrop_pipeline::PipelineError;

/// A source image that could not be loaded.
///
/// Load errors are recoverable: the batch skips the source and
/// continues with the next one.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: PipelineError,
    },
}

/// A crop that could not be written.
///
/// Recoverable: the batch records the failure and keeps writing the
/// remaining crops.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct PersistError {
    pub path: PathBuf,
    pub source: image::ImageError,
}

/// A failure that ends a batch run before any source is processed.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    InvalidConfig(#[from] PipelineError),

    #[error("failed to create output directory {}: {source}", path.display())]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}
