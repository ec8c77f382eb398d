//! markcrop-io: filesystem boundary for the markcrop pipeline.
//!
//! Loads source images from disk, runs
//! [`markcrop_pipeline`] over them (in parallel with `rayon`), and
//! writes the cleaned crops under deterministic sequential names.
//! All image processing stays in the pure pipeline crate.

pub mod batch;
pub mod error;
pub mod load;
pub mod persist;

pub use batch::{
    BatchOptions, BatchOutput, CancellationToken, SourceRecord, WriteFailure, run_batch,
};
pub use error::{BatchError, LoadError, PersistError};
pub use load::load_source;
pub use persist::{OutputArtifact, OutputFormat, artifact_name};
