//! Batch ingestion
//!
//! Detects uploaded batches in the input container, splits them by student
//! and starts one grading orchestration per batch.

pub mod partition;
pub mod trigger;
pub mod watcher;

pub use partition::{partition_batch, partition_bytes, PartitionError};
pub use trigger::{output_name_for, IngestionTrigger, TriggerOutcome};

use crate::orchestration::OrchestrationError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised while ingesting a batch
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read artifact '{artifact}': {source}")]
    Storage {
        artifact: String,
        #[source]
        source: StorageError,
    },

    #[error("Artifact '{artifact}' could not be parsed: {source}")]
    Parse {
        artifact: String,
        #[source]
        source: PartitionError,
    },

    #[error("Failed to start orchestration for '{artifact}': {source}")]
    Start {
        artifact: String,
        #[source]
        source: OrchestrationError,
    },

    #[error("Watching is not supported: {0}")]
    Unsupported(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl IngestError {
    /// True for artifact-level parse failures; no orchestration was started
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
