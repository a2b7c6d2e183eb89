//! Report output
//!
//! Rendering of the aggregated report and its idempotent persistence to the
//! output container.

pub mod report;
pub mod writer;

pub use report::{compare_student_ids, Report, REPORT_HEADER};
pub use writer::{OutputRequest, OutputWriter, WrittenReport};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised while rendering or persisting a report
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to render report: {0}")]
    Render(String),

    #[error("Malformed report data: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
