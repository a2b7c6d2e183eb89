//! Durable fan-out/fan-in orchestration
//!
//! The [`Runtime`] drives [`Workflow`]s through an [`OrchestrationContext`]
//! that records every task outcome and clock reading. The grading workflow
//! in [`orchestrator`] is the one registered by the application.

pub mod aggregation;
pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod runtime;
pub mod state;
pub mod task;
pub mod tasks;

pub use aggregation::{aggregate, Aggregate, FailureKind, FailurePolicy, FailureSummary, StudentFailure};
pub use context::OrchestrationContext;
pub use errors::{OrchestrationError, OrchestrationResult};
pub use events::{EventLogger, EventRecord, EventWriter, JsonlEventWriter, OrchestrationEvent};
pub use executor::TaskExecutor;
pub use orchestrator::{GradeWorkflow, GRADE_TASK, GRADE_WORKFLOW, WRITE_OUTPUT_TASK};
pub use retry::{BackoffStrategy, RetryConfig};
pub use runtime::{OrchestrationStarter, RunStatus, Runtime, RuntimeBuilder, RuntimeConfig, Workflow};
pub use state::{
    FileHistoryStore, HistoryStore, InMemoryHistoryStore, RunPhase, RunState, RunSummary,
};
pub use task::{TaskError, TaskErrorKind, TaskHandler, TaskOutcome};
pub use tasks::GradeStudentTask;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input of one grading orchestration
///
/// Built once by the ingestion trigger and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationInput {
    /// Serialized student partitions, in first-appearance order
    pub students: Vec<String>,
    /// Authoritative upload time of the batch
    pub start_time: DateTime<Utc>,
    /// Report name in the output container
    pub output_name: String,
}
