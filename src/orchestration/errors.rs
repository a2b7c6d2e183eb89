//! Structured error types for orchestration
//!
//! Student-level failures never appear here: they are recorded per task and
//! summarised at completion. These errors abort a run or reject a request.

use super::state::RunPhase;
use thiserror::Error;

/// Main error type for orchestration operations
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Instance {instance_id} not found")]
    InstanceNotFound { instance_id: String },

    #[error("No workflow registered under '{name}'")]
    UnknownWorkflow { name: String },

    #[error("No task registered under '{name}'")]
    UnknownTask { name: String },

    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunPhase, to: RunPhase },

    #[error("Instance {instance_id} was cancelled")]
    Cancelled { instance_id: String },

    #[error("Too many students failed: {failed} of {dispatched} (allowed ratio {max_ratio})")]
    FailureThresholdExceeded {
        failed: usize,
        dispatched: usize,
        max_ratio: f64,
    },

    #[error("Writing report '{output_name}' failed after {attempts} attempt(s): {reason}")]
    OutputWriteFailed {
        output_name: String,
        attempts: u32,
        reason: String,
    },

    #[error("Failed to persist history for {instance_id}: {reason}")]
    HistoryPersistFailed { instance_id: String, reason: String },

    #[error("Failed to load history for {instance_id}: {reason}")]
    HistoryLoadFailed { instance_id: String, reason: String },

    #[error("Invalid orchestration input: {reason}")]
    InvalidInput { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid runtime configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Orchestration task for {instance_id} panicked: {reason}")]
    DriverPanicked { instance_id: String, reason: String },
}

impl OrchestrationError {
    /// Whether this error means the instance ended on purpose rather than broke
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for orchestration operations
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
