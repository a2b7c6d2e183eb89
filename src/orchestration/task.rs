//! Task contract between the runtime and task handlers
//!
//! A task receives a JSON payload and either returns a JSON value or a
//! [`TaskError`]. Transient errors are retried by the runtime, permanent ones
//! are recorded after the first attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Whether retrying could change the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// Infrastructure fault or timeout; worth retrying
    Transient,
    /// The payload itself is bad; retrying will fail the same way
    Permanent,
}

/// Error returned by a task handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
    /// Handler-specific structured detail, kept verbatim in the history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl TaskError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: TaskErrorKind::Transient,
            message: message.into(),
            detail: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: TaskErrorKind::Permanent,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind == TaskErrorKind::Transient
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TaskErrorKind::Transient => "transient",
            TaskErrorKind::Permanent => "permanent",
        };
        write!(f, "{} task error: {}", kind, self.message)
    }
}

impl std::error::Error for TaskError {}

/// Settled result of one scheduled task, as recorded in the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Call sequence number within the instance
    pub task_id: u64,
    pub task_name: String,
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub result: Result<Value, TaskError>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// A unit of work the runtime can dispatch
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, payload: Value) -> Result<Value, TaskError>;
}
