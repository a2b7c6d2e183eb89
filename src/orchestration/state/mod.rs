//! Orchestration run state
//!
//! The persisted record of one orchestration instance: its phase, its input,
//! every settled task outcome keyed by call sequence number, and every clock
//! reading handed to the workflow. Replaying a workflow against this record
//! must reproduce the same decisions.

pub mod checkpoint;
pub mod persistence;
pub mod transitions;

use crate::orchestration::errors::OrchestrationError;
use crate::orchestration::task::TaskOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub use persistence::{FileHistoryStore, InMemoryHistoryStore};

/// Trait for run state storage implementations
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Save run state, replacing any earlier copy
    async fn save(&self, state: &RunState) -> Result<(), StateError>;

    /// Load run state
    async fn load(&self, instance_id: &str) -> Result<Option<RunState>, StateError>;

    /// List all instance summaries, newest first
    async fn list(&self) -> Result<Vec<RunSummary>, StateError>;
}

/// Phases of a grading orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RunPhase {
    /// Input received
    Started,
    /// Scheduling one task per student
    FanningOut,
    /// Suspended on the all-of barrier
    Waiting,
    /// Building the report and failure summary
    Aggregating,
    /// Persisting the report
    WritingOutput,
    /// Finished successfully
    Completed,
    /// Finished with an unrecoverable error
    Failed,
}

/// Persisted state of one orchestration instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique instance identifier
    pub instance_id: String,
    /// Registered workflow name
    pub workflow: String,
    /// Furthest phase reached
    pub phase: RunPhase,
    /// Workflow input, exactly as started
    pub input: Value,
    /// Settled task outcomes by call sequence number
    #[serde(default)]
    pub history: BTreeMap<u64, TaskOutcome>,
    /// Clock readings handed to the workflow, in order
    #[serde(default)]
    pub clock: Vec<DateTime<Utc>>,
    /// Completion message
    #[serde(default)]
    pub output: Option<String>,
    /// Failure reason when the run ended in `Failed`
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Set once cancellation was requested
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every save
    #[serde(default)]
    pub version: u32,
    /// Integrity checksum over the deterministic fields
    #[serde(default)]
    pub checksum: String,
}

/// Instance summary for listing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub instance_id: String,
    pub workflow: String,
    pub phase: RunPhase,
    pub tasks_settled: usize,
    pub tasks_failed: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// State machine for managing transitions
pub struct StateMachine {
    transitions: HashMap<RunPhase, Vec<RunPhase>>,
}

/// Errors specific to state management
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// State persistence failed
    #[error("Failed to persist state: {0}")]
    PersistenceError(String),

    /// State loading failed
    #[error("Failed to load state: {0}")]
    LoadError(String),

    /// Invalid state transition
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunPhase, to: RunPhase },
}

impl RunState {
    /// Create the initial state for a new instance
    pub fn new(instance_id: String, workflow: String, input: Value) -> Self {
        let now = Utc::now();
        Self {
            instance_id,
            workflow,
            phase: RunPhase::Started,
            input,
            history: BTreeMap::new(),
            clock: Vec::new(),
            output: None,
            failure_reason: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            version: 0,
            checksum: String::new(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            instance_id: self.instance_id.clone(),
            workflow: self.workflow.clone(),
            phase: self.phase,
            tasks_settled: self.history.len(),
            tasks_failed: self.history.values().filter(|o| !o.is_success()).count(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine with valid transitions
    pub fn new() -> Self {
        use RunPhase::*;
        let mut transitions = HashMap::new();

        transitions.insert(Started, vec![FanningOut, Failed]);
        transitions.insert(FanningOut, vec![Waiting, Failed]);
        transitions.insert(Waiting, vec![Aggregating, Failed]);
        transitions.insert(Aggregating, vec![WritingOutput, Failed]);
        transitions.insert(WritingOutput, vec![Completed, Failed]);
        transitions.insert(Completed, vec![]); // Terminal state
        transitions.insert(Failed, vec![]); // Terminal state

        Self { transitions }
    }

    /// Check if a transition is valid
    pub fn is_valid_transition(&self, from: RunPhase, to: RunPhase) -> bool {
        self.transitions
            .get(&from)
            .map(|valid| valid.contains(&to))
            .unwrap_or(false)
    }
}

impl From<StateError> for OrchestrationError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::InvalidTransition { from, to } => {
                OrchestrationError::InvalidTransition { from, to }
            }
            StateError::PersistenceError(reason) => OrchestrationError::HistoryPersistFailed {
                instance_id: String::new(),
                reason,
            },
            StateError::LoadError(reason) => OrchestrationError::HistoryLoadFailed {
                instance_id: String::new(),
                reason,
            },
        }
    }
}
