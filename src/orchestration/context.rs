//! Replay-safe context handed to a running workflow
//!
//! A workflow only talks to the outside world through this context. Task
//! results and clock readings are recorded in the instance history the first
//! time they are produced and returned verbatim on every replay, so running
//! the same workflow against the same history makes the same decisions.

use super::errors::{OrchestrationError, OrchestrationResult};
use super::events::{emit, EventLogger, OrchestrationEvent};
use super::executor::TaskExecutor;
use super::state::{checkpoint, HistoryStore, RunPhase, RunState, StateMachine};
use super::task::{TaskError, TaskOutcome};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// State shared between a workflow driver and the tasks it dispatched
pub(crate) struct InstanceShared {
    pub(crate) instance_id: String,
    pub(crate) state: Mutex<RunState>,
    pub(crate) store: Arc<dyn HistoryStore>,
    pub(crate) machine: Arc<StateMachine>,
    pub(crate) cancelled: AtomicBool,
}

impl InstanceShared {
    pub(crate) fn new(
        state: RunState,
        store: Arc<dyn HistoryStore>,
        machine: Arc<StateMachine>,
    ) -> Self {
        Self {
            instance_id: state.instance_id.clone(),
            cancelled: AtomicBool::new(state.cancel_requested),
            state: Mutex::new(state),
            store,
            machine,
        }
    }

    /// Seal and persist the state while the caller holds the lock
    pub(crate) async fn persist(&self, state: &mut RunState) -> OrchestrationResult<()> {
        checkpoint::seal(state);
        self.store
            .save(state)
            .await
            .map_err(|e| OrchestrationError::HistoryPersistFailed {
                instance_id: self.instance_id.clone(),
                reason: e.to_string(),
            })
    }

    async fn recorded(&self, task_id: u64, task_name: &str) -> Option<TaskOutcome> {
        let state = self.state.lock().await;
        match state.history.get(&task_id) {
            Some(outcome) if outcome.task_name == task_name => Some(outcome.clone()),
            Some(outcome) => {
                warn!(
                    "History of {} has '{}' at task {} but the workflow scheduled '{}'; re-running",
                    self.instance_id, outcome.task_name, task_id, task_name
                );
                None
            }
            None => None,
        }
    }

    async fn record(&self, outcome: &TaskOutcome) {
        let mut state = self.state.lock().await;
        state.history.insert(outcome.task_id, outcome.clone());
        if let Err(e) = self.persist(&mut state).await {
            // The outcome stays in memory; the next phase change retries the save
            error!("{}", e);
        }
    }

    pub(crate) fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Durable execution context for one orchestration instance
pub struct OrchestrationContext {
    shared: Arc<InstanceShared>,
    executor: Arc<TaskExecutor>,
    events: Option<Arc<EventLogger>>,
    input: Value,
    next_task_id: AtomicU64,
    clock_cursor: AtomicUsize,
}

impl OrchestrationContext {
    pub(crate) fn new(
        shared: Arc<InstanceShared>,
        executor: Arc<TaskExecutor>,
        events: Option<Arc<EventLogger>>,
        input: Value,
    ) -> Self {
        Self {
            shared,
            executor,
            events,
            input,
            next_task_id: AtomicU64::new(0),
            clock_cursor: AtomicUsize::new(0),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.shared.instance_id
    }

    /// Deserialize the instance input
    pub fn input<T: DeserializeOwned>(&self) -> OrchestrationResult<T> {
        serde_json::from_value(self.input.clone()).map_err(|e| OrchestrationError::InvalidInput {
            reason: e.to_string(),
        })
    }

    /// Schedule a task and return a handle resolving to its settled outcome
    ///
    /// The task id is the call sequence number within the instance. When the
    /// history already holds an outcome for that id, it is returned without
    /// running the task again. Otherwise the task starts immediately on the
    /// tokio runtime.
    pub fn call_task(
        &self,
        task_name: impl Into<String>,
        payload: Value,
    ) -> BoxFuture<'static, TaskOutcome> {
        let task_id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        let task_name = task_name.into();
        let shared = self.shared.clone();
        let executor = self.executor.clone();

        let handle = tokio::spawn({
            let task_name = task_name.clone();
            async move {
                if let Some(outcome) = shared.recorded(task_id, &task_name).await {
                    debug!("Replaying task {}#{} from history", task_name, task_id);
                    return outcome;
                }

                let outcome = executor
                    .execute(&shared.instance_id, task_id, &task_name, payload)
                    .await;
                shared.record(&outcome).await;
                outcome
            }
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => TaskOutcome {
                    task_id,
                    task_name,
                    attempts: 1,
                    result: Err(TaskError::permanent(format!("task panicked: {join_error}"))),
                },
            }
        }
        .boxed()
    }

    /// All-of barrier: wait until every task has settled, in call order
    pub async fn wait_all<F>(&self, tasks: Vec<F>) -> Vec<TaskOutcome>
    where
        F: Future<Output = TaskOutcome>,
    {
        join_all(tasks).await
    }

    /// Replay-safe clock
    ///
    /// The n-th reading of an instance is recorded the first time it is taken
    /// and the same instant is returned for the n-th reading of every replay.
    pub async fn current_time(&self) -> OrchestrationResult<DateTime<Utc>> {
        let cursor = self.clock_cursor.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.state.lock().await;

        if let Some(recorded) = state.clock.get(cursor) {
            return Ok(*recorded);
        }

        let now = Utc::now();
        state.clock.push(now);
        self.shared.persist(&mut state).await?;
        Ok(now)
    }

    /// Move the instance to `phase`, persisting the change
    ///
    /// Phases already reached on an earlier execution are accepted silently,
    /// which is what lets a replay walk through them again.
    pub async fn advance(&self, phase: RunPhase) -> OrchestrationResult<()> {
        let mut state = self.shared.state.lock().await;
        let from = state.phase;
        if from >= phase && from != RunPhase::Failed {
            debug!(
                "Instance {} already reached {:?}, replaying {:?}",
                self.shared.instance_id, from, phase
            );
            return Ok(());
        }

        state.transition_to(&self.shared.machine, phase)?;
        self.shared.persist(&mut state).await?;
        drop(state);

        emit(
            self.events.as_deref(),
            OrchestrationEvent::PhaseChanged {
                instance_id: self.shared.instance_id.clone(),
                from,
                to: phase,
            },
        )
        .await;
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Decision point: stop here if cancellation was requested
    pub fn ensure_not_cancelled(&self) -> OrchestrationResult<()> {
        if self.is_cancelled() {
            return Err(OrchestrationError::Cancelled {
                instance_id: self.shared.instance_id.clone(),
            });
        }
        Ok(())
    }
}
