//! Local durable execution runtime
//!
//! Starts workflow instances, drives them on the tokio runtime, persists
//! their history after every decision, and resumes them from that history
//! after a crash. A resumed instance replays its workflow from the top;
//! recorded task outcomes and clock readings make the replay converge on the
//! point where the previous execution stopped.

use super::context::{InstanceShared, OrchestrationContext};
use super::errors::{OrchestrationError, OrchestrationResult};
use super::events::{emit, EventLogger, OrchestrationEvent};
use super::executor::TaskExecutor;
use super::retry::RetryConfig;
use super::state::{checkpoint, HistoryStore, RunPhase, RunState, RunSummary, StateMachine};
use super::task::TaskHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding one history file per instance
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Maximum number of task attempts running at once
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    /// Timeout for a single task attempt
    #[serde(default = "default_task_timeout", with = "humantime_serde")]
    pub task_timeout: Duration,

    /// Retry policy for grading tasks
    #[serde(default)]
    pub retry: RetryConfig,

    /// Retry policy for the report write
    #[serde(default = "RetryConfig::for_output")]
    pub output_retry: RetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            max_parallel_tasks: default_max_parallel_tasks(),
            task_timeout: default_task_timeout(),
            retry: RetryConfig::default(),
            output_retry: RetryConfig::for_output(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    crate::config::default_data_dir().join("state")
}

fn default_max_parallel_tasks() -> usize {
    10
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(60)
}

/// A workflow definition the runtime can drive
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Run to completion, returning the completion message
    ///
    /// Must be deterministic given the context: all I/O goes through
    /// `call_task` and all time through `current_time`.
    async fn run(&self, ctx: &OrchestrationContext) -> OrchestrationResult<String>;
}

/// Anything that can start an orchestration instance
#[async_trait]
pub trait OrchestrationStarter: Send + Sync {
    async fn start(&self, workflow: &str, input: Value) -> OrchestrationResult<String>;
}

/// Externally visible status of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running { instance_id: String, phase: RunPhase },
    Completed { instance_id: String, message: String },
    Failed { instance_id: String, reason: String },
}

impl RunStatus {
    pub fn from_state(state: &RunState) -> Self {
        let instance_id = state.instance_id.clone();
        match state.phase {
            RunPhase::Completed => RunStatus::Completed {
                instance_id,
                message: state.output.clone().unwrap_or_default(),
            },
            RunPhase::Failed => RunStatus::Failed {
                instance_id,
                reason: state
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "unknown reason".to_string()),
            },
            phase => RunStatus::Running { instance_id, phase },
        }
    }

    pub fn instance_id(&self) -> &str {
        match self {
            RunStatus::Running { instance_id, .. }
            | RunStatus::Completed { instance_id, .. }
            | RunStatus::Failed { instance_id, .. } => instance_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running { .. })
    }
}

struct RunningInstance {
    shared: Arc<InstanceShared>,
    done: watch::Receiver<Option<RunStatus>>,
}

/// Builder for [`Runtime`]
pub struct RuntimeBuilder {
    store: Arc<dyn HistoryStore>,
    max_parallel_tasks: usize,
    task_timeout: Duration,
    tasks: Vec<(String, Arc<dyn TaskHandler>, RetryConfig)>,
    workflows: HashMap<String, Arc<dyn Workflow>>,
    events: Option<Arc<EventLogger>>,
}

impl RuntimeBuilder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            max_parallel_tasks: default_max_parallel_tasks(),
            task_timeout: default_task_timeout(),
            tasks: Vec::new(),
            workflows: HashMap::new(),
            events: None,
        }
    }

    pub fn max_parallel_tasks(mut self, max_parallel_tasks: usize) -> Self {
        self.max_parallel_tasks = max_parallel_tasks;
        self
    }

    pub fn task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub fn task(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        retry: RetryConfig,
    ) -> Self {
        self.tasks.push((name.into(), handler, retry));
        self
    }

    pub fn workflow(mut self, name: impl Into<String>, workflow: Arc<dyn Workflow>) -> Self {
        self.workflows.insert(name.into(), workflow);
        self
    }

    pub fn events(mut self, events: Arc<EventLogger>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> OrchestrationResult<Runtime> {
        if self.max_parallel_tasks == 0 {
            return Err(OrchestrationError::InvalidConfiguration {
                reason: "max_parallel_tasks must be at least 1".to_string(),
            });
        }
        if self.task_timeout.is_zero() {
            return Err(OrchestrationError::InvalidConfiguration {
                reason: "task_timeout must be greater than zero".to_string(),
            });
        }

        let mut executor = TaskExecutor::new(self.max_parallel_tasks, self.task_timeout);
        if let Some(events) = &self.events {
            executor = executor.with_events(events.clone());
        }
        for (name, handler, retry) in self.tasks {
            executor.register(name, handler, retry);
        }

        Ok(Runtime {
            store: self.store,
            executor: Arc::new(executor),
            workflows: self.workflows,
            events: self.events,
            machine: Arc::new(StateMachine::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

/// Durable orchestration runtime
pub struct Runtime {
    store: Arc<dyn HistoryStore>,
    executor: Arc<TaskExecutor>,
    workflows: HashMap<String, Arc<dyn Workflow>>,
    events: Option<Arc<EventLogger>>,
    machine: Arc<StateMachine>,
    running: Arc<Mutex<HashMap<String, RunningInstance>>>,
}

impl Runtime {
    pub fn builder(store: Arc<dyn HistoryStore>) -> RuntimeBuilder {
        RuntimeBuilder::new(store)
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Persist a new instance and start driving it
    pub async fn start(&self, workflow_name: &str, input: Value) -> OrchestrationResult<String> {
        let workflow = self.workflow(workflow_name)?;
        let instance_id = Uuid::new_v4().to_string();

        let state = RunState::new(instance_id.clone(), workflow_name.to_string(), input);
        let shared = Arc::new(InstanceShared::new(
            state,
            self.store.clone(),
            self.machine.clone(),
        ));
        {
            let mut state = shared.state.lock().await;
            shared.persist(&mut state).await?;
        }

        info!("Started instance {} of workflow {}", instance_id, workflow_name);
        emit(
            self.events.as_deref(),
            OrchestrationEvent::InstanceStarted {
                instance_id: instance_id.clone(),
                workflow: workflow_name.to_string(),
            },
        )
        .await;

        let done_tx = register(&mut *self.running.lock().await, &shared);
        self.spawn_driver(workflow, shared, done_tx).await;
        Ok(instance_id)
    }

    /// Reload an instance's history and replay it to completion
    ///
    /// Returns the current status. Resuming a finished instance changes
    /// nothing; resuming one that is already being driven in this process
    /// reports its progress.
    pub async fn resume(&self, instance_id: &str) -> OrchestrationResult<RunStatus> {
        // Held until the driver is registered so concurrent resumes start one driver
        let mut running = self.running.lock().await;
        if let Some(shared) = running.get(instance_id).map(|r| r.shared.clone()) {
            drop(running);
            let state = shared.state.lock().await;
            return Ok(RunStatus::from_state(&state));
        }

        let state = self.load(instance_id).await?;
        if !state.can_resume() {
            info!(
                "Instance {} already finished: {}",
                instance_id,
                state.status_string()
            );
            return Ok(RunStatus::from_state(&state));
        }

        let workflow = self.workflow(&state.workflow)?;
        let settled_tasks = state.history.len();
        let phase = state.phase;
        let status = RunStatus::from_state(&state);
        let shared = Arc::new(InstanceShared::new(
            state,
            self.store.clone(),
            self.machine.clone(),
        ));
        let done_tx = register(&mut running, &shared);
        drop(running);

        info!(
            "Resuming instance {} from {:?} with {} settled task(s)",
            instance_id, phase, settled_tasks
        );
        emit(
            self.events.as_deref(),
            OrchestrationEvent::InstanceResumed {
                instance_id: instance_id.to_string(),
                settled_tasks,
            },
        )
        .await;

        self.spawn_driver(workflow, shared, done_tx).await;
        Ok(status)
    }

    /// Request cancellation
    ///
    /// A running instance stops at its next decision point and ends in
    /// `Failed` with reason "cancelled". An instance with no driver in this
    /// process is failed immediately.
    pub async fn cancel(&self, instance_id: &str) -> OrchestrationResult<RunStatus> {
        let running = self
            .running
            .lock()
            .await
            .get(instance_id)
            .map(|r| r.shared.clone());

        if let Some(shared) = running {
            shared.request_cancel();
            let mut state = shared.state.lock().await;
            if !state.is_terminal() {
                state.cancel_requested = true;
                shared.persist(&mut state).await?;
            }
            let status = RunStatus::from_state(&state);
            drop(state);
            self.log_cancel(instance_id).await;
            return Ok(status);
        }

        let mut state = self.load(instance_id).await?;
        if state.is_terminal() {
            return Ok(RunStatus::from_state(&state));
        }
        state.cancel_requested = true;
        state.mark_failed("cancelled".to_string())?;
        checkpoint::seal(&mut state);
        self.store.save(&state).await?;
        self.log_cancel(instance_id).await;
        emit(
            self.events.as_deref(),
            OrchestrationEvent::InstanceFailed {
                instance_id: instance_id.to_string(),
                reason: "cancelled".to_string(),
            },
        )
        .await;
        Ok(RunStatus::from_state(&state))
    }

    /// Wait until the instance reaches a terminal state
    pub async fn wait_for_completion(&self, instance_id: &str) -> OrchestrationResult<RunStatus> {
        let receiver = self
            .running
            .lock()
            .await
            .get(instance_id)
            .map(|r| r.done.clone());

        if let Some(mut receiver) = receiver {
            if let Ok(status) = receiver.wait_for(Option::is_some).await {
                if let Some(status) = status.clone() {
                    return Ok(status);
                }
            }
        }

        // Not driven here, or the driver already finished and saved
        let state = self.load(instance_id).await?;
        Ok(RunStatus::from_state(&state))
    }

    /// Current status from the persisted history
    pub async fn status(&self, instance_id: &str) -> OrchestrationResult<RunStatus> {
        if let Some(status) = self.running_status(instance_id).await {
            return Ok(status);
        }
        let state = self.load(instance_id).await?;
        Ok(RunStatus::from_state(&state))
    }

    /// Full persisted state of an instance
    pub async fn state(&self, instance_id: &str) -> OrchestrationResult<RunState> {
        self.load(instance_id).await
    }

    /// All known instances, newest first
    pub async fn list(&self) -> OrchestrationResult<Vec<RunSummary>> {
        Ok(self.store.list().await?)
    }

    fn workflow(&self, name: &str) -> OrchestrationResult<Arc<dyn Workflow>> {
        self.workflows
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestrationError::UnknownWorkflow {
                name: name.to_string(),
            })
    }

    async fn load(&self, instance_id: &str) -> OrchestrationResult<RunState> {
        self.store
            .load(instance_id)
            .await
            .map_err(|e| OrchestrationError::HistoryLoadFailed {
                instance_id: instance_id.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| OrchestrationError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn running_status(&self, instance_id: &str) -> Option<RunStatus> {
        let shared = self
            .running
            .lock()
            .await
            .get(instance_id)
            .map(|r| r.shared.clone())?;
        let state = shared.state.lock().await;
        Some(RunStatus::from_state(&state))
    }

    async fn log_cancel(&self, instance_id: &str) {
        warn!("Cancellation requested for instance {}", instance_id);
        emit(
            self.events.as_deref(),
            OrchestrationEvent::CancelRequested {
                instance_id: instance_id.to_string(),
            },
        )
        .await;
    }

    async fn spawn_driver(
        &self,
        workflow: Arc<dyn Workflow>,
        shared: Arc<InstanceShared>,
        done_tx: watch::Sender<Option<RunStatus>>,
    ) {
        let instance_id = shared.instance_id.clone();
        let input = shared.state.lock().await.input.clone();
        let ctx = OrchestrationContext::new(
            shared.clone(),
            self.executor.clone(),
            self.events.clone(),
            input,
        );
        let events = self.events.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let run = tokio::spawn(async move { workflow.run(&ctx).await });
            let result = match run.await {
                Ok(result) => result,
                Err(join_error) => Err(OrchestrationError::DriverPanicked {
                    instance_id: instance_id.clone(),
                    reason: join_error.to_string(),
                }),
            };

            let status = finish(&shared, result).await;
            let event = match &status {
                RunStatus::Completed { message, .. } => Some(OrchestrationEvent::InstanceCompleted {
                    instance_id: instance_id.clone(),
                    message: message.clone(),
                }),
                RunStatus::Failed { reason, .. } => Some(OrchestrationEvent::InstanceFailed {
                    instance_id: instance_id.clone(),
                    reason: reason.clone(),
                }),
                RunStatus::Running { .. } => None,
            };
            if let Some(event) = event {
                emit(events.as_deref(), event).await;
            }
            if let Some(events) = &events {
                if let Err(e) = events.flush().await {
                    warn!("Failed to flush events: {:#}", e);
                }
            }

            let _ = done_tx.send(Some(status));
            running.lock().await.remove(&instance_id);
        });
    }
}

/// Track `shared` as driven in this process
fn register(
    running: &mut HashMap<String, RunningInstance>,
    shared: &Arc<InstanceShared>,
) -> watch::Sender<Option<RunStatus>> {
    let (done_tx, done_rx) = watch::channel(None);
    running.insert(
        shared.instance_id.clone(),
        RunningInstance {
            shared: shared.clone(),
            done: done_rx,
        },
    );
    done_tx
}

/// Record the terminal state of a driven instance
async fn finish(shared: &InstanceShared, result: OrchestrationResult<String>) -> RunStatus {
    let mut state = shared.state.lock().await;

    let transition = match result {
        Ok(message) => {
            info!("Instance {} completed: {}", shared.instance_id, message);
            state.mark_completed(&shared.machine, message)
        }
        Err(e) => {
            let reason = if e.is_cancellation() {
                "cancelled".to_string()
            } else {
                e.to_string()
            };
            error!("Instance {} failed: {}", shared.instance_id, reason);
            state.mark_failed(reason)
        }
    };

    if let Err(e) = transition {
        // A workflow that returned without reaching WritingOutput cannot complete
        let reason = format!("workflow ended in an invalid state: {e}");
        error!("Instance {}: {}", shared.instance_id, reason);
        if !state.is_terminal() {
            let _ = state.mark_failed(reason);
        }
    }

    if let Err(e) = shared.persist(&mut state).await {
        error!("Failed to persist final state: {}", e);
    }

    RunStatus::from_state(&state)
}

#[async_trait]
impl OrchestrationStarter for Runtime {
    async fn start(&self, workflow: &str, input: Value) -> OrchestrationResult<String> {
        Runtime::start(self, workflow, input).await
    }
}
