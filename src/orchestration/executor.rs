//! Task execution with bounded concurrency, timeouts and retries
//!
//! Every attempt holds a semaphore permit for its duration, so at most
//! `max_parallel_tasks` handlers run at once across all instances sharing
//! the executor. Permits are released while waiting out a backoff delay.

use super::errors::OrchestrationError;
use super::events::{emit, EventLogger, OrchestrationEvent};
use super::retry::RetryConfig;
use super::task::{TaskError, TaskHandler, TaskOutcome};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A registered task handler with its retry policy
#[derive(Clone)]
pub struct TaskRegistration {
    pub handler: Arc<dyn TaskHandler>,
    pub retry: RetryConfig,
}

/// Runs registered task handlers on behalf of orchestration instances
pub struct TaskExecutor {
    tasks: HashMap<String, TaskRegistration>,
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
    events: Option<Arc<EventLogger>>,
}

impl TaskExecutor {
    pub fn new(max_parallel_tasks: usize, task_timeout: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(max_parallel_tasks.max(1))),
            task_timeout,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventLogger>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn TaskHandler>, retry: RetryConfig) {
        self.tasks
            .insert(name.into(), TaskRegistration { handler, retry });
    }

    /// Run `task_name` to a settled outcome, retrying transient failures
    pub async fn execute(
        &self,
        instance_id: &str,
        task_id: u64,
        task_name: &str,
        payload: Value,
    ) -> TaskOutcome {
        let Some(registration) = self.tasks.get(task_name) else {
            return TaskOutcome {
                task_id,
                task_name: task_name.to_string(),
                attempts: 0,
                result: Err(TaskError::permanent(
                    OrchestrationError::UnknownTask {
                        name: task_name.to_string(),
                    }
                    .to_string(),
                )),
            };
        };

        let max_attempts = registration.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self.run_attempt(&registration.handler, payload.clone()).await;

            match result {
                Ok(value) => {
                    debug!(
                        "Task {}#{} succeeded on attempt {}",
                        task_name, task_id, attempt
                    );
                    emit(
                        self.events.as_deref(),
                        OrchestrationEvent::TaskCompleted {
                            instance_id: instance_id.to_string(),
                            task_id,
                            task_name: task_name.to_string(),
                            attempts: attempt,
                        },
                    )
                    .await;
                    return TaskOutcome {
                        task_id,
                        task_name: task_name.to_string(),
                        attempts: attempt,
                        result: Ok(value),
                    };
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = registration.retry.calculate_delay(attempt);
                    warn!(
                        "Task {}#{} attempt {}/{} failed, retrying in {:?}: {}",
                        task_name, task_id, attempt, max_attempts, delay, error
                    );
                    emit(
                        self.events.as_deref(),
                        OrchestrationEvent::TaskRetrying {
                            instance_id: instance_id.to_string(),
                            task_id,
                            task_name: task_name.to_string(),
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                            error: error.message.clone(),
                        },
                    )
                    .await;
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(
                        "Task {}#{} failed after {} attempt(s): {}",
                        task_name, task_id, attempt, error
                    );
                    emit(
                        self.events.as_deref(),
                        OrchestrationEvent::TaskFailed {
                            instance_id: instance_id.to_string(),
                            task_id,
                            task_name: task_name.to_string(),
                            attempts: attempt,
                            error: error.message.clone(),
                        },
                    )
                    .await;
                    return TaskOutcome {
                        task_id,
                        task_name: task_name.to_string(),
                        attempts: attempt,
                        result: Err(error),
                    };
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        handler: &Arc<dyn TaskHandler>,
        payload: Value,
    ) -> Result<Value, TaskError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TaskError::transient("task executor is shutting down"))?;

        match tokio::time::timeout(self.task_timeout, handler.execute(payload)).await {
            Ok(result) => result,
            Err(_) => Err(TaskError::transient(format!(
                "attempt timed out after {:?}",
                self.task_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::retry::BackoffStrategy;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            backoff: BackoffStrategy::Fixed,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    /// Fails transiently until `failures` attempts have been made
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TaskHandler for Flaky {
        async fn execute(&self, payload: Value) -> Result<Value, TaskError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(TaskError::transient("storage busy"))
            } else {
                Ok(payload)
            }
        }
    }

    struct Rejecting {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TaskHandler for Rejecting {
        async fn execute(&self, _payload: Value) -> Result<Value, TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::permanent("bad record"))
        }
    }

    struct Sleepy;

    #[async_trait]
    impl TaskHandler for Sleepy {
        async fn execute(&self, _payload: Value) -> Result<Value, TaskError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    struct Gauge {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TaskHandler for Gauge {
        async fn execute(&self, _payload: Value) -> Result<Value, TaskError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let handler = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let mut executor = TaskExecutor::new(4, Duration::from_secs(1));
        executor.register("flaky", handler.clone(), fast_retry(3));

        let outcome = executor.execute("run", 0, "flaky", json!({"x": 1})).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let handler = Arc::new(Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        });
        let mut executor = TaskExecutor::new(4, Duration::from_secs(1));
        executor.register("flaky", handler.clone(), fast_retry(3));

        let outcome = executor.execute("run", 0, "flaky", Value::Null).await;
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.result.unwrap_err().is_transient());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_attempted_once() {
        let handler = Arc::new(Rejecting {
            calls: AtomicU32::new(0),
        });
        let mut executor = TaskExecutor::new(4, Duration::from_secs(1));
        executor.register("reject", handler.clone(), fast_retry(5));

        let outcome = executor.execute("run", 7, "reject", Value::Null).await;
        assert_eq!(outcome.task_id, 7);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let mut executor = TaskExecutor::new(4, Duration::from_millis(20));
        executor.register("sleepy", Arc::new(Sleepy), fast_retry(2));

        let outcome = executor.execute("run", 0, "sleepy", Value::Null).await;
        assert_eq!(outcome.attempts, 2);
        let error = outcome.result.unwrap_err();
        assert!(error.is_transient());
        assert!(error.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let executor = TaskExecutor::new(1, Duration::from_secs(1));
        let outcome = executor.execute("run", 0, "missing", Value::Null).await;
        assert_eq!(outcome.attempts, 0);
        let error = outcome.result.unwrap_err();
        assert!(!error.is_transient());
        assert_eq!(error.message, "No task registered under 'missing'");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let gauge = Arc::new(Gauge {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut executor = TaskExecutor::new(2, Duration::from_secs(1));
        executor.register("gauge", gauge.clone(), RetryConfig::none());
        let executor = Arc::new(executor);

        let runs: Vec<_> = (0..6)
            .map(|i| {
                let executor = executor.clone();
                tokio::spawn(async move { executor.execute("run", i, "gauge", Value::Null).await })
            })
            .collect();
        for run in runs {
            assert!(run.await.unwrap().is_success());
        }

        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }
}
