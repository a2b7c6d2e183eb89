//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use gradeflow::app::App;
use gradeflow::config::Config;
use gradeflow::orchestration::{
    FailurePolicy, GradeStudentTask, GradeWorkflow, HistoryStore, RetryConfig, Runtime,
    TaskError, TaskHandler, GRADE_TASK, GRADE_WORKFLOW, WRITE_OUTPUT_TASK,
};
use gradeflow::output::OutputWriter;
use gradeflow::storage::{BlobStore, MemoryBlobStore};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const HEADER: &str = "StudentID\tResult\tCredits\tPassForProgress";

/// Build a batch from `(student, result, credits, pass_for_progress)` rows
pub fn batch(rows: &[(&str, f64, f64, bool)]) -> String {
    let mut out = format!("{HEADER}\n");
    for (id, result, credits, pass) in rows {
        let pass = if *pass { "True" } else { "False" };
        out.push_str(&format!("{id}\t{result}\t{credits}\t{pass}\n"));
    }
    out
}

/// Retry settings short enough for tests
pub fn quick_retry(attempts: u32) -> RetryConfig {
    RetryConfig {
        attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        ..RetryConfig::default()
    }
}

/// Config with state under `dir` and short retries
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.root = dir.path().join("blobs");
    config.runtime.state_dir = dir.path().join("state");
    config.runtime.retry = quick_retry(3);
    config.runtime.output_retry = quick_retry(2);
    config
}

/// Fully wired app over an in-memory blob store
pub async fn memory_app(dir: &TempDir) -> (Arc<MemoryBlobStore>, App) {
    memory_app_with(test_config(dir)).await
}

pub async fn memory_app_with(config: Config) -> (Arc<MemoryBlobStore>, App) {
    let blobs = Arc::new(MemoryBlobStore::new());
    let app = App::with_store(config, blobs.clone()).await.unwrap();
    (blobs, app)
}

/// Runtime running the grading workflow with a custom grading task
pub fn grading_runtime(
    history: Arc<dyn HistoryStore>,
    blobs: Arc<dyn BlobStore>,
    grade_task: Arc<dyn TaskHandler>,
    retry: RetryConfig,
    task_timeout: Duration,
) -> Runtime {
    Runtime::builder(history)
        .task_timeout(task_timeout)
        .task(GRADE_TASK, grade_task, retry)
        .task(
            WRITE_OUTPUT_TASK,
            Arc::new(OutputWriter::new(blobs, "results")),
            quick_retry(2),
        )
        .workflow(
            GRADE_WORKFLOW,
            Arc::new(GradeWorkflow::new(FailurePolicy::default())),
        )
        .build()
        .unwrap()
}

/// Grades normally and counts how often it was called
#[derive(Default)]
pub struct CountingGrader {
    pub calls: AtomicU32,
}

impl CountingGrader {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for CountingGrader {
    async fn execute(&self, payload: Value) -> Result<Value, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        GradeStudentTask.execute(payload).await
    }
}

/// Fails transiently a fixed number of times, then grades
pub struct FlakyGrader {
    failures: u32,
    pub calls: AtomicU32,
}

impl FlakyGrader {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TaskHandler for FlakyGrader {
    async fn execute(&self, payload: Value) -> Result<Value, TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(TaskError::transient(format!("worker lost on call {call}")));
        }
        GradeStudentTask.execute(payload).await
    }
}

/// Sleeps before grading
pub struct SlowGrader {
    pub delay: Duration,
}

#[async_trait]
impl TaskHandler for SlowGrader {
    async fn execute(&self, payload: Value) -> Result<Value, TaskError> {
        tokio::time::sleep(self.delay).await;
        GradeStudentTask.execute(payload).await
    }
}
