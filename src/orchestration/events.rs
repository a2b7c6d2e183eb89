//! Event logging and audit trail for orchestration runs
//!
//! Lifecycle events are appended as one JSON object per line. Event logging
//! is best effort: a failed write is reported through `tracing` and never
//! changes the outcome of a run.

use super::state::RunPhase;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// All events emitted during an orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    InstanceStarted {
        instance_id: String,
        workflow: String,
    },
    InstanceResumed {
        instance_id: String,
        settled_tasks: usize,
    },
    PhaseChanged {
        instance_id: String,
        from: RunPhase,
        to: RunPhase,
    },
    TaskRetrying {
        instance_id: String,
        task_id: u64,
        task_name: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    TaskCompleted {
        instance_id: String,
        task_id: u64,
        task_name: String,
        attempts: u32,
    },
    TaskFailed {
        instance_id: String,
        task_id: u64,
        task_name: String,
        attempts: u32,
        error: String,
    },
    CancelRequested {
        instance_id: String,
    },
    InstanceCompleted {
        instance_id: String,
        message: String,
    },
    InstanceFailed {
        instance_id: String,
        reason: String,
    },
}

impl OrchestrationEvent {
    pub fn instance_id(&self) -> &str {
        use OrchestrationEvent::*;
        match self {
            InstanceStarted { instance_id, .. }
            | InstanceResumed { instance_id, .. }
            | PhaseChanged { instance_id, .. }
            | TaskRetrying { instance_id, .. }
            | TaskCompleted { instance_id, .. }
            | TaskFailed { instance_id, .. }
            | CancelRequested { instance_id }
            | InstanceCompleted { instance_id, .. }
            | InstanceFailed { instance_id, .. } => instance_id,
        }
    }
}

/// A single event record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: OrchestrationEvent,
}

/// Trait for writing events to various destinations
#[async_trait]
pub trait EventWriter: Send + Sync {
    /// Write a batch of events
    async fn write(&self, events: &[EventRecord]) -> Result<()>;

    /// Flush any buffered data
    async fn flush(&self) -> Result<()>;
}

/// File-based event writer in JSONL format
pub struct JsonlEventWriter {
    file_path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlEventWriter {
    /// Open `file_path` for appending, creating parent directories
    pub async fn new(file_path: PathBuf) -> Result<Self> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create event directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .context("Failed to open event file")?;

        Ok(Self {
            file_path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Read every record from a JSONL event file, skipping malformed lines
    pub async fn read_all(file_path: &Path) -> Result<Vec<EventRecord>> {
        let content = fs::read_to_string(file_path)
            .await
            .with_context(|| format!("Failed to read event file {}", file_path.display()))?;

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed event at {}:{}: {}",
                    file_path.display(),
                    line_no + 1,
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl EventWriter for JsonlEventWriter {
    async fn write(&self, events: &[EventRecord]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        for event in events {
            let line = serde_json::to_string(event)?;
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        debug!("Wrote {} events to {:?}", events.len(), self.file_path);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

/// Fan-out of events to every configured writer
pub struct EventLogger {
    writers: Vec<Box<dyn EventWriter>>,
}

impl EventLogger {
    pub fn new(writers: Vec<Box<dyn EventWriter>>) -> Self {
        Self { writers }
    }

    /// Logger writing JSONL to `file_path`
    pub async fn jsonl(file_path: PathBuf) -> Result<Self> {
        let writer = JsonlEventWriter::new(file_path).await?;
        Ok(Self::new(vec![Box::new(writer)]))
    }

    /// Log an event to all writers
    pub async fn log(&self, event: OrchestrationEvent) -> Result<()> {
        let record = EventRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        };

        let batch = std::slice::from_ref(&record);
        for writer in &self.writers {
            writer.write(batch).await?;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        for writer in &self.writers {
            writer.flush().await?;
        }
        Ok(())
    }
}

/// Log `event` if a logger is configured, downgrading failures to warnings
pub(crate) async fn emit(logger: Option<&EventLogger>, event: OrchestrationEvent) {
    if let Some(logger) = logger {
        let instance_id = event.instance_id().to_string();
        if let Err(e) = logger.log(event).await {
            warn!("Failed to log event for instance {}: {:#}", instance_id, e);
        }
    }
}
