//! Component wiring
//!
//! Builds the blob store, history store, event log, orchestration runtime and
//! ingestion trigger from one [`Config`].

use crate::config::Config;
use crate::ingest::IngestionTrigger;
use crate::orchestration::{
    EventLogger, FileHistoryStore, GradeStudentTask, GradeWorkflow, Runtime, GRADE_TASK,
    GRADE_WORKFLOW, WRITE_OUTPUT_TASK,
};
use crate::output::OutputWriter;
use crate::storage::{BlobStore, StorageFactory};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fully wired application
pub struct App {
    pub config: Config,
    pub blobs: Arc<dyn BlobStore>,
    pub runtime: Arc<Runtime>,
    pub trigger: IngestionTrigger,
    events: Option<Arc<EventLogger>>,
}

impl App {
    pub async fn build(config: Config) -> Result<Self> {
        let blobs = StorageFactory::from_config(&config.storage)
            .await
            .context("Failed to open blob storage")?;
        ensure_healthy(blobs.as_ref()).await?;
        Self::with_store(config, blobs).await
    }

    /// Wire everything around an existing blob store
    pub async fn with_store(config: Config, blobs: Arc<dyn BlobStore>) -> Result<Self> {
        let history = FileHistoryStore::new(config.runtime.state_dir.clone())
            .await
            .with_context(|| {
                format!(
                    "Failed to open state directory {}",
                    config.runtime.state_dir.display()
                )
            })?;

        let events = if config.events.enabled {
            let path = config.events_path();
            match EventLogger::jsonl(path.clone()).await {
                Ok(logger) => Some(Arc::new(logger)),
                Err(e) => {
                    warn!("Event log {} unavailable: {:#}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let writer = OutputWriter::new(blobs.clone(), config.storage.output_container.clone());

        let mut builder = Runtime::builder(Arc::new(history))
            .max_parallel_tasks(config.runtime.max_parallel_tasks)
            .task_timeout(config.runtime.task_timeout)
            .task(
                GRADE_TASK,
                Arc::new(GradeStudentTask),
                config.runtime.retry.clone(),
            )
            .task(
                WRITE_OUTPUT_TASK,
                Arc::new(writer),
                config.runtime.output_retry.clone(),
            )
            .workflow(
                GRADE_WORKFLOW,
                Arc::new(GradeWorkflow::new(config.failure_policy.clone())),
            );
        if let Some(events) = &events {
            builder = builder.events(events.clone());
        }
        let runtime = Arc::new(builder.build()?);

        let trigger = IngestionTrigger::new(
            blobs.clone(),
            runtime.clone(),
            config.storage.input_container.clone(),
        );

        debug!(
            "Wired runtime: {} parallel task(s), input '{}', output '{}'",
            config.runtime.max_parallel_tasks,
            config.storage.input_container,
            config.storage.output_container
        );

        Ok(Self {
            config,
            blobs,
            runtime,
            trigger,
            events,
        })
    }

    /// Flush the event log before exit
    pub async fn shutdown(&self) {
        if let Some(events) = &self.events {
            if let Err(e) = events.flush().await {
                warn!("Failed to flush event log: {:#}", e);
            }
        }
    }
}

/// Refuse to start against a backend that reports itself unhealthy
async fn ensure_healthy(blobs: &dyn BlobStore) -> Result<()> {
    let health = blobs
        .health_check()
        .await
        .context("Blob storage health check failed")?;
    if !health.healthy {
        bail!(
            "{} blob storage is unhealthy: {}",
            health.backend_type,
            health.errors.join("; ")
        );
    }
    debug!("{} blob storage is healthy", health.backend_type);
    Ok(())
}
