//! Ingestion trigger
//!
//! Turns one uploaded artifact into exactly one orchestration start. Holds
//! no grading logic.

use super::partition::partition_bytes;
use super::IngestError;
use crate::orchestration::{
    OrchestrationError, OrchestrationInput, OrchestrationStarter, GRADE_WORKFLOW,
};
use crate::storage::{BlobStore, StorageError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Report name for an input artifact
pub fn output_name_for(artifact: &str) -> String {
    format!("results_{artifact}")
}

/// What happened to an artifact handed to the trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started {
        instance_id: String,
        students: usize,
    },
    /// This exact upload was already handled
    Duplicate,
}

pub struct IngestionTrigger {
    store: Arc<dyn BlobStore>,
    starter: Arc<dyn OrchestrationStarter>,
    input_container: String,
    /// Latest ingested modification time per artifact name
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl IngestionTrigger {
    pub fn new(
        store: Arc<dyn BlobStore>,
        starter: Arc<dyn OrchestrationStarter>,
        input_container: impl Into<String>,
    ) -> Self {
        Self {
            store,
            starter,
            input_container: input_container.into(),
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn input_container(&self) -> &str {
        &self.input_container
    }

    pub(crate) fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Ingest one artifact from the input container
    ///
    /// The same `(name, last_modified)` pair is started at most once per
    /// trigger, and a version older than one already ingested is ignored.
    /// Parse failures are logged and returned; nothing is started.
    pub async fn handle_artifact(&self, name: &str) -> Result<TriggerOutcome, IngestError> {
        let storage_error = |source: StorageError| IngestError::Storage {
            artifact: name.to_string(),
            source,
        };

        let properties = self
            .store
            .properties(&self.input_container, name)
            .await
            .map_err(storage_error)?;

        let modified = properties.last_modified;
        let previous = {
            let mut seen = self.seen.lock().await;
            match seen.get(name) {
                Some(latest) if *latest >= modified => {
                    debug!("Artifact {} (modified {}) already ingested", name, modified);
                    return Ok(TriggerOutcome::Duplicate);
                }
                _ => seen.insert(name.to_string(), modified),
            }
        };

        match self.ingest(name, modified).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if !e.is_parse_failure() {
                    // Storage and start failures may be retried by a later event
                    let mut seen = self.seen.lock().await;
                    if seen.get(name) == Some(&modified) {
                        match previous {
                            Some(earlier) => seen.insert(name.to_string(), earlier),
                            None => seen.remove(name),
                        };
                    }
                }
                error!("{}", e);
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        name: &str,
        last_modified: DateTime<Utc>,
    ) -> Result<TriggerOutcome, IngestError> {
        let bytes = self
            .store
            .get(&self.input_container, name)
            .await
            .map_err(|source| IngestError::Storage {
                artifact: name.to_string(),
                source,
            })?;

        let students = partition_bytes(&bytes).map_err(|source| IngestError::Parse {
            artifact: name.to_string(),
            source,
        })?;
        let count = students.len();

        let input = OrchestrationInput {
            students,
            start_time: last_modified,
            output_name: output_name_for(name),
        };
        let start_error = |source: OrchestrationError| IngestError::Start {
            artifact: name.to_string(),
            source,
        };
        let payload = serde_json::to_value(&input).map_err(|e| start_error(e.into()))?;
        let instance_id = self
            .starter
            .start(GRADE_WORKFLOW, payload)
            .await
            .map_err(start_error)?;

        info!(
            "Started orchestration {} for {} with {} student(s)",
            instance_id, name, count
        );
        Ok(TriggerOutcome::Started {
            instance_id,
            students: count,
        })
    }
}
