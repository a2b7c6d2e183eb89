//! Output writer
//!
//! Persists a rendered report under its target name in the output container.
//! Writes overwrite, so repeating a write after a crash leaves the same bytes.

use crate::orchestration::task::{TaskError, TaskHandler};
use crate::storage::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Payload of the `write_output` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRequest {
    pub content: String,
    pub name: String,
}

/// Where a report ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrittenReport {
    pub container: String,
    pub name: String,
    pub size: u64,
    /// Human-readable location, a filesystem path when the backend has one
    pub location: String,
}

/// Writes reports into one container of an injected store
pub struct OutputWriter {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl OutputWriter {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Location a report named `name` is written to
    pub fn location_of(&self, name: &str) -> String {
        match self.store.container_path(&self.container) {
            Some(dir) => dir.join(name).display().to_string(),
            None => format!("{}/{}", self.container, name),
        }
    }

    /// Store `request.content` under `request.name`, replacing prior content
    pub async fn write(&self, request: &OutputRequest) -> StorageResult<WrittenReport> {
        debug!(
            "Writing report {} ({} bytes) to container {}",
            request.name,
            request.content.len(),
            self.container
        );
        self.store
            .put(&self.container, &request.name, request.content.as_bytes())
            .await?;

        let written = WrittenReport {
            container: self.container.clone(),
            name: request.name.clone(),
            size: request.content.len() as u64,
            location: self.location_of(&request.name),
        };
        info!("Report written to {}", written.location);
        Ok(written)
    }
}

fn task_error(err: StorageError) -> TaskError {
    if err.is_retryable() {
        TaskError::transient(err.to_string())
    } else {
        TaskError::permanent(err.to_string())
    }
}

#[async_trait]
impl TaskHandler for OutputWriter {
    async fn execute(&self, payload: Value) -> Result<Value, TaskError> {
        let request: OutputRequest = serde_json::from_value(payload)
            .map_err(|e| TaskError::permanent(format!("invalid output request: {e}")))?;
        let written = self.write(&request).await.map_err(task_error)?;
        serde_json::to_value(written).map_err(|e| TaskError::permanent(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBlobStore, MemoryBlobStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn request(content: &str) -> OutputRequest {
        OutputRequest {
            content: content.to_string(),
            name: "results_batch.tsv".to_string(),
        }
    }

    #[tokio::test]
    async fn test_repeated_write_is_idempotent() {
        let store = Arc::new(MemoryBlobStore::new());
        let writer = OutputWriter::new(store.clone(), "results");
        let report = "StudentID\tAverage\tDegree Class\n1\t73\tFirst\n";

        writer.write(&request(report)).await.unwrap();
        let once = store.get("results", "results_batch.tsv").await.unwrap();
        writer.write(&request(report)).await.unwrap();
        let twice = store.get("results", "results_batch.tsv").await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileBlobStore::new(temp_dir.path().to_path_buf()).await.unwrap());
        let writer = OutputWriter::new(store.clone(), "results");

        writer.write(&request("first\n")).await.unwrap();
        let written = writer.write(&request("second\n")).await.unwrap();

        let on_disk = std::fs::read_to_string(temp_dir.path().join("results").join("results_batch.tsv")).unwrap();
        assert_eq!(on_disk, "second\n");
        assert!(written.location.ends_with("results_batch.tsv"));
        assert_eq!(written.size, 7);
    }

    #[tokio::test]
    async fn test_task_handler_contract() {
        let store = Arc::new(MemoryBlobStore::new());
        let writer = OutputWriter::new(store, "results");

        let value = writer
            .execute(json!({"content": "x\n", "name": "results_a.tsv"}))
            .await
            .unwrap();
        assert_eq!(value["location"], "results/results_a.tsv");

        let err = writer.execute(json!({"content": 1})).await.unwrap_err();
        assert!(!err.is_transient());

        let err = writer
            .execute(json!({"content": "x", "name": "../escape"}))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
