//! In-memory storage backend for testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{
    error::{StorageError, StorageResult},
    traits::{validate_name, BlobStore},
    types::{BlobProperties, HealthStatus},
};

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// In-memory storage backend for testing
#[derive(Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<(String, String), StoredBlob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob with an explicit modification time
    pub async fn put_with_timestamp(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        last_modified: DateTime<Utc>,
    ) -> StorageResult<()> {
        validate_name(container)?;
        validate_name(name)?;
        self.blobs.write().await.insert(
            (container.to_string(), name.to_string()),
            StoredBlob {
                content: content.to_vec(),
                last_modified,
            },
        );
        Ok(())
    }

    /// Number of blobs across all containers
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

fn properties_of(container: &str, name: &str, blob: &StoredBlob) -> BlobProperties {
    BlobProperties {
        container: container.to_string(),
        name: name.to_string(),
        size: blob.content.len() as u64,
        last_modified: blob.last_modified,
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, container: &str, name: &str, content: &[u8]) -> StorageResult<()> {
        self.put_with_timestamp(container, name, content, Utc::now())
            .await
    }

    async fn get(&self, container: &str, name: &str) -> StorageResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(&(container.to_string(), name.to_string()))
            .map(|blob| blob.content.clone())
            .ok_or_else(|| StorageError::not_found(format!("{container}/{name}")))
    }

    async fn properties(&self, container: &str, name: &str) -> StorageResult<BlobProperties> {
        self.blobs
            .read()
            .await
            .get(&(container.to_string(), name.to_string()))
            .map(|blob| properties_of(container, name, blob))
            .ok_or_else(|| StorageError::not_found(format!("{container}/{name}")))
    }

    async fn list(&self, container: &str) -> StorageResult<Vec<BlobProperties>> {
        Ok(self
            .blobs
            .read()
            .await
            .iter()
            .filter(|((c, _), _)| c == container)
            .map(|((c, n), blob)| properties_of(c, n, blob))
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            backend_type: "memory".to_string(),
            errors: vec![],
        })
    }
}
