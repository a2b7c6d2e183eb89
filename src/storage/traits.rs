//! Core trait definitions for the storage layer

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::StorageResult;
use super::types::{BlobProperties, HealthStatus};

/// Named-blob storage grouped into containers
///
/// Handed explicitly to the components that need it; there is no process-wide
/// client.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` under `name`, replacing anything already there
    async fn put(&self, container: &str, name: &str, content: &[u8]) -> StorageResult<()>;

    /// Read a blob's bytes
    async fn get(&self, container: &str, name: &str) -> StorageResult<Vec<u8>>;

    /// Read a blob's metadata without its content
    async fn properties(&self, container: &str, name: &str) -> StorageResult<BlobProperties>;

    /// List blobs in a container, sorted by name
    async fn list(&self, container: &str) -> StorageResult<Vec<BlobProperties>>;

    /// Check the health of the storage backend
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Local directory backing a container, for backends that have one
    fn container_path(&self, _container: &str) -> Option<PathBuf> {
        None
    }
}

/// Reject names that could escape their container
pub fn validate_name(name: &str) -> StorageResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(super::error::StorageError::invalid_name(name));
    }
    Ok(())
}
