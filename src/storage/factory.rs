//! Storage factory for creating storage instances

use std::sync::Arc;

use super::backends::{FileBlobStore, MemoryBlobStore};
use super::config::{BackendType, StorageConfig};
use super::error::StorageResult;
use super::traits::BlobStore;

/// Factory for creating storage instances
pub struct StorageFactory;

impl StorageFactory {
    /// Create storage from explicit configuration
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
        match config.backend {
            BackendType::File => {
                let backend = FileBlobStore::new(config.root.clone()).await?;
                Ok(Arc::new(backend))
            }
            BackendType::Memory => Ok(Arc::new(MemoryBlobStore::new())),
        }
    }
}
