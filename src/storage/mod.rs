//! Storage abstraction layer
//!
//! Batches and reports live in named containers behind the [`BlobStore`]
//! trait. A store is built once at process start by [`StorageFactory`] and
//! handed to the ingestion trigger and the output writer.

pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod traits;
pub mod types;

pub use backends::{FileBlobStore, MemoryBlobStore};
pub use config::{BackendType, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use factory::StorageFactory;
pub use traits::BlobStore;
pub use types::{BlobProperties, HealthStatus};
