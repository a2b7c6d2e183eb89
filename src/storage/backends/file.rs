//! File-based storage backend implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::storage::{
    error::{StorageError, StorageResult},
    traits::{validate_name, BlobStore},
    types::{BlobProperties, HealthStatus},
};

/// Prefix of in-flight temporary files; never listed as blobs
const TEMP_PREFIX: &str = ".tmp-";

/// One directory per container under a base directory
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    /// Create a new file backend, creating the base directory if needed
    pub async fn new(base_dir: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn container_dir(&self, container: &str) -> StorageResult<PathBuf> {
        validate_name(container)?;
        Ok(self.base_dir.join(container))
    }

    fn blob_path(&self, container: &str, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.container_dir(container)?.join(name))
    }

    async fn read_properties(
        container: &str,
        name: &str,
        path: &Path,
    ) -> StorageResult<BlobProperties> {
        let metadata = match fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(format!("{container}/{name}")))
            }
            Err(e) => return Err(StorageError::Io(e)),
        };
        let last_modified: DateTime<Utc> = metadata.modified()?.into();

        Ok(BlobProperties {
            container: container.to_string(),
            name: name.to_string(),
            size: metadata.len(),
            last_modified,
        })
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, container: &str, name: &str, content: &[u8]) -> StorageResult<()> {
        let target = self.blob_path(container, name)?;
        let dir = self.container_dir(container)?;
        fs::create_dir_all(&dir).await?;

        // Write beside the target and rename over it so readers never see a
        // partially written blob
        let temp = dir.join(format!("{TEMP_PREFIX}{}-{name}", uuid::Uuid::new_v4()));
        fs::write(&temp, content).await?;
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::Io(e));
        }

        debug!("Stored {} bytes at {:?}", content.len(), target);
        Ok(())
    }

    async fn get(&self, container: &str, name: &str) -> StorageResult<Vec<u8>> {
        let path = self.blob_path(container, name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(format!("{container}/{name}")))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn properties(&self, container: &str, name: &str) -> StorageResult<BlobProperties> {
        let path = self.blob_path(container, name)?;
        Self::read_properties(container, name, &path).await
    }

    async fn list(&self, container: &str) -> StorageResult<Vec<BlobProperties>> {
        let dir = self.container_dir(container)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            blobs.push(Self::read_properties(container, &name, &entry.path()).await?);
        }

        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let mut errors = Vec::new();
        if let Err(e) = fs::metadata(&self.base_dir).await {
            errors.push(format!("{:?}: {}", self.base_dir, e));
        }
        Ok(HealthStatus {
            healthy: errors.is_empty(),
            backend_type: "file".to_string(),
            errors,
        })
    }

    fn container_path(&self, container: &str) -> Option<PathBuf> {
        self.container_dir(container).ok()
    }
}
