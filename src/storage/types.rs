//! Type definitions for the storage layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata the store keeps for every blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub container: String,
    pub name: String,
    pub size: u64,
    /// Authoritative modification time as recorded by the store
    pub last_modified: DateTime<Utc>,
}

/// Health of a storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub backend_type: String,
    pub errors: Vec<String>,
}
