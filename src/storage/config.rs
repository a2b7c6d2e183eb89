//! Storage configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Directory-per-container storage on the local filesystem (default)
    #[default]
    File,
    /// Process-local storage (for testing)
    Memory,
}

/// Where batches arrive and where reports go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type
    #[serde(default)]
    pub backend: BackendType,

    /// Root directory for the file backend
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Container watched for new batches
    #[serde(default = "default_input_container")]
    pub input_container: String,

    /// Container that receives `results_<batch>` reports
    #[serde(default = "default_output_container")]
    pub output_container: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            root: default_root(),
            input_container: default_input_container(),
            output_container: default_output_container(),
        }
    }
}

impl StorageConfig {
    /// Parse a backend name as used in environment variables
    pub fn parse_backend(raw: &str) -> Option<BackendType> {
        match raw.trim().to_lowercase().as_str() {
            "file" => Some(BackendType::File),
            "memory" => Some(BackendType::Memory),
            _ => None,
        }
    }
}

fn default_root() -> PathBuf {
    crate::config::default_data_dir().join("storage")
}

fn default_input_container() -> String {
    "students".to_string()
}

fn default_output_container() -> String {
    "results".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_container_names() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, BackendType::File);
        assert_eq!(config.input_container, "students");
        assert_eq!(config.output_container, "results");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: StorageConfig = toml::from_str("backend = \"memory\"\nroot = \"/tmp/gf\"").unwrap();
        assert_eq!(config.backend, BackendType::Memory);
        assert_eq!(config.root, PathBuf::from("/tmp/gf"));
        assert_eq!(config.output_container, "results");
    }

    #[test]
    fn test_parse_backend() {
        assert_eq!(StorageConfig::parse_backend("FILE"), Some(BackendType::File));
        assert_eq!(StorageConfig::parse_backend("memory"), Some(BackendType::Memory));
        assert_eq!(StorageConfig::parse_backend("s3"), None);
    }
}
