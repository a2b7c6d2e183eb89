//! Application configuration
//!
//! Loaded from TOML with a default for every field, then overridden by
//! `GRADEFLOW_*` environment variables.

pub mod loader;

use crate::orchestration::{FailurePolicy, RuntimeConfig};
use crate::storage::{StorageConfig, StorageError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory and the config directory
pub const CONFIG_FILE_NAME: &str = "gradeflow.toml";

/// Directory for state, storage and events when nothing else is configured
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("org", "gradeflow", "gradeflow")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".gradeflow"))
}

/// Per-user configuration directory, when the platform has one
pub fn default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "gradeflow", "gradeflow").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Event log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_events_enabled")]
    pub enabled: bool,

    /// JSONL file; defaults to `events.jsonl` in the state directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: default_events_enabled(),
            path: None,
        }
    }
}

fn default_events_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub events: EventsConfig,

    /// Log filter used when `RUST_LOG` is unset and no `-v` flag is given
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the event log goes
    pub fn events_path(&self) -> PathBuf {
        self.events
            .path
            .clone()
            .unwrap_or_else(|| self.runtime.state_dir.join("events.jsonl"))
    }

    /// Apply `GRADEFLOW_*` overrides from the process environment
    pub fn merge_env_vars(&mut self) -> Result<(), ConfigError> {
        self.merge_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn merge_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("GRADEFLOW_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }

        if let Some(raw) = lookup("GRADEFLOW_STORAGE_BACKEND") {
            self.storage.backend = StorageConfig::parse_backend(&raw).ok_or_else(|| {
                invalid("GRADEFLOW_STORAGE_BACKEND", &raw, "expected 'file' or 'memory'")
            })?;
        }

        if let Some(dir) = lookup("GRADEFLOW_STATE_DIR") {
            self.runtime.state_dir = PathBuf::from(dir);
        }

        if let Some(raw) = lookup("GRADEFLOW_MAX_PARALLEL") {
            self.runtime.max_parallel_tasks = raw
                .trim()
                .parse()
                .map_err(|e| invalid("GRADEFLOW_MAX_PARALLEL", &raw, e))?;
        }

        if let Some(raw) = lookup("GRADEFLOW_TASK_TIMEOUT") {
            self.runtime.task_timeout = humantime_serde::re::humantime::parse_duration(raw.trim())
                .map_err(|e| invalid("GRADEFLOW_TASK_TIMEOUT", &raw, e))?;
        }

        if let Some(level) = lookup("GRADEFLOW_LOG_LEVEL") {
            self.log_level = Some(level);
        }

        if let Some(raw) = lookup("GRADEFLOW_MAX_FAILURE_RATIO") {
            let raw_trimmed = raw.trim();
            self.failure_policy.max_failure_ratio = if raw_trimmed.is_empty()
                || raw_trimmed.eq_ignore_ascii_case("none")
            {
                None
            } else {
                Some(
                    raw_trimmed
                        .parse()
                        .map_err(|e| invalid("GRADEFLOW_MAX_FAILURE_RATIO", &raw, e))?,
                )
            };
        }

        Ok(())
    }

    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_parallel_tasks == 0 {
            return Err(ConfigError::Validation(
                "runtime.max_parallel_tasks must be at least 1".to_string(),
            ));
        }
        if self.runtime.task_timeout == Duration::ZERO {
            return Err(ConfigError::Validation(
                "runtime.task_timeout must be greater than zero".to_string(),
            ));
        }
        for (key, retry) in [
            ("runtime.retry", &self.runtime.retry),
            ("runtime.output_retry", &self.runtime.output_retry),
        ] {
            if retry.attempts == 0 {
                return Err(ConfigError::Validation(format!(
                    "{key}.attempts must be at least 1"
                )));
            }
        }
        if let Some(ratio) = self.failure_policy.max_failure_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::Validation(format!(
                    "failure_policy.max_failure_ratio must be between 0 and 1, got {ratio}"
                )));
            }
        }
        for (key, container) in [
            ("storage.input_container", &self.storage.input_container),
            ("storage.output_container", &self.storage.output_container),
        ] {
            crate::storage::traits::validate_name(container).map_err(|e: StorageError| {
                ConfigError::Validation(format!("{key}: {e}"))
            })?;
        }
        if self.storage.input_container == self.storage.output_container {
            return Err(ConfigError::Validation(
                "storage.input_container and storage.output_container must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.runtime.max_parallel_tasks, 10);
        assert_eq!(config.runtime.task_timeout, Duration::from_secs(60));
        assert_eq!(config.runtime.retry.attempts, 3);
        assert_eq!(config.runtime.output_retry.attempts, 5);
        assert_eq!(config.failure_policy.max_failure_ratio, None);
        assert!(config.events.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::new();
        config
            .merge_env(env(&[
                ("GRADEFLOW_STORAGE_ROOT", "/data/blobs"),
                ("GRADEFLOW_STATE_DIR", "/data/state"),
                ("GRADEFLOW_MAX_PARALLEL", "4"),
                ("GRADEFLOW_TASK_TIMEOUT", "90s"),
                ("GRADEFLOW_LOG_LEVEL", "debug"),
                ("GRADEFLOW_MAX_FAILURE_RATIO", "0.5"),
            ]))
            .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/data/blobs"));
        assert_eq!(config.runtime.state_dir, PathBuf::from("/data/state"));
        assert_eq!(config.runtime.max_parallel_tasks, 4);
        assert_eq!(config.runtime.task_timeout, Duration::from_secs(90));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.failure_policy.max_failure_ratio, Some(0.5));
        assert_eq!(config.events_path(), PathBuf::from("/data/state/events.jsonl"));
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = Config::new();
        let err = config
            .merge_env(env(&[("GRADEFLOW_MAX_PARALLEL", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GRADEFLOW_MAX_PARALLEL"));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::new();
        config.failure_policy.max_failure_ratio = Some(1.5);
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.storage.output_container = config.storage.input_container.clone();
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.runtime.max_parallel_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_sections() {
        let config: Config = toml::from_str(
            r#"
            log_level = "warn"

            [storage]
            root = "/srv/grades"

            [runtime]
            task_timeout = "5s"
            max_parallel_tasks = 2

            [runtime.retry]
            attempts = 4
            initial_delay = "100ms"

            [failure_policy]
            max_failure_ratio = 0.1

            [events]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/srv/grades"));
        assert_eq!(config.storage.input_container, "students");
        assert_eq!(config.runtime.task_timeout, Duration::from_secs(5));
        assert_eq!(config.runtime.retry.attempts, 4);
        assert_eq!(config.runtime.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.runtime.output_retry.attempts, 5);
        assert_eq!(config.failure_policy.max_failure_ratio, Some(0.1));
        assert!(!config.events.enabled);
    }
}
