use super::{default_config_dir, Config, ConfigError, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing::debug;

impl Config {
    /// Load configuration, then apply environment overrides and validate
    ///
    /// An explicit path must exist. Without one, `./gradeflow.toml` is tried,
    /// then `config.toml` in the per-user config directory, then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => match Self::discover() {
                Some(path) => Self::load_from_path(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.merge_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse one TOML file without overrides
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        default_config_dir()
            .map(|dir| dir.join("config.toml"))
            .filter(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gradeflow.toml");
        std::fs::write(
            &path,
            "[runtime]\nmax_parallel_tasks = 3\ntask_timeout = \"2s\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.runtime.max_parallel_tasks, 3);
        assert_eq!(config.runtime.task_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[runtime\nmax_parallel_tasks = ").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_duration_is_rejected() {
        assert!(Config::from_toml("[runtime]\ntask_timeout = \"soon\"\n").is_err());
    }
}
