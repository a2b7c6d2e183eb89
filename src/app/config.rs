//! Command-line level settings

use std::path::PathBuf;

/// Settings that come from the command line rather than the config file
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Explicit config file
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            config_path: None,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Log filter for the current verbosity
    ///
    /// With no `-v` flag the configured level wins over the default.
    pub fn log_level(&self, configured: Option<&str>) -> String {
        match self.verbose {
            0 => configured.unwrap_or("info").to_string(),
            1 => "debug".to_string(),
            2 => "trace".to_string(),
            _ => "trace,notify=debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_verbosity() {
        assert_eq!(AppConfig::new(0).log_level(None), "info");
        assert_eq!(AppConfig::new(0).log_level(Some("warn")), "warn");
        assert_eq!(AppConfig::new(1).log_level(Some("warn")), "debug");
        assert_eq!(AppConfig::new(2).log_level(None), "trace");
        assert!(AppConfig::new(5).log_level(None).starts_with("trace"));
    }
}
