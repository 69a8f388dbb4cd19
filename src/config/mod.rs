//! Configuration management for the task workers
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use taskworker::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Polling dispatcher at: {}", config.dispatcher.addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `TASKWORKER__<section>__<key>`
//!
//! Examples:
//! - `TASKWORKER__DISPATCHER__ADDR=http://mcore:8080`
//! - `TASKWORKER__WORKER__POLL_INTERVAL=500ms`
//! - `TASKWORKER__WORKER__MAX_INFLIGHT=4`
//!
//! The dispatcher secret is only read from `TASKWORKER_SECRET` (or
//! `MCORE_SECRET`), never from the file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/taskworker.toml`.
//! This can be overridden using the `TASKWORKER_CONFIG` environment variable
//! or the `--config` CLI flag.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, DispatcherConfig, FeedUser, FinanceConfig, TelemetryConfig, TransmissionConfig,
    WorkerConfig, YtdlConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`TASKWORKER__*`, secrets from `TASKWORKER_SECRET`)
    /// 2. TOML file (`explicit_path`, else `TASKWORKER_CONFIG`, else `config/taskworker.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (bad dispatcher address, clashing task types, etc.)
    pub fn load(explicit_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(explicit_path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[dispatcher]
addr = "http://127.0.0.1:8080"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.dispatcher.addr, "http://127.0.0.1:8080");
        assert_eq!(config.transmission.task_type, 5);
    }

    #[test]
    fn test_validation_catches_duplicate_task_type() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[finance]
task_type = 5
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::DuplicateTaskType { value: 5, .. })
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[dispatcher]
addr = "https://mcore.internal"
request_timeout = "15s"

[worker]
poll_interval = "1s"
max_inflight = 2

[transmission]
task_type = 5
host = "transmission"
port = 9091
download_dir = "/downloads/complete/"
rpc_path = "/transmission/rpc"

[finance]
task_type = 6
data_dir = "/var/lib/finance"

[ytdl]
task_type = 2
content_dir = "/srv/content"
content_url = "https://media.example.org/content/"
format = "bestaudio"
retries = 5

[[ytdl.users]]
name = "alice"
feed_name = "alice"
feed_description = "Alice's listening queue"

[telemetry]
status_addr = "127.0.0.1:9100"
log_filter = "taskworker=debug"
json_logs = true
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.dispatcher.addr, "https://mcore.internal");
        assert_eq!(
            config.dispatcher.request_timeout.map(|t| t.as_duration()),
            Some(Duration::from_secs(15))
        );
        assert_eq!(config.worker.max_inflight, 2);
        assert_eq!(config.finance.data_dir, PathBuf::from("/var/lib/finance"));
        assert_eq!(config.ytdl.retries, 5);
        assert_eq!(config.ytdl.user("alice").map(|u| u.feed_name.as_str()), Some("alice"));
        assert_eq!(
            config.telemetry.status_addr.map(|a| a.to_string()),
            Some("127.0.0.1:9100".to_string())
        );
        assert!(config.telemetry.json_logs);
    }
}
