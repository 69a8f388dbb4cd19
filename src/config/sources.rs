use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "TASKWORKER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/taskworker.toml";
const ENV_PREFIX: &str = "TASKWORKER";
const ENV_SEPARATOR: &str = "__";
const SECRET_ENV_VARS: &[&str] = &["TASKWORKER_SECRET", "MCORE_SECRET"];

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
///
/// An explicit path (from the CLI) wins over `TASKWORKER_CONFIG`.
pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = explicit_path
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never stored in TOML files, only in environment
fn load_secrets(config: &mut Config) {
    if let Some(secret) = first_secret(|name| env::var(name).ok()) {
        config.dispatcher.secret = secret;
    }
}

/// First non-empty value among `SECRET_ENV_VARS`, in order
fn first_secret(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    SECRET_ENV_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|secret| !secret.is_empty()))
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // TASKWORKER__DISPATCHER__ADDR -> dispatcher.addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
