use super::models::Config;
use crate::task::TaskType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid dispatcher address '{addr}', expected 'http://' or 'https://'")]
    InvalidDispatcherScheme { addr: String },

    #[error("Task type for '{service}' must be positive, got {value}")]
    InvalidTaskType { service: String, value: TaskType },

    #[error("Task type {value} is shared by '{first}' and '{second}'")]
    DuplicateTaskType {
        value: TaskType,
        first: String,
        second: String,
    },

    #[error("Poll interval must be positive")]
    ZeroPollInterval,

    #[error("Transmission port must be positive")]
    InvalidPort,

    #[error("Feed name '{feed_name}' of ytdl user '{user}' must be a single path segment")]
    InvalidFeedName { user: String, feed_name: String },

    #[error("ytdl user '{0}' is configured twice")]
    DuplicateFeedUser(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_dispatcher(config)?;
    validate_task_types(config)?;
    validate_worker(config)?;
    validate_transmission(config)?;
    validate_feed_users(config)?;
    Ok(())
}

fn validate_dispatcher(config: &Config) -> Result<(), ValidationError> {
    let addr = config.dispatcher.addr.trim();
    if !(addr.starts_with("http://") || addr.starts_with("https://")) {
        return Err(ValidationError::InvalidDispatcherScheme {
            addr: config.dispatcher.addr.clone(),
        });
    }
    Ok(())
}

/// Every service polls its own partition of the queue
fn validate_task_types(config: &Config) -> Result<(), ValidationError> {
    let services = [
        ("transmission", config.transmission.task_type),
        ("finance", config.finance.task_type),
        ("ytdl", config.ytdl.task_type),
    ];

    for (service, value) in services {
        if value <= 0 {
            return Err(ValidationError::InvalidTaskType {
                service: service.to_string(),
                value,
            });
        }
    }

    for (i, (first, value)) in services.iter().enumerate() {
        if let Some((second, _)) = services[i + 1..].iter().find(|(_, other)| other == value) {
            return Err(ValidationError::DuplicateTaskType {
                value: *value,
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.poll_interval.is_zero() {
        return Err(ValidationError::ZeroPollInterval);
    }
    Ok(())
}

fn validate_transmission(config: &Config) -> Result<(), ValidationError> {
    if config.transmission.port == 0 {
        return Err(ValidationError::InvalidPort);
    }
    Ok(())
}

/// Feed names become file and directory names under `content_dir`
fn validate_feed_users(config: &Config) -> Result<(), ValidationError> {
    let users = &config.ytdl.users;

    for (i, user) in users.iter().enumerate() {
        let name = user.feed_name.as_str();
        if name.is_empty() || name == "." || name.contains("..") || name.contains(['/', '\\']) {
            return Err(ValidationError::InvalidFeedName {
                user: user.name.clone(),
                feed_name: user.feed_name.clone(),
            });
        }
        if users[..i].iter().any(|other| other.name == user.name) {
            return Err(ValidationError::DuplicateFeedUser(user.name.clone()));
        }
    }

    Ok(())
}
