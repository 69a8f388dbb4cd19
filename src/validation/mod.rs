//! Payload validation and acknowledgement
//!
//! Every claimed task gets exactly one status transition before any domain
//! work starts: `VALIDATION_FAILED` with the first problem found, or
//! `ACCEPTED` together with a strongly-typed command. [`check_and_report`]
//! fuses the two steps so no caller can validate without acknowledging.
//!
//! Validators check required fields in a fixed order and stop at the first
//! missing one; they never collect all violations.

mod finance;
mod transmission;
mod ytdl;

pub use finance::{FinanceCommand, FinanceValidator};
pub use transmission::{TorrentCommand, TorrentRef, TransmissionValidator};
pub use ytdl::{YtdlCommand, YtdlValidator};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::DispatcherGateway;
use crate::task::{Domain, Task, TaskId, TaskStatus};

/// Why a payload was rejected; the `Display` text is what the dispatcher sees
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{} taskData{path} is empty", .domain.display_name())]
    Missing { domain: Domain, path: String },

    #[error("{} taskData.{}.command not {expected}", .domain.display_name(), .domain.key())]
    UnsupportedCommand {
        domain: Domain,
        command: String,
        expected: &'static str,
    },

    #[error("{} taskData.{} is malformed: {detail}", .domain.display_name(), .domain.key())]
    Malformed { domain: Domain, detail: String },
}

/// Turns the raw payload of one domain into its command
pub trait PayloadValidator: Send + Sync + 'static {
    type Command: Send + fmt::Debug + 'static;

    fn domain(&self) -> Domain;

    fn validate(&self, task: &Task) -> Result<Self::Command, PayloadError>;
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("payload rejected: {0}")]
    Rejected(#[from] PayloadError),

    #[error("acceptance of task {0} could not be reported")]
    AcceptanceNotReported(TaskId),
}

/// Validate a task and report the verdict to the dispatcher.
///
/// Returns the command only when the task is valid *and* the `ACCEPTED`
/// report went through; a task the dispatcher never saw accepted is not run.
pub async fn check_and_report<V, G>(
    validator: &V,
    gateway: &G,
    task: &Task,
) -> Result<V::Command, CheckError>
where
    V: PayloadValidator + ?Sized,
    G: DispatcherGateway + ?Sized,
{
    let domain = validator.domain();

    match validator.validate(task) {
        Err(err) => {
            warn!(task_id = task.id, %domain, error = %err, "Task payload rejected");
            gateway
                .report_task(task.id, TaskStatus::ValidationFailed, &err.to_string())
                .await;
            Err(CheckError::Rejected(err))
        }
        Ok(command) => {
            let message = format!("{} get the job: {}", domain.display_name(), task.id);
            if !gateway
                .report_task(task.id, TaskStatus::Accepted, &message)
                .await
            {
                return Err(CheckError::AcceptanceNotReported(task.id));
            }
            info!(task_id = task.id, %domain, ?command, "Task accepted");
            Ok(command)
        }
    }
}

/// One domain payload, read field by field in the order the validator asks.
///
/// Absent `taskData` and absent domain key map to `Missing`; a payload that is
/// not a JSON object maps to `Malformed`. Fields the validator never asks for
/// are ignored whatever their type.
pub(crate) struct Fields<'a> {
    domain: Domain,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(crate) fn of(task: &'a Task, domain: Domain) -> Result<Self, PayloadError> {
        let data = task.task_data.as_ref().ok_or_else(|| PayloadError::Missing {
            domain,
            path: String::new(),
        })?;

        let payload = data.payload(domain).ok_or_else(|| PayloadError::Missing {
            domain,
            path: format!(".{}", domain.key()),
        })?;

        match payload {
            Value::Object(map) => Ok(Self { domain, map }),
            other => Err(PayloadError::Malformed {
                domain,
                detail: format!("expected an object, got {}", json_kind(other)),
            }),
        }
    }

    /// Present, non-null value of `field`
    pub(crate) fn value(&self, field: &str) -> Result<&'a Value, PayloadError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Err(PayloadError::Missing {
                domain: self.domain,
                path: format!(".{}.{}", self.domain.key(), field),
            }),
            Some(value) => Ok(value),
        }
    }

    pub(crate) fn string(&self, field: &str) -> Result<String, PayloadError> {
        match self.value(field)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.malformed(field, other, "a string")),
        }
    }

    /// Required field decoded into `T`
    pub(crate) fn get<T: DeserializeOwned>(&self, field: &str) -> Result<T, PayloadError> {
        let value = self.value(field)?;
        serde_json::from_value(value.clone()).map_err(|e| PayloadError::Malformed {
            domain: self.domain,
            detail: format!("{}: {}", field, e),
        })
    }

    fn malformed(&self, field: &str, value: &Value, expected: &str) -> PayloadError {
        PayloadError::Malformed {
            domain: self.domain,
            detail: format!("{} must be {}, got {}", field, expected, json_kind(value)),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
