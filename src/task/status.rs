use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle status reported back to the dispatcher.
///
/// A claimed task starts out implicitly `NEW` (the dispatcher never sends it
/// to us in any other state) and moves to exactly one of the reported states:
///
/// ```text
/// NEW -> VALIDATION_FAILED (2)
/// NEW -> ACCEPTED (3) -> COMPLETED (4)
/// ```
///
/// `Completed` is reported for both successful and failed executions; only
/// the accompanying message tells them apart on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TaskStatus {
    ValidationFailed,
    Accepted,
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown task status code: {0}")]
pub struct UnknownStatus(pub u8);

impl TaskStatus {
    pub fn code(self) -> u8 {
        match self {
            TaskStatus::ValidationFailed => 2,
            TaskStatus::Accepted => 3,
            TaskStatus::Completed => 4,
        }
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = UnknownStatus;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            2 => Ok(TaskStatus::ValidationFailed),
            3 => Ok(TaskStatus::Accepted),
            4 => Ok(TaskStatus::Completed),
            other => Err(UnknownStatus(other)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::ValidationFailed => "VALIDATION_FAILED",
            TaskStatus::Accepted => "ACCEPTED",
            TaskStatus::Completed => "COMPLETED",
        };
        write!(f, "{}({})", name, self.code())
    }
}
