use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque identifier assigned by the dispatcher, unique per claim.
pub type TaskId = i64;

/// Task type discriminator partitioning the dispatcher queue by worker kind.
pub type TaskType = i64;

/// A unit of work claimed from the dispatcher.
///
/// The dispatcher serializes the type discriminator as `type`; the worker
/// protocol documents it as `taskType`. Both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(alias = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub task_data: Option<TaskData>,
}

/// Per-domain payloads of a task.
///
/// Exactly one domain key is populated for real work; only `health` is
/// populated for a liveness probe. JSON `null` reads as absent. Domain
/// payloads stay raw until the owning validator parses them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fin: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tr: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ytdl: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Value>,
}

/// Domain keys under `taskData`, one per worker service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Finance,
    Transmission,
    Ytdl,
}

impl Domain {
    /// Key under `taskData`.
    pub fn key(self) -> &'static str {
        match self {
            Domain::Finance => "fin",
            Domain::Transmission => "tr",
            Domain::Ytdl => "ytdl",
        }
    }

    /// Name used as the prefix of every report message.
    pub fn display_name(self) -> &'static str {
        match self {
            Domain::Finance => "finance",
            Domain::Transmission => "transmission",
            Domain::Ytdl => "ytdl",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl TaskData {
    pub fn payload(&self, domain: Domain) -> Option<&Value> {
        match domain {
            Domain::Finance => self.fin.as_ref(),
            Domain::Transmission => self.tr.as_ref(),
            Domain::Ytdl => self.ytdl.as_ref(),
        }
    }
}

impl Task {
    /// The health marker, if this task is a liveness probe.
    ///
    /// Empty strings, arrays and objects do not count as a marker.
    pub fn health_marker(&self) -> Option<&Value> {
        self.task_data
            .as_ref()
            .and_then(|data| data.health.as_ref())
            .filter(|value| !is_empty_value(value))
    }

    pub fn payload(&self, domain: Domain) -> Option<&Value> {
        self.task_data.as_ref().and_then(|data| data.payload(domain))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
