//! Network boundary to the task dispatcher
//!
//! The gateway is the only component that speaks HTTP. It never lets a
//! transport error escape into the poll loop: [`DispatcherGateway::fetch_task`]
//! collapses "no work", "dispatcher unreachable" and "garbage response" into
//! `None`, and [`DispatcherGateway::report_task`] collapses every failure into
//! `false`. Only the startup health check surfaces its error, because the
//! worker refuses to start against an unreachable dispatcher.

mod http;
mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpGateway;
pub use wire::{GetTaskRequest, GetTaskResponse, ReportTaskRequest, STATUS_NO_TASKS, STATUS_OK};

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{Task, TaskId, TaskStatus, TaskType};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Dispatcher error ({status}): {error}")]
    Dispatcher { status: String, error: String },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Client side of the dispatcher protocol
#[async_trait]
pub trait DispatcherGateway: Send + Sync + 'static {
    /// Liveness check; `Err` means the dispatcher could not be reached at all.
    async fn health(&self) -> Result<bool>;

    /// Claim one task of `task_type`, or `None` if nothing could be claimed
    /// for whatever reason.
    async fn fetch_task(&self, task_type: TaskType) -> Option<Task>;

    /// Report a status transition; `false` if the report was lost.
    ///
    /// Every call is an independent wire request, nothing is deduplicated.
    async fn report_task(&self, task_id: TaskId, status: TaskStatus, message: &str) -> bool;
}
