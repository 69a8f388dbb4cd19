//! In-memory gateway for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{DispatcherGateway, GatewayError, Result};
use crate::task::{Task, TaskId, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Report {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub message: String,
}

/// Hands out queued tasks and records every report
#[derive(Default)]
pub(crate) struct RecordingGateway {
    tasks: Mutex<VecDeque<Task>>,
    reports: Mutex<Vec<Report>>,
    fetches: Mutex<Vec<TaskType>>,
    pub healthy: Option<bool>,
    pub fail_reports: bool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            healthy: Some(true),
            ..Self::default()
        }
    }

    /// Every report "fails" (still recorded)
    pub fn failing_reports() -> Self {
        Self {
            fail_reports: true,
            ..Self::new()
        }
    }

    /// Health check fails at the transport level
    pub fn unreachable() -> Self {
        Self {
            healthy: None,
            ..Self::default()
        }
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let gateway = Self::new();
        gateway.tasks.lock().unwrap().extend(tasks);
        gateway
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<TaskType> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatcherGateway for RecordingGateway {
    async fn health(&self) -> Result<bool> {
        self.healthy
            .ok_or_else(|| GatewayError::RequestFailed("connection refused".to_string()))
    }

    async fn fetch_task(&self, task_type: TaskType) -> Option<Task> {
        self.fetches.lock().unwrap().push(task_type);
        self.tasks.lock().unwrap().pop_front()
    }

    async fn report_task(&self, task_id: TaskId, status: TaskStatus, message: &str) -> bool {
        self.reports.lock().unwrap().push(Report {
            task_id,
            status,
            message: message.to_string(),
        });
        !self.fail_reports
    }
}
