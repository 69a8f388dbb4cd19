//! HTTP client for the dispatcher protocol

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::wire::{GetTaskRequest, GetTaskResponse, ReportTaskRequest, STATUS_NO_TASKS, STATUS_OK};
use super::{DispatcherGateway, GatewayError, Result};
use crate::config::DispatcherConfig;
use crate::observability::Metrics;
use crate::task::{Task, TaskId, TaskStatus, TaskType};

const SECRET_HEADER: &str = "secret";
const HEALTH_PATH: &str = "/health/";
const GET_TASK_PATH: &str = "/get-task/";
const REPORT_TASK_PATH: &str = "/report-task/";

/// Dispatcher client over HTTP/JSON
///
/// Connection pool and credentials are read-only after construction, so one
/// instance is shared by the poll loop and every running execution.
pub struct HttpGateway {
    client: Client,
    secret: String,
    health_url: Url,
    get_task_url: Url,
    report_task_url: Url,
    metrics: Arc<Metrics>,
}

impl HttpGateway {
    /// Create a new dispatcher client
    pub fn new(config: &DispatcherConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("taskworker/", env!("CARGO_PKG_VERSION")));

        // No timeout unless configured: a hung dispatcher blocks the loop
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout.as_duration());
        }

        let client = builder
            .build()
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            secret: config.secret.clone(),
            health_url: endpoint(&config.addr, HEALTH_PATH)?,
            get_task_url: endpoint(&config.addr, GET_TASK_PATH)?,
            report_task_url: endpoint(&config.addr, REPORT_TASK_PATH)?,
            metrics,
        })
    }

    /// Health check without error flattening
    pub async fn try_health(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.health_url.clone())
            .header(SECRET_HEADER, &self.secret)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Dispatcher health check failed");
            return Ok(false);
        }

        info!(url = %self.health_url, "Dispatcher is healthy");
        Ok(true)
    }

    /// Fetch without error flattening; `Ok(None)` means the dispatcher had no work.
    pub async fn try_fetch(&self, task_type: TaskType) -> Result<Option<Task>> {
        let response = self
            .client
            .post(self.get_task_url.clone())
            .header(SECRET_HEADER, &self.secret)
            .json(&GetTaskRequest { task_type })
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: GetTaskResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        match body.status.as_str() {
            STATUS_NO_TASKS => Ok(None),
            STATUS_OK => match body.data {
                Some(task) if task.id <= 0 => Err(GatewayError::MalformedResponse(format!(
                    "task id must be positive, got {}",
                    task.id
                ))),
                data => Ok(data),
            },
            other => Err(GatewayError::Dispatcher {
                status: other.to_string(),
                error: body.error.unwrap_or_default(),
            }),
        }
    }

    /// Report without error flattening
    pub async fn try_report(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        message: &str,
    ) -> Result<()> {
        let body = ReportTaskRequest {
            task_id,
            status,
            text_msg: message.to_string(),
        };

        let response = self
            .client
            .post(self.report_task_url.clone())
            .header(SECRET_HEADER, &self.secret)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UnexpectedStatus {
                status: http_status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl DispatcherGateway for HttpGateway {
    async fn health(&self) -> Result<bool> {
        self.try_health().await
    }

    async fn fetch_task(&self, task_type: TaskType) -> Option<Task> {
        match self.try_fetch(task_type).await {
            Ok(Some(task)) => {
                debug!(task_id = task.id, task_type, "Claimed task");
                Some(task)
            }
            Ok(None) => {
                trace!(task_type, "No tasks");
                None
            }
            Err(e) => {
                warn!(task_type, error = %e, "Failed to fetch task");
                None
            }
        }
    }

    async fn report_task(&self, task_id: TaskId, status: TaskStatus, message: &str) -> bool {
        match self.try_report(task_id, status, message).await {
            Ok(()) => {
                debug!(task_id, %status, text = message, "Reported task status");
                true
            }
            Err(e) => {
                // Lost for good: reports are never retried
                warn!(task_id, %status, error = %e, "Failed to report task status");
                self.metrics.report_failed();
                false
            }
        }
    }
}

fn endpoint(addr: &str, path: &str) -> Result<Url> {
    let raw = format!("{}{}", addr.trim().trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", raw, e)))
}

fn map_send_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::RequestFailed(e.to_string())
    }
}
