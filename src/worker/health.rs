use tracing::{info, warn};

use crate::gateway::DispatcherGateway;
use crate::task::{Domain, Task, TaskStatus};

/// Answers liveness probes sent through the task queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthProbe {
    service: &'static str,
    status: TaskStatus,
}

impl HealthProbe {
    /// Probe answer of the service owning `domain`.
    ///
    /// The ytdl service has always acknowledged probes with `ACCEPTED`; the
    /// others with `COMPLETED`. Dispatcher dashboards rely on both.
    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Transmission => Self {
                service: "tr_mng",
                status: TaskStatus::Completed,
            },
            Domain::Finance => Self {
                service: "finance",
                status: TaskStatus::Completed,
            },
            Domain::Ytdl => Self {
                service: "ytdl",
                status: TaskStatus::Accepted,
            },
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Report health if `task` is a probe.
    ///
    /// Returns `true` when the task was a probe; the caller must then skip
    /// validation and execution, whether or not the report went through.
    pub async fn handle<G>(&self, gateway: &G, task: &Task) -> bool
    where
        G: DispatcherGateway + ?Sized,
    {
        if task.health_marker().is_none() {
            return false;
        }

        let message = format!("{} is healthy: {}", self.service, task.id);
        if gateway.report_task(task.id, self.status, &message).await {
            info!(task_id = task.id, service = self.service, "Health probe answered");
        } else {
            warn!(task_id = task.id, service = self.service, "Health probe answer not delivered");
        }
        true
    }
}
