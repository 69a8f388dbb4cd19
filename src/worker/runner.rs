//! The poll loop: fetch, probe, validate, dispatch

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::health::HealthProbe;
use super::supervisor::{ExecutionSupervisor, Outcome, Slot};
use super::{WorkerError, wait_for_shutdown};
use crate::gateway::DispatcherGateway;
use crate::handlers::CommandHandler;
use crate::observability::Metrics;
use crate::task::{TaskId, TaskType};
use crate::validation::{CheckError, PayloadError, PayloadValidator, check_and_report};

/// Result of one loop iteration
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing claimed; the loop sleeps before polling again
    NoTask,
    Health(TaskId),
    Rejected { task_id: TaskId, reason: PayloadError },
    /// Valid, but the acceptance report failed, so the task was not run
    Dropped(TaskId),
    Dispatched {
        task_id: TaskId,
        execution: JoinHandle<Outcome>,
    },
}

/// One service's worker: a single poll loop over one task type
pub struct Worker<G, V, H>
where
    G: DispatcherGateway,
    V: PayloadValidator,
    H: CommandHandler<Command = V::Command>,
{
    gateway: Arc<G>,
    validator: V,
    probe: HealthProbe,
    supervisor: ExecutionSupervisor<G, H>,
    metrics: Arc<Metrics>,
    task_type: TaskType,
    poll_interval: Duration,
}

#[bon::bon]
impl<G, V, H> Worker<G, V, H>
where
    G: DispatcherGateway,
    V: PayloadValidator,
    H: CommandHandler<Command = V::Command>,
{
    #[builder]
    pub fn new(
        gateway: Arc<G>,
        validator: V,
        handler: Arc<H>,
        metrics: Arc<Metrics>,
        task_type: TaskType,
        #[builder(default = Duration::from_secs(1))] poll_interval: Duration,
        #[builder(default)] max_inflight: usize,
    ) -> Self {
        let probe = HealthProbe::for_domain(validator.domain());
        let supervisor =
            ExecutionSupervisor::new(gateway.clone(), handler, metrics.clone(), max_inflight);

        Self {
            gateway,
            validator,
            probe,
            supervisor,
            metrics,
            task_type,
            poll_interval,
        }
    }
}

impl<G, V, H> Worker<G, V, H>
where
    G: DispatcherGateway,
    V: PayloadValidator,
    H: CommandHandler<Command = V::Command>,
{
    /// Refuse to start unless the dispatcher answers its health check
    pub async fn check_dispatcher(&self) -> Result<(), WorkerError> {
        match self.gateway.health().await {
            Ok(true) => {
                info!("Dispatcher is healthy");
                Ok(())
            }
            Ok(false) => Err(WorkerError::DispatcherUnavailable(
                "health check answered with a non-200 status".to_string(),
            )),
            Err(e) => Err(WorkerError::DispatcherUnavailable(e.to_string())),
        }
    }

    /// Reserve capacity, then run one iteration
    pub async fn poll_once(&self) -> PollOutcome {
        let slot = self.supervisor.reserve().await;
        self.poll_with(slot).await
    }

    async fn poll_with(&self, slot: Slot) -> PollOutcome {
        let Some(task) = self.gateway.fetch_task(self.task_type).await else {
            self.metrics.poll_empty();
            return PollOutcome::NoTask;
        };

        if self.probe.handle(&*self.gateway, &task).await {
            self.metrics.health_probe();
            return PollOutcome::Health(task.id);
        }

        match check_and_report(&self.validator, &*self.gateway, &task).await {
            Ok(command) => {
                self.metrics.task_accepted();
                PollOutcome::Dispatched {
                    task_id: task.id,
                    execution: self.supervisor.execute(task.id, command, slot),
                }
            }
            Err(CheckError::Rejected(reason)) => {
                self.metrics.task_rejected();
                PollOutcome::Rejected {
                    task_id: task.id,
                    reason,
                }
            }
            Err(CheckError::AcceptanceNotReported(task_id)) => PollOutcome::Dropped(task_id),
        }
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Shutdown is observed while waiting for capacity and while idling; a
    /// fetch in progress completes first. Running executions are left alone.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(task_type = self.task_type, service = self.probe.service(), "Worker loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.supervisor.available() == Some(0) {
                debug!("All execution slots busy, waiting");
            }

            let slot = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                slot = self.supervisor.reserve() => slot,
            };

            match self.poll_with(slot).await {
                PollOutcome::NoTask => {
                    debug!(sleep = ?self.poll_interval, "No task, idling");
                    tokio::select! {
                        _ = wait_for_shutdown(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                PollOutcome::Health(task_id) => debug!(task_id, "Health probe handled"),
                PollOutcome::Rejected { task_id, reason } => {
                    debug!(task_id, %reason, "Task rejected")
                }
                PollOutcome::Dropped(task_id) => {
                    warn!(task_id, "Acceptance report failed, task dropped")
                }
                PollOutcome::Dispatched { task_id, .. } => debug!(task_id, "Task dispatched"),
            }
        }

        info!("Worker loop stopped");
    }
}
