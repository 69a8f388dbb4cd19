use std::any::Any;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::gateway::DispatcherGateway;
use crate::handlers::{CommandHandler, HandlerError};
use crate::observability::Metrics;
use crate::task::{TaskId, TaskStatus};

/// How an execution ended. Both variants go on the wire as `COMPLETED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(String),
    Failed { kind: &'static str, detail: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    fn from_error(err: HandlerError) -> Self {
        Outcome::Failed {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

/// Capacity reserved for one execution; released on drop
#[derive(Debug)]
pub struct Slot(Option<OwnedSemaphorePermit>);

/// Runs accepted commands on their own tokio tasks and reports completion.
///
/// The poll loop never waits on an execution. With a non-zero
/// `max_inflight`, [`reserve`](Self::reserve) blocks until a slot frees up.
pub struct ExecutionSupervisor<G, H> {
    gateway: Arc<G>,
    handler: Arc<H>,
    metrics: Arc<Metrics>,
    limit: Option<Arc<Semaphore>>,
}

impl<G, H> ExecutionSupervisor<G, H>
where
    G: DispatcherGateway,
    H: CommandHandler,
{
    pub fn new(gateway: Arc<G>, handler: Arc<H>, metrics: Arc<Metrics>, max_inflight: usize) -> Self {
        let limit = (max_inflight > 0).then(|| Arc::new(Semaphore::new(max_inflight)));
        Self {
            gateway,
            handler,
            metrics,
            limit,
        }
    }

    /// Free execution slots, `None` when unbounded
    pub fn available(&self) -> Option<usize> {
        self.limit.as_ref().map(|sem| sem.available_permits())
    }

    pub async fn reserve(&self) -> Slot {
        match &self.limit {
            // The semaphore is never closed, so acquisition only fails on shutdown races
            Some(sem) => Slot(sem.clone().acquire_owned().await.ok()),
            None => Slot(None),
        }
    }

    /// Start `command` and return a handle resolving to its outcome.
    ///
    /// The completion report is sent from the spawned task; a panicking
    /// handler is reported as a failure.
    pub fn execute(&self, task_id: TaskId, command: H::Command, slot: Slot) -> JoinHandle<Outcome> {
        let gateway = self.gateway.clone();
        let handler = self.handler.clone();
        let metrics = self.metrics.clone();
        let domain = handler.domain();
        let execution_id = Uuid::now_v7();
        let span = info_span!("execution", task_id, %execution_id, %domain);

        metrics.execution_started();

        tokio::spawn(
            async move {
                let _slot = slot;

                let run = tokio::spawn(
                    async move { handler.execute(command).await }.in_current_span(),
                );

                let outcome = match run.await {
                    Ok(Ok(message)) => Outcome::Succeeded(message),
                    Ok(Err(err)) => Outcome::from_error(err),
                    Err(join_err) => {
                        Outcome::from_error(HandlerError::Panicked(describe_join_error(join_err)))
                    }
                };

                metrics.execution_finished(outcome.is_success());

                let message = match &outcome {
                    Outcome::Succeeded(message) => {
                        info!("Execution succeeded");
                        message.clone()
                    }
                    Outcome::Failed { kind, detail } => {
                        error!(kind, %detail, "Execution failed");
                        format!("{} failed: {}", domain.display_name(), detail)
                    }
                };

                if !gateway
                    .report_task(task_id, TaskStatus::Completed, &message)
                    .await
                {
                    warn!("Completion report not delivered");
                }

                outcome
            }
            .instrument(span),
        )
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "cancelled".to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
