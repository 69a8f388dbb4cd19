//! Worker service
//!
//! A [`Worker`] polls one task type, answers health probes, validates and
//! acknowledges payloads, and hands accepted commands to the
//! [`ExecutionSupervisor`] without waiting for them.

mod health;
mod runner;
mod supervisor;

pub use health::HealthProbe;
pub use runner::{PollOutcome, Worker};
pub use supervisor::{ExecutionSupervisor, Outcome, Slot};

use thiserror::Error;
use tokio::sync::watch;

use crate::gateway::DispatcherGateway;
use crate::handlers::CommandHandler;
use crate::validation::PayloadValidator;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("dispatcher unavailable: {0}")]
    DispatcherUnavailable(String),
}

/// Startup health check, then the poll loop until shutdown
pub async fn serve<G, V, H>(
    worker: Worker<G, V, H>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), WorkerError>
where
    G: DispatcherGateway,
    V: PayloadValidator,
    H: CommandHandler<Command = V::Command>,
{
    worker.check_dispatcher().await?;
    worker.run(shutdown).await;
    Ok(())
}

/// Resolves once `shutdown` holds `true` or its sender is gone
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}
