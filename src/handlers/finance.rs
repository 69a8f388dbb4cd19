use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::info;

use super::{CommandHandler, HandlerError};
use crate::repo::{HistoryWrite, PositionsRepo};
use crate::task::Domain;
use crate::validation::FinanceCommand;

const SYNC: &str = "sync";

/// Finance commands over the positions repository.
///
/// `sync` snapshots the current positions into the daily history; every other
/// command is acknowledged with `done`.
pub struct FinanceHandler {
    repo: Arc<PositionsRepo>,
}

impl FinanceHandler {
    pub fn new(repo: Arc<PositionsRepo>) -> Self {
        Self { repo }
    }

    async fn run(&self, command: &str, today: NaiveDate) -> Result<String, HandlerError> {
        if command != SYNC {
            info!(command, "Finance command has no action");
            return Ok("done".to_string());
        }

        let positions = self.repo.load_positions().await?;
        match self.repo.save_positions_history(&positions, today).await? {
            HistoryWrite::Appended(count) => Ok(format!(
                "positions history saved: {} records for {}",
                count, today
            )),
            HistoryWrite::AlreadyExists => {
                Ok(format!("positions history already saved for {}", today))
            }
        }
    }
}

#[async_trait]
impl CommandHandler for FinanceHandler {
    type Command = FinanceCommand;

    fn domain(&self) -> Domain {
        Domain::Finance
    }

    async fn execute(&self, command: FinanceCommand) -> Result<String, HandlerError> {
        self.run(&command.command, Local::now().date_naive()).await
    }
}
