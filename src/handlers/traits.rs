use async_trait::async_trait;
use thiserror::Error;

use crate::repo::RepoError;
use crate::task::Domain;

/// Why a domain action did not complete
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{tool} failed: {detail}")]
    Tool { tool: String, detail: String },

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::InvalidInput(_) => "invalid_input",
            HandlerError::Tool { .. } => "tool",
            HandlerError::Repo(_) => "repo",
            HandlerError::Feed(_) => "feed",
            HandlerError::Io(_) => "io",
            HandlerError::Panicked(_) => "panic",
        }
    }
}

/// Executes an accepted command for one domain.
///
/// The returned text is the completion message sent to the dispatcher.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    type Command: Send + 'static;

    fn domain(&self) -> Domain;

    async fn execute(&self, command: Self::Command) -> Result<String, HandlerError>;
}
