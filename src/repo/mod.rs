//! File-backed snapshot repositories
//!
//! Executions run concurrently, so each repository owns a single-writer lock
//! and every mutation of its files goes through it.

mod positions;
mod sync;

pub use positions::{HistoryRecord, HistoryWrite, Position, PositionsRepo};
pub use sync::{AccountSync, PositionsSync, detect_broker};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("positions list is empty")]
    Empty,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path} at line {line}: {source}")]
    Malformed {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepoError>;

pub(crate) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> RepoError {
    let path = path.into();
    move |source| RepoError::Io { path, source }
}
