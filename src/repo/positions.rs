use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::sync::{PositionsSync, load_positions_sync, update_positions_sync};
use super::{RepoError, Result, io_error};

const POSITIONS_FILE: &str = "positions.csv";
const HISTORY_FILE: &str = "positions_history.csv";

/// One holding on one account at the time of a sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub date: String,
    pub ticker: String,
    pub figi: String,
    pub account: String,
    pub quantity: f64,
    pub current_price: f64,
    pub currency: String,
    pub total_value: f64,
    pub value_in_rub: f64,
    pub value_in_usd: f64,
}

/// A row of the history: a position tagged with its snapshot day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub snapshot_date: NaiveDate,
    pub date: String,
    pub ticker: String,
    pub figi: String,
    pub account: String,
    pub quantity: f64,
    pub current_price: f64,
    pub currency: String,
    pub total_value: f64,
    pub value_in_rub: f64,
    pub value_in_usd: f64,
}

impl HistoryRecord {
    pub fn new(snapshot_date: NaiveDate, position: &Position) -> Self {
        Self {
            snapshot_date,
            date: position.date.clone(),
            ticker: position.ticker.clone(),
            figi: position.figi.clone(),
            account: position.account.clone(),
            quantity: position.quantity,
            current_price: position.current_price,
            currency: position.currency.clone(),
            total_value: position.total_value,
            value_in_rub: position.value_in_rub,
            value_in_usd: position.value_in_usd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWrite {
    Appended(usize),
    /// A snapshot for that day is already in the history; nothing written
    AlreadyExists,
}

/// Current positions (overwritten on every save) and their daily history
/// (append-only, at most one snapshot per day), stored as CSV with a header row.
pub struct PositionsRepo {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl PositionsRepo {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn positions_path(&self) -> PathBuf {
        self.data_dir.join(POSITIONS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    /// Positions from an external CSV export with the same columns
    pub async fn read_positions_file(path: &Path) -> Result<Vec<Position>> {
        read_records(path).await
    }

    pub async fn load_positions(&self) -> Result<Vec<Position>> {
        let _guard = self.write_lock.lock().await;
        let path = self.positions_path();
        let positions = read_records(&path).await?;
        debug!(count = positions.len(), path = %path.display(), "Loaded positions");
        Ok(positions)
    }

    pub async fn load_history(&self) -> Result<Vec<HistoryRecord>> {
        let _guard = self.write_lock.lock().await;
        read_records(&self.history_path()).await
    }

    /// Summary of the last positions save, if any
    pub async fn load_sync(&self) -> Result<Option<PositionsSync>> {
        let _guard = self.write_lock.lock().await;
        load_positions_sync(&self.data_dir).await
    }

    /// Replace the current positions and refresh the sync metadata
    pub async fn save_positions(&self, positions: &[Position], source: &str) -> Result<()> {
        if positions.is_empty() {
            return Err(RepoError::Empty);
        }

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(io_error(&self.data_dir))?;

        let path = self.positions_path();
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, encode_rows(positions, true)?)
            .await
            .map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).await.map_err(io_error(&path))?;

        info!(count = positions.len(), path = %path.display(), "Saved positions");

        update_positions_sync(&self.data_dir, positions, source, Local::now()).await
    }

    /// Append a snapshot of `positions` for `snapshot_date` unless that day is
    /// already recorded
    pub async fn save_positions_history(
        &self,
        positions: &[Position],
        snapshot_date: NaiveDate,
    ) -> Result<HistoryWrite> {
        if positions.is_empty() {
            return Err(RepoError::Empty);
        }

        let _guard = self.write_lock.lock().await;
        let path = self.history_path();

        if snapshot_exists(&path, snapshot_date).await? {
            info!(%snapshot_date, "Positions history snapshot already exists, skipping");
            return Ok(HistoryWrite::AlreadyExists);
        }

        let records: Vec<HistoryRecord> = positions
            .iter()
            .map(|position| HistoryRecord::new(snapshot_date, position))
            .collect();

        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(io_error(&self.data_dir))?;

        let new_file = match fs::metadata(&path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(io_error(&path)(e)),
        };

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_error(&path))?;
        file.write_all(&encode_rows(&records, new_file)?)
            .await
            .map_err(io_error(&path))?;
        file.flush().await.map_err(io_error(&path))?;

        info!(count = records.len(), %snapshot_date, path = %path.display(), "Appended positions history");
        Ok(HistoryWrite::Appended(records.len()))
    }
}

/// Linear scan of the history for `snapshot_date`
async fn snapshot_exists(path: &Path, snapshot_date: NaiveDate) -> Result<bool> {
    match read_records::<HistoryRecord>(path).await {
        Ok(records) => Ok(records.iter().any(|r| r.snapshot_date == snapshot_date)),
        Err(RepoError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RepoError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(io_error(path)(e)),
    };

    csv::Reader::from_reader(content.as_slice())
        .deserialize()
        .map(|record| {
            record.map_err(|source| RepoError::Malformed {
                path: path.to_path_buf(),
                line: source.position().map(|pos| pos.line()).unwrap_or_default(),
                source,
            })
        })
        .collect()
}

fn encode_rows<T: Serialize>(records: &[T], with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer.into_inner().map_err(|e| RepoError::Csv(e.into_error().into()))
}

#[cfg(test)]
pub(crate) fn sample_position(account: &str, ticker: &str, value_in_rub: f64) -> Position {
    Position {
        date: "2025-01-15".to_string(),
        ticker: ticker.to_string(),
        figi: format!("FIGI-{}", ticker),
        account: account.to_string(),
        quantity: 10.0,
        current_price: value_in_rub / 10.0,
        currency: "rub".to_string(),
        total_value: value_in_rub,
        value_in_rub,
        value_in_usd: value_in_rub / 100.0,
    }
}
