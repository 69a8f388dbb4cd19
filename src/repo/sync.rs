use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use super::positions::Position;
use super::{Result, io_error};

const METADATA_DIR: &str = "metadata";
const SYNC_FILE: &str = "last_sync.json";
const SECTIONS: &[&str] = &["positions", "transactions", "positions_history"];

/// `positions` section of `metadata/last_sync.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionsSync {
    pub last_updated: DateTime<Local>,
    pub status: String,
    pub total_records: usize,
    pub accounts: BTreeMap<String, AccountSync>,
}

/// Per-account summary of the last positions sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSync {
    pub broker: String,
    pub last_updated: DateTime<Local>,
    pub records_count: usize,
    pub value_rub: f64,
    pub status: String,
    pub source: String,
}

/// Broker code for an account's system name
pub fn detect_broker(account: &str) -> &'static str {
    match account {
        "GENERAL" | "FAMILY" | "IIS_2025" | "IIS_122025" | "InvestBox" => "TCS",
        "SBER" => "SBER",
        "FINEXP" => "FINEXP",
        _ => {
            warn!(account, "Unknown account for broker detection");
            "UNKNOWN"
        }
    }
}

fn build_positions_sync(
    positions: &[Position],
    source: &str,
    timestamp: DateTime<Local>,
) -> PositionsSync {
    let mut accounts: BTreeMap<String, AccountSync> = BTreeMap::new();

    for position in positions {
        let entry = accounts
            .entry(position.account.clone())
            .or_insert_with(|| AccountSync {
                broker: detect_broker(&position.account).to_string(),
                last_updated: timestamp,
                records_count: 0,
                value_rub: 0.0,
                status: "success".to_string(),
                source: source.to_string(),
            });
        entry.records_count += 1;
        entry.value_rub += position.value_in_rub;
    }

    PositionsSync {
        last_updated: timestamp,
        status: "success".to_string(),
        total_records: positions.len(),
        accounts,
    }
}

/// Rewrite the `positions` section, keeping the other sections as they are.
///
/// Callers hold the owning repository's write lock.
pub(crate) async fn update_positions_sync(
    data_dir: &Path,
    positions: &[Position],
    source: &str,
    timestamp: DateTime<Local>,
) -> Result<()> {
    let dir = data_dir.join(METADATA_DIR);
    let path = dir.join(SYNC_FILE);

    let mut document = load_document(&path).await;
    let section = build_positions_sync(positions, source, timestamp);
    document.insert("positions".to_string(), serde_json::to_value(section)?);

    fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;
    fs::write(&path, serde_json::to_string_pretty(&Value::Object(document))?)
        .await
        .map_err(io_error(&path))?;

    debug!(count = positions.len(), path = %path.display(), "Updated sync metadata");
    Ok(())
}

/// Read the `positions` section, if any sync has happened yet
pub(crate) async fn load_positions_sync(data_dir: &Path) -> Result<Option<PositionsSync>> {
    let path = data_dir.join(METADATA_DIR).join(SYNC_FILE);
    let mut document = load_document(&path).await;

    match document.remove("positions") {
        Some(Value::Object(section)) if !section.is_empty() => {
            Ok(Some(serde_json::from_value(Value::Object(section))?))
        }
        _ => Ok(None),
    }
}

/// Existing document, or an empty skeleton when missing or unreadable
async fn load_document(path: &Path) -> Map<String, Value> {
    let existing = match fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Some(map),
            _ => {
                warn!(path = %path.display(), "Sync metadata unreadable, starting fresh");
                None
            }
        },
        Err(_) => None,
    };

    existing.unwrap_or_else(|| {
        SECTIONS
            .iter()
            .map(|name| (name.to_string(), Value::Object(Map::new())))
            .collect()
    })
}
