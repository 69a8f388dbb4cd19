use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Fields, PayloadError, PayloadValidator};
use crate::task::{Domain, Task};

const DOMAIN: Domain = Domain::Transmission;

/// Torrent identifier: numeric session id or info hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TorrentRef {
    Id(i64),
    Hash(String),
}

impl fmt::Display for TorrentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentRef::Id(id) => write!(f, "{}", id),
            TorrentRef::Hash(hash) => f.write_str(hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentCommand {
    Add { torrent_url: String, folder_path: String },
    Remove { torrent: TorrentRef },
    List,
}

/// `taskData.tr`: `command` first, then the fields that command needs
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmissionValidator;

impl PayloadValidator for TransmissionValidator {
    type Command = TorrentCommand;

    fn domain(&self) -> Domain {
        DOMAIN
    }

    fn validate(&self, task: &Task) -> Result<TorrentCommand, PayloadError> {
        let fields = Fields::of(task, DOMAIN)?;
        let command = fields.value("command")?;

        match command.as_str() {
            Some("add") => Ok(TorrentCommand::Add {
                torrent_url: fields.string("torrentUrl")?,
                folder_path: fields.string("folderPath")?,
            }),
            Some("del") => Ok(TorrentCommand::Remove {
                torrent: fields.get("torrentId")?,
            }),
            Some("list") => Ok(TorrentCommand::List),
            other => Err(PayloadError::UnsupportedCommand {
                domain: DOMAIN,
                command: other.map_or_else(|| command.to_string(), str::to_string),
                expected: "add/del/list",
            }),
        }
    }
}
