use crate::humanize::HumanDuration;
use crate::task::TaskType;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub transmission: TransmissionConfig,
    #[serde(default)]
    pub finance: FinanceConfig,
    #[serde(default)]
    pub ytdl: YtdlConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Connection to the task dispatcher
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_dispatcher_addr")]
    pub addr: String,
    /// Shared secret sent in the `secret` header (loaded from environment, not from config file)
    #[serde(skip, default = "default_secret")]
    pub secret: String,
    /// Per-request timeout; unset means requests may wait indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<HumanDuration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            addr: default_dispatcher_addr(),
            secret: default_secret(),
            request_timeout: None,
        }
    }
}

fn default_dispatcher_addr() -> String {
    "http://localhost:8080".to_string()
}

fn default_secret() -> String {
    "test".to_string()
}

/// Poll loop settings shared by all services
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Sleep between polls when the dispatcher has no work
    #[serde(default = "default_poll_interval")]
    pub poll_interval: HumanDuration,
    /// Maximum concurrently running executions (0 = unbounded)
    #[serde(default)]
    pub max_inflight: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_inflight: 0,
        }
    }
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration::from_secs(1)
}

/// Torrent manager service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    #[serde(default = "default_transmission_task_type")]
    pub task_type: TaskType,
    #[serde(default = "default_transmission_host")]
    pub host: String,
    #[serde(default = "default_transmission_port")]
    pub port: u16,
    /// JSON-RPC endpoint path on `host:port`
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
    /// Base directory; `folderPath` from the task is appended to it
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            task_type: default_transmission_task_type(),
            host: default_transmission_host(),
            port: default_transmission_port(),
            rpc_path: default_rpc_path(),
            download_dir: default_download_dir(),
        }
    }
}

fn default_transmission_task_type() -> TaskType {
    5
}

fn default_transmission_host() -> String {
    "transmission".to_string()
}

fn default_transmission_port() -> u16 {
    9091
}

fn default_download_dir() -> String {
    "/downloads/complete/".to_string()
}

fn default_rpc_path() -> String {
    "/transmission/rpc".to_string()
}

/// Portfolio sync service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FinanceConfig {
    #[serde(default = "default_finance_task_type")]
    pub task_type: TaskType,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            task_type: default_finance_task_type(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_finance_task_type() -> TaskType {
    6
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Video-to-feed downloader service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YtdlConfig {
    #[serde(default = "default_ytdl_task_type")]
    pub task_type: TaskType,
    /// Root of the feeds: `<content_dir>/<feed>.xml` and `<content_dir>/<feed>/`
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    /// Public URL of `content_dir`, prefix of feed and media links
    #[serde(default)]
    pub content_url: String,
    /// Format for users that do not set their own
    #[serde(default = "default_format")]
    pub format: String,
    /// Retries for users that do not set their own
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_downloader_bin")]
    pub downloader_bin: PathBuf,
    /// Accepted `userName`s and the feed each one publishes to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<FeedUser>,
}

impl Default for YtdlConfig {
    fn default() -> Self {
        Self {
            task_type: default_ytdl_task_type(),
            content_dir: default_content_dir(),
            content_url: String::new(),
            format: default_format(),
            retries: default_retries(),
            downloader_bin: default_downloader_bin(),
            users: Vec::new(),
        }
    }
}

impl YtdlConfig {
    pub fn user(&self, name: &str) -> Option<&FeedUser> {
        self.users.iter().find(|user| user.name == name)
    }
}

/// `[[ytdl.users]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedUser {
    pub name: String,
    /// File stem of the feed and name of its media directory
    pub feed_name: String,
    #[serde(default)]
    pub feed_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

fn default_ytdl_task_type() -> TaskType {
    2
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_format() -> String {
    "bestaudio".to_string()
}

fn default_retries() -> u32 {
    20
}

fn default_downloader_bin() -> PathBuf {
    PathBuf::from("yt-dlp")
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Local status server (`/health`, `/metrics`); disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_addr: Option<SocketAddr>,
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            status_addr: None,
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
