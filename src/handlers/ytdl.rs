use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::feed::{Feed, FeedItem};
use super::process::run_tool;
use super::{CommandHandler, HandlerError};
use crate::config::{FeedUser, YtdlConfig};
use crate::task::Domain;
use crate::validation::YtdlCommand;

const ALLOWED_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "youtu.be"];
const REFERER: &str = "Referer:https://www.google.com";

/// What to fetch, how, and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub link: String,
    /// Output path template; the downloader substitutes `%(ext)s`
    pub output_template: PathBuf,
    pub format: String,
    pub retries: u32,
}

/// Metadata of a finished download
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub webpage_url: String,
    pub ext: String,
    #[serde(default)]
    pub filesize: Option<u64>,
}

#[async_trait]
pub trait VideoDownloader: Send + Sync + 'static {
    async fn download(&self, request: &DownloadRequest) -> Result<VideoInfo, HandlerError>;
}

/// `VideoDownloader` backed by the `yt-dlp` binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
}

impl YtDlp {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl VideoDownloader for YtDlp {
    async fn download(&self, request: &DownloadRequest) -> Result<VideoInfo, HandlerError> {
        let retries = request.retries.to_string();
        let output = request.output_template.to_string_lossy();

        let stdout = run_tool(
            &self.bin,
            [
                "-f",
                request.format.as_str(),
                "--retries",
                retries.as_str(),
                "--sleep-interval",
                "10",
                "--add-header",
                REFERER,
                "--no-simulate",
                "--dump-json",
                "-o",
                &*output,
                request.link.as_str(),
            ],
        )
        .await?;

        parse_info(&stdout)
    }
}

/// Last JSON line of `--dump-json` output
fn parse_info(stdout: &str) -> Result<VideoInfo, HandlerError> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| HandlerError::Tool {
            tool: "yt-dlp".to_string(),
            detail: "no video metadata in output".to_string(),
        })?;

    serde_json::from_str(line).map_err(|e| HandlerError::Tool {
        tool: "yt-dlp".to_string(),
        detail: format!("unreadable video metadata: {}", e),
    })
}

/// Downloads a video for a configured user and publishes it in that user's feed
pub struct YtdlHandler<D: VideoDownloader> {
    downloader: Arc<D>,
    config: YtdlConfig,
    feed_lock: Mutex<()>,
}

impl<D: VideoDownloader> YtdlHandler<D> {
    pub fn new(downloader: Arc<D>, config: &YtdlConfig) -> Self {
        Self {
            downloader,
            config: config.clone(),
            feed_lock: Mutex::new(()),
        }
    }

    fn user(&self, name: &str) -> Result<&FeedUser, HandlerError> {
        self.config
            .user(name)
            .ok_or_else(|| HandlerError::InvalidInput(format!("config not found, user: {}", name)))
    }
}

#[async_trait]
impl<D: VideoDownloader> CommandHandler for YtdlHandler<D> {
    type Command = YtdlCommand;

    fn domain(&self) -> Domain {
        Domain::Ytdl
    }

    async fn execute(&self, command: YtdlCommand) -> Result<String, HandlerError> {
        let user = self.user(&command.user_name)?;
        check_link(&command.link)?;

        let feed = Feed::new(
            &self.config.content_dir,
            &self.config.content_url,
            &user.feed_name,
            &user.feed_description,
        );
        let media_dir = feed.media_dir();
        tokio::fs::create_dir_all(&media_dir).await?;

        let now = Local::now();
        let file_stem = file_stem(now);
        let request = DownloadRequest {
            link: command.link,
            output_template: output_template(&media_dir, &file_stem),
            format: user.format.clone().unwrap_or_else(|| self.config.format.clone()),
            retries: user.retries.unwrap_or(self.config.retries),
        };
        info!(link = %request.link, output = %request.output_template.display(), "Downloading video");

        let video = self.downloader.download(&request).await?;

        let item = FeedItem {
            title: video.title,
            description: video.description.unwrap_or_default(),
            webpage_url: video.webpage_url,
            file_stem,
            ext: video.ext,
            file_size: video.filesize,
            published: now,
        };
        {
            let _guard = self.feed_lock.lock().await;
            feed.append(&item).await?;
        }

        Ok("downloaded".to_string())
    }
}

fn check_link(link: &str) -> Result<(), HandlerError> {
    let url = Url::parse(link)
        .map_err(|e| HandlerError::InvalidInput(format!("link {} is not a URL: {}", link, e)))?;

    match url.host_str() {
        Some(host) if ALLOWED_HOSTS.contains(&host) => Ok(()),
        host => Err(HandlerError::InvalidInput(format!(
            "link host not allowed: {}",
            host.unwrap_or_default()
        ))),
    }
}

/// `<yyMMdd><6 hex chars>`
fn file_stem(now: DateTime<Local>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", now.format("%y%m%d"), &suffix[..6])
}

fn output_template(dir: &Path, file_stem: &str) -> PathBuf {
    dir.join(format!("{}.%(ext)s", file_stem))
}
