//! Domain command execution
//!
//! Each service owns one [`CommandHandler`]. Handlers talk to the outside
//! world through narrow traits ([`TorrentClient`], [`VideoDownloader`]) so the
//! dispatch path can be exercised without the real tools installed.
//! Downloaded videos are published through per-user RSS [`Feed`]s.

mod feed;
mod finance;
mod process;
mod traits;
mod transmission;
mod ytdl;

pub use feed::{Feed, FeedItem};
pub use finance::FinanceHandler;
pub use traits::{CommandHandler, HandlerError};
pub use transmission::{
    TorrentAdded, TorrentClient, TorrentSummary, TransmissionHandler, TransmissionRpc,
};
pub use ytdl::{DownloadRequest, VideoDownloader, VideoInfo, YtDlp, YtdlHandler};

#[cfg(test)]
pub(crate) use transmission::fake::FakeTorrentClient;
