use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{CommandHandler, HandlerError};
use crate::config::TransmissionConfig;
use crate::task::Domain;
use crate::validation::{TorrentCommand, TorrentRef};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const RPC_TOOL: &str = "transmission-rpc";
const LIST_FIELDS: &[&str] = &["id", "name", "status", "percentDone", "rateDownload"];

/// One torrent as reported by `torrent-get`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSummary {
    pub id: i64,
    pub name: String,
    /// Daemon status code, 0 (stopped) to 6 (seeding)
    pub status: i64,
    /// Fraction in `0.0..=1.0`
    pub percent_done: f64,
    /// Bytes per second
    pub rate_download: u64,
}

impl TorrentSummary {
    pub fn status_name(&self) -> &'static str {
        match self.status {
            0 => "stopped",
            1 => "check pending",
            2 => "checking",
            3 => "download pending",
            4 => "downloading",
            5 => "seed pending",
            6 => "seeding",
            _ => "unknown",
        }
    }

    /// `id-name-status-progress-MB/s`, progress in percent
    fn line(&self) -> String {
        let progress = (self.percent_done * 10_000.0).round() / 100.0;
        let rate_mb = self.rate_download as f64 / 1024.0 / 1024.0;
        format!(
            "{}-{}-{}-{:?}-{:.3}",
            self.id,
            self.name,
            self.status_name(),
            progress,
            rate_mb
        )
    }
}

/// The torrent a successful `torrent-add` refers to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TorrentAdded {
    pub id: i64,
    pub name: String,
}

/// Operations the torrent handler needs from a torrent daemon
#[async_trait]
pub trait TorrentClient: Send + Sync + 'static {
    async fn add(&self, torrent_url: &str, download_dir: &str) -> Result<TorrentAdded, HandlerError>;

    async fn list(&self) -> Result<Vec<TorrentSummary>, HandlerError>;

    async fn remove(&self, torrent: &TorrentRef) -> Result<(), HandlerError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct AddArguments {
    #[serde(rename = "torrent-added")]
    added: Option<TorrentAdded>,
    #[serde(rename = "torrent-duplicate")]
    duplicate: Option<TorrentAdded>,
}

#[derive(Debug, Deserialize)]
struct GetArguments {
    torrents: Vec<TorrentSummary>,
}

/// `TorrentClient` speaking Transmission's JSON-RPC.
///
/// The daemon answers the first request of a session with `409` and a fresh
/// session id; the id is remembered and the request sent once more.
pub struct TransmissionRpc {
    client: Client,
    url: Url,
    session_id: Mutex<Option<String>>,
}

impl TransmissionRpc {
    pub fn new(config: &TransmissionConfig) -> Result<Self, HandlerError> {
        let url = Url::parse(&format!("http://{}:{}", config.host, config.port))
            .and_then(|base| base.join(&config.rpc_path))
            .map_err(|e| rpc_error(format!("invalid RPC address: {}", e)))?;

        let client = Client::builder()
            .user_agent(concat!("taskworker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(rpc_error)?;

        Ok(Self {
            client,
            url,
            session_id: Mutex::new(None),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, arguments: Value) -> Result<T, HandlerError> {
        let body = json!({"method": method, "arguments": arguments});

        for _ in 0..2 {
            let mut request = self.client.post(self.url.clone()).json(&body);
            if let Some(id) = self.current_session() {
                request = request.header(SESSION_HEADER, id);
            }

            let response = request.send().await.map_err(rpc_error)?;

            if response.status() == StatusCode::CONFLICT {
                let fresh = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                debug!(method, "Transmission session id refreshed");
                self.set_session(fresh);
                continue;
            }

            let status = response.status();
            if !status.is_success() {
                return Err(rpc_error(format!("{} answered {}", method, status)));
            }

            let reply: RpcResponse = response.json().await.map_err(rpc_error)?;
            if reply.result != "success" {
                return Err(rpc_error(reply.result));
            }
            return serde_json::from_value(reply.arguments).map_err(rpc_error);
        }

        Err(rpc_error(format!("{} rejected the session id twice", method)))
    }

    fn current_session(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|id| id.clone())
    }

    fn set_session(&self, id: Option<String>) {
        if let Ok(mut current) = self.session_id.lock() {
            *current = id;
        }
    }
}

#[async_trait]
impl TorrentClient for TransmissionRpc {
    async fn add(&self, torrent_url: &str, download_dir: &str) -> Result<TorrentAdded, HandlerError> {
        let arguments: AddArguments = self
            .call(
                "torrent-add",
                json!({"filename": torrent_url, "download-dir": download_dir}),
            )
            .await?;

        arguments
            .added
            .or(arguments.duplicate)
            .ok_or_else(|| rpc_error("torrent-add returned no torrent"))
    }

    async fn list(&self) -> Result<Vec<TorrentSummary>, HandlerError> {
        let arguments: GetArguments = self.call("torrent-get", json!({"fields": LIST_FIELDS})).await?;
        Ok(arguments.torrents)
    }

    async fn remove(&self, torrent: &TorrentRef) -> Result<(), HandlerError> {
        let _: Value = self.call("torrent-remove", json!({"ids": [torrent]})).await?;
        Ok(())
    }
}

fn rpc_error(detail: impl ToString) -> HandlerError {
    HandlerError::Tool {
        tool: RPC_TOOL.to_string(),
        detail: detail.to_string(),
    }
}

pub struct TransmissionHandler<C: TorrentClient> {
    client: Arc<C>,
    download_dir: String,
}

impl<C: TorrentClient> TransmissionHandler<C> {
    pub fn new(client: Arc<C>, download_dir: impl Into<String>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }
}

#[async_trait]
impl<C: TorrentClient> CommandHandler for TransmissionHandler<C> {
    type Command = TorrentCommand;

    fn domain(&self) -> Domain {
        Domain::Transmission
    }

    async fn execute(&self, command: TorrentCommand) -> Result<String, HandlerError> {
        match command {
            TorrentCommand::Add {
                torrent_url,
                folder_path,
            } => {
                // folderPath is appended verbatim to the base directory
                let dir = format!("{}{}", self.download_dir, folder_path);
                info!(%torrent_url, %dir, "Adding torrent");
                let added = self.client.add(&torrent_url, &dir).await?;
                Ok(format!("{} {}", added.id, added.name))
            }
            TorrentCommand::List => {
                let torrents = self.client.list().await?;
                if torrents.is_empty() {
                    return Ok("no torrents".to_string());
                }

                let mut msg = String::from("torrent list \n");
                for torrent in &torrents {
                    msg.push_str(&torrent.line());
                    msg.push('\n');
                }
                Ok(msg)
            }
            TorrentCommand::Remove { torrent } => {
                info!(%torrent, "Removing torrent");
                self.client.remove(&torrent).await?;
                Ok("ok".to_string())
            }
        }
    }
}


#[cfg(test)]
pub(crate) fn sample_torrent(id: i64, name: &str) -> TorrentSummary {
    TorrentSummary {
        id,
        name: name.to_string(),
        status: 6,
        percent_done: 1.0,
        rate_download: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTorrentClient;
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::HeaderMap,
        response::{IntoResponse, Response},
        routing::post,
    };
    use tokio::net::TcpListener;

    const SESSION: &str = "sess-1";

    #[derive(Default)]
    struct Daemon {
        calls: Mutex<Vec<(Option<String>, Value)>>,
        torrent_get: Mutex<Option<Value>>,
    }

    async fn rpc(State(daemon): State<Arc<Daemon>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let session = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        daemon.calls.lock().unwrap().push((session.clone(), body.clone()));

        if session.as_deref() != Some(SESSION) {
            return (StatusCode::CONFLICT, [(SESSION_HEADER, SESSION)], "").into_response();
        }

        let reply = match body["method"].as_str() {
            Some("torrent-add") => json!({
                "result": "success",
                "arguments": {"torrent-added": {"id": 12, "name": "debian.iso", "hashString": "c0ffee"}}
            }),
            Some("torrent-get") => daemon
                .torrent_get
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| json!({"result": "success", "arguments": {"torrents": []}})),
            Some("torrent-remove") => json!({"result": "success", "arguments": {}}),
            _ => json!({"result": "method name not recognized"}),
        };
        Json(reply).into_response()
    }

    async fn start_daemon() -> (Arc<Daemon>, TransmissionRpc) {
        let daemon = Arc::new(Daemon::default());
        let app = Router::new()
            .route("/transmission/rpc", post(rpc))
            .with_state(daemon.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = TransmissionConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };
        (daemon, TransmissionRpc::new(&config).unwrap())
    }

    fn handler(client: FakeTorrentClient) -> (Arc<FakeTorrentClient>, TransmissionHandler<FakeTorrentClient>) {
        let client = Arc::new(client);
        let handler = TransmissionHandler::new(client.clone(), "/downloads/complete/");
        (client, handler)
    }

    #[test]
    fn test_line_format() {
        let torrent = TorrentSummary {
            id: 2,
            name: "debian.iso".to_string(),
            status: 4,
            percent_done: 0.4237,
            rate_download: 1_572_864,
        };
        assert_eq!(torrent.line(), "2-debian.iso-downloading-42.37-1.500");
        assert_eq!(sample_torrent(1, "x").line(), "1-x-seeding-100.0-0.000");
    }

    #[tokio::test]
    async fn test_rpc_session_handshake_and_add() {
        let (daemon, client) = start_daemon().await;

        let added = client.add("magnet:?xt=abc", "/downloads/complete/iso").await.unwrap();
        assert_eq!(added, TorrentAdded { id: 12, name: "debian.iso".to_string() });

        client.remove(&TorrentRef::Id(12)).await.unwrap();

        let calls = daemon.calls.lock().unwrap();
        // 409 handshake, retried add, then remove on the remembered session
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, None);
        assert_eq!(calls[1].0.as_deref(), Some(SESSION));
        assert_eq!(calls[1].1["arguments"]["download-dir"], "/downloads/complete/iso");
        assert_eq!(calls[2].1, json!({"method": "torrent-remove", "arguments": {"ids": [12]}}));
    }

    #[tokio::test]
    async fn test_rpc_list_and_failure_result() {
        let (daemon, client) = start_daemon().await;
        *daemon.torrent_get.lock().unwrap() = Some(json!({
            "result": "success",
            "arguments": {"torrents": [
                {"id": 1, "name": "a", "status": 6, "percentDone": 1.0, "rateDownload": 0}
            ]}
        }));

        let torrents = client.list().await.unwrap();
        assert_eq!(torrents, vec![sample_torrent(1, "a")]);

        *daemon.torrent_get.lock().unwrap() = Some(json!({"result": "no such torrent"}));
        let err = client.list().await.unwrap_err();
        assert_eq!(err.to_string(), "transmission-rpc failed: no such torrent");
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (_, handler) = handler(FakeTorrentClient::default());
        assert_eq!(handler.execute(TorrentCommand::List).await.unwrap(), "no torrents");
    }

    #[tokio::test]
    async fn test_list_formats_rows() {
        let (_, handler) = handler(FakeTorrentClient {
            torrents: vec![sample_torrent(1, "Ubuntu 24.04 Desktop"), sample_torrent(2, "debian.iso")],
            ..Default::default()
        });

        let msg = handler.execute(TorrentCommand::List).await.unwrap();
        assert_eq!(
            msg,
            "torrent list \n1-Ubuntu 24.04 Desktop-seeding-100.0-0.000\n2-debian.iso-seeding-100.0-0.000\n"
        );
    }

    #[tokio::test]
    async fn test_add_appends_folder_to_base_dir() {
        let (client, handler) = handler(FakeTorrentClient::default());

        let msg = handler
            .execute(TorrentCommand::Add {
                torrent_url: "magnet:?xt=abc".to_string(),
                folder_path: "movies".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(msg, "1 magnet:?xt=abc");
        assert_eq!(
            client.added.lock().unwrap().as_slice(),
            &[("magnet:?xt=abc".to_string(), "/downloads/complete/movies".to_string())]
        );
    }

    #[tokio::test]
    async fn test_remove_answers_ok() {
        let (client, handler) = handler(FakeTorrentClient::default());

        let msg = handler
            .execute(TorrentCommand::Remove {
                torrent: TorrentRef::Id(7),
            })
            .await
            .unwrap();

        assert_eq!(msg, "ok");
        assert_eq!(client.removed.lock().unwrap().as_slice(), &["7".to_string()]);
    }

    #[tokio::test]
    async fn test_client_failure_propagates() {
        let (_, handler) = handler(FakeTorrentClient {
            fail_with: Some("Couldn't connect to server".to_string()),
            ..Default::default()
        });

        let err = handler.execute(TorrentCommand::List).await.unwrap_err();
        assert_eq!(err.to_string(), "transmission-rpc failed: Couldn't connect to server");
    }
}
