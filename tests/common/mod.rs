//! In-process dispatcher for integration tests

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use taskworker::config::DispatcherConfig;
use taskworker::gateway::{GetTaskRequest, ReportTaskRequest};

pub const SECRET: &str = "s3cret";

struct Inner {
    tasks: VecDeque<Value>,
    get_task_body: Option<Value>,
    get_task_status: StatusCode,
    report_status: StatusCode,
    health_status: StatusCode,
    fetches: Vec<i64>,
    reports: Vec<ReportTaskRequest>,
    secrets: Vec<Option<String>>,
}

type Shared = Arc<Mutex<Inner>>;

/// Dispatcher stand-in bound to `127.0.0.1:0`; records everything it receives
pub struct MockDispatcher {
    pub addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockDispatcher {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(Inner {
            tasks: VecDeque::new(),
            get_task_body: None,
            get_task_status: StatusCode::OK,
            report_status: StatusCode::OK,
            health_status: StatusCode::OK,
            fetches: Vec::new(),
            reports: Vec::new(),
            secrets: Vec::new(),
        }));

        let app = Router::new()
            .route("/health/", get(health))
            .route("/get-task/", post(get_task))
            .route("/report-task/", post(report_task))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            addr: self.url(),
            secret: SECRET.to_string(),
            request_timeout: None,
        }
    }

    pub fn push_task(&self, task: Value) {
        self.state.lock().unwrap().tasks.push_back(task);
    }

    /// Answer every `get-task` with this body instead of the queue
    pub fn set_get_task_body(&self, body: Value) {
        self.state.lock().unwrap().get_task_body = Some(body);
    }

    pub fn set_get_task_status(&self, status: StatusCode) {
        self.state.lock().unwrap().get_task_status = status;
    }

    pub fn set_report_status(&self, status: StatusCode) {
        self.state.lock().unwrap().report_status = status;
    }

    pub fn set_health_status(&self, status: StatusCode) {
        self.state.lock().unwrap().health_status = status;
    }

    pub fn reports(&self) -> Vec<ReportTaskRequest> {
        self.state.lock().unwrap().reports.clone()
    }

    pub fn fetches(&self) -> Vec<i64> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn secrets(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().secrets.clone()
    }

    /// Wait until at least `count` reports arrived
    pub async fn wait_for_reports(&self, count: usize) -> Vec<ReportTaskRequest> {
        for _ in 0..200 {
            let reports = self.reports();
            if reports.len() >= count {
                return reports;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected {} reports, got {:?}", count, self.reports());
    }
}

impl Drop for MockDispatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn record_secret(state: &Shared, headers: &HeaderMap) {
    let secret = headers
        .get("secret")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().unwrap().secrets.push(secret);
}

async fn health(State(state): State<Shared>, headers: HeaderMap) -> StatusCode {
    record_secret(&state, &headers);
    state.lock().unwrap().health_status
}

async fn get_task(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<GetTaskRequest>,
) -> (StatusCode, Json<Value>) {
    record_secret(&state, &headers);
    let mut inner = state.lock().unwrap();
    inner.fetches.push(request.task_type);

    if let Some(body) = inner.get_task_body.clone() {
        return (inner.get_task_status, Json(body));
    }

    let body = match inner.tasks.pop_front() {
        Some(task) => json!({"status": "OK", "data": task, "error": ""}),
        None => json!({"status": "no tasks", "data": null, "error": ""}),
    };
    (inner.get_task_status, Json(body))
}

async fn report_task(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<ReportTaskRequest>,
) -> (StatusCode, Json<Value>) {
    record_secret(&state, &headers);
    let mut inner = state.lock().unwrap();
    inner.reports.push(request);

    let status = inner.report_status;
    let body = if status.is_success() {
        json!({"status": "OK"})
    } else {
        json!({"status": "error", "error": "report rejected"})
    };
    (status, Json(body))
}
