mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;

use common::{MockDispatcher, SECRET};
use taskworker::config::DispatcherConfig;
use taskworker::gateway::{DispatcherGateway, GatewayError, HttpGateway};
use taskworker::observability::Metrics;
use taskworker::task::TaskStatus;

fn connect(config: &DispatcherConfig) -> (HttpGateway, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let gateway = HttpGateway::new(config, metrics.clone()).unwrap();
    (gateway, metrics)
}

/// Address nothing listens on
async fn dead_config() -> DispatcherConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    DispatcherConfig {
        addr: format!("http://{}", addr),
        secret: SECRET.to_string(),
        request_timeout: None,
    }
}

#[tokio::test]
async fn test_fetch_claims_task() {
    let dispatcher = MockDispatcher::start().await;
    dispatcher.push_task(json!({"id": 1, "type": 5, "taskData": {"tr": {"command": "list"}}}));
    let (gateway, _) = connect(&dispatcher.dispatcher_config());

    let task = gateway.fetch_task(5).await.unwrap();

    assert_eq!(task.id, 1);
    assert_eq!(task.task_type, 5);
    assert_eq!(dispatcher.fetches(), vec![5]);
}

#[tokio::test]
async fn test_no_tasks_and_unreachable_both_yield_none() {
    let dispatcher = MockDispatcher::start().await;
    let (live, _) = connect(&dispatcher.dispatcher_config());
    assert!(live.fetch_task(5).await.is_none());

    let (dead, _) = connect(&dead_config().await);
    assert!(dead.fetch_task(5).await.is_none());

    // Only the typed variant tells them apart
    assert!(matches!(live.try_fetch(5).await, Ok(None)));
    assert!(matches!(dead.try_fetch(5).await, Err(GatewayError::RequestFailed(_))));
}

#[tokio::test]
async fn test_dispatcher_error_status_yields_none() {
    let dispatcher = MockDispatcher::start().await;
    dispatcher.set_get_task_body(json!({"status": "error", "data": null, "error": "db down"}));
    let (gateway, _) = connect(&dispatcher.dispatcher_config());

    assert!(gateway.fetch_task(5).await.is_none());
    match gateway.try_fetch(5).await {
        Err(GatewayError::Dispatcher { status, error }) => {
            assert_eq!(status, "error");
            assert_eq!(error, "db down");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_200_and_garbage_yield_none() {
    let dispatcher = MockDispatcher::start().await;
    let (gateway, _) = connect(&dispatcher.dispatcher_config());

    dispatcher.set_get_task_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(
        gateway.try_fetch(5).await,
        Err(GatewayError::UnexpectedStatus { status: 500, .. })
    ));

    dispatcher.set_get_task_status(StatusCode::OK);
    dispatcher.set_get_task_body(json!("garbage"));
    assert!(matches!(
        gateway.try_fetch(5).await,
        Err(GatewayError::MalformedResponse(_))
    ));
    assert!(gateway.fetch_task(5).await.is_none());
}

#[tokio::test]
async fn test_ok_with_null_data_is_no_work() {
    let dispatcher = MockDispatcher::start().await;
    dispatcher.set_get_task_body(json!({"status": "OK", "data": null}));
    let (gateway, _) = connect(&dispatcher.dispatcher_config());

    assert!(matches!(gateway.try_fetch(5).await, Ok(None)));
}

#[tokio::test]
async fn test_report_twice_sends_twice() {
    let dispatcher = MockDispatcher::start().await;
    let (gateway, _) = connect(&dispatcher.dispatcher_config());

    assert!(gateway.report_task(7, TaskStatus::Accepted, "transmission get the job: 7").await);
    assert!(gateway.report_task(7, TaskStatus::Accepted, "transmission get the job: 7").await);

    let reports = dispatcher.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0], reports[1]);
    assert_eq!(reports[0].task_id, 7);
    assert_eq!(reports[0].status, TaskStatus::Accepted);
}

#[tokio::test]
async fn test_rejected_report_is_false() {
    let dispatcher = MockDispatcher::start().await;
    dispatcher.set_report_status(StatusCode::BAD_REQUEST);
    let (gateway, metrics) = connect(&dispatcher.dispatcher_config());

    assert!(!gateway.report_task(3, TaskStatus::Completed, "ok").await);
    assert_eq!(dispatcher.reports().len(), 1);
    assert_eq!(metrics.snapshot().reports_failed, 1);

    let (dead, _) = connect(&dead_config().await);
    assert!(!dead.report_task(3, TaskStatus::Completed, "ok").await);
}

#[tokio::test]
async fn test_secret_sent_on_every_request() {
    let dispatcher = MockDispatcher::start().await;
    let (gateway, _) = connect(&dispatcher.dispatcher_config());

    gateway.health().await.unwrap();
    gateway.fetch_task(2).await;
    gateway.report_task(1, TaskStatus::Completed, "done").await;

    let secrets = dispatcher.secrets();
    assert_eq!(secrets.len(), 3);
    assert!(secrets.iter().all(|s| s.as_deref() == Some(SECRET)));
}

#[tokio::test]
async fn test_health() {
    let dispatcher = MockDispatcher::start().await;
    let (gateway, _) = connect(&dispatcher.dispatcher_config());
    assert!(gateway.health().await.unwrap());

    dispatcher.set_health_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(!gateway.health().await.unwrap());

    let (dead, _) = connect(&dead_config().await);
    assert!(dead.health().await.is_err());
}
