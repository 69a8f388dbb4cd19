use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use taskworker::observability::{Metrics, MetricsSnapshot};
use taskworker::server::status_router;

#[tokio::test]
async fn test_health_endpoint() {
    let app = status_router(Arc::new(Metrics::new()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_metrics_endpoint_reflects_counters() {
    let metrics = Arc::new(Metrics::new());
    metrics.task_accepted();
    metrics.task_rejected();
    metrics.execution_started();

    let app = status_router(metrics.clone());
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["tasks_accepted"], 1);
    assert_eq!(json["tasks_rejected"], 1);
    assert_eq!(json["inflight"], 1);

    let expected: MetricsSnapshot = metrics.snapshot();
    assert_eq!(json["executions_succeeded"], expected.executions_succeeded);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = status_router(Arc::new(Metrics::new()));

    let response = app
        .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
