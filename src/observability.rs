//! Observability: tracing setup and worker counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured filter. Call once, from `main`.
pub fn init_tracing(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Metrics handle for recording counters/gauges
///
/// Constructed once per process and shared through `Arc` by the gateway,
/// the poll loop and the supervisor.
#[derive(Debug, Default)]
pub struct Metrics {
    polls_empty: AtomicU64,
    health_probes: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_accepted: AtomicU64,
    executions_succeeded: AtomicU64,
    executions_failed: AtomicU64,
    reports_failed: AtomicU64,
    inflight: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_empty(&self) {
        self.polls_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn health_probe(&self) {
        self.health_probes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "health_probes", "Metric incremented");
    }

    pub fn task_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_rejected", "Metric incremented");
    }

    pub fn task_accepted(&self) {
        self.tasks_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_accepted", "Metric incremented");
    }

    pub fn execution_started(&self) {
        self.inflight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn execution_finished(&self, succeeded: bool) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
        if succeeded {
            self.executions_succeeded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = "executions_succeeded", "Metric incremented");
        } else {
            self.executions_failed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = "executions_failed", "Metric incremented");
        }
    }

    pub fn report_failed(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "reports_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls_empty: self.polls_empty.load(Ordering::Relaxed),
            health_probes: self.health_probes.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_accepted: self.tasks_accepted.load(Ordering::Relaxed),
            executions_succeeded: self.executions_succeeded.load(Ordering::Relaxed),
            executions_failed: self.executions_failed.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            inflight: self.inflight.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub polls_empty: u64,
    pub health_probes: u64,
    pub tasks_rejected: u64,
    pub tasks_accepted: u64,
    pub executions_succeeded: u64,
    pub executions_failed: u64,
    pub reports_failed: u64,
    pub inflight: u64,
}
