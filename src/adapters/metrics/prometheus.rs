//! Prometheus Metrics Registry - Orchestrator Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards:
//! fan-out latency, swallowed per-platform failures and delegated
//! call outcomes.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::ports::OrchestratorTelemetry;

/// Centralized Prometheus metrics for the orchestrator.
///
/// All metrics follow the naming convention `pm_trader_*`.
pub struct OrchestratorMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Aggregate call latency (seconds), by operation.
    pub fanout_latency: HistogramVec,
    /// Platform failures swallowed by aggregate reads.
    pub fanout_failures: IntCounterVec,
    /// Single-platform delegations, by outcome.
    pub delegated_calls: IntCounterVec,
}

impl OrchestratorMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let fanout_latency = HistogramVec::new(
            HistogramOpts::new(
                "pm_trader_fanout_latency_seconds",
                "Aggregate read latency across all platforms",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )?;

        let fanout_failures = IntCounterVec::new(
            Opts::new(
                "pm_trader_fanout_failures_total",
                "Platform failures skipped during aggregate reads",
            ),
            &["platform", "operation", "kind"],
        )?;

        let delegated_calls = IntCounterVec::new(
            Opts::new(
                "pm_trader_delegated_calls_total",
                "Single-platform calls by outcome",
            ),
            &["platform", "operation", "outcome"],
        )?;

        registry.register(Box::new(fanout_latency.clone()))?;
        registry.register(Box::new(fanout_failures.clone()))?;
        registry.register(Box::new(delegated_calls.clone()))?;

        Ok(Self {
            registry,
            fanout_latency,
            fanout_failures,
            delegated_calls,
        })
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move { metrics.render() }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl OrchestratorTelemetry for OrchestratorMetrics {
    fn record_fanout(&self, operation: &str, elapsed: Duration) {
        self.fanout_latency
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    fn record_platform_failure(&self, platform: &str, operation: &str, error_kind: &str) {
        self.fanout_failures
            .with_label_values(&[platform, operation, error_kind])
            .inc();
    }

    fn record_delegation(&self, platform: &str, operation: &str, outcome: &str) {
        self.delegated_calls
            .with_label_values(&[platform, operation, outcome])
            .inc();
    }
}
