//! Health Check Server - Liveness and Readiness Checks
//!
//! Exposes /live and /ready endpoints via axum 0.7 for Docker
//! health checks and monitoring. Readiness requires at least one
//! registered platform and a process that is not shutting down.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Shared health state polled by readiness checks.
#[derive(Debug)]
pub struct HealthState {
    /// Number of platforms registered with the orchestrator.
    pub platforms_registered: AtomicUsize,
    /// Cleared when graceful shutdown begins.
    pub accepting: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            platforms_registered: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
        }
    }
}

impl HealthState {
    pub fn set_platforms(&self, count: usize) {
        self.platforms_registered.store(count, Ordering::Relaxed);
    }

    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::Relaxed);
    }

    /// Check if the system is ready to serve traffic.
    pub fn is_ready(&self) -> bool {
        self.accepting.load(Ordering::Relaxed)
            && self.platforms_registered.load(Ordering::Relaxed) > 0
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Health state shared with all components.
    state: Arc<HealthState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    fn router(state: Arc<HealthState>) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(state)
    }

    /// Run the health check server until shutdown is broadcast.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Self::router(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness: 200 once platforms are registered, 503 otherwise.
    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}
