//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export and health check endpoints
//! (/live, /ready) via axum 0.7. `OrchestratorMetrics` implements the
//! `OrchestratorTelemetry` port.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::OrchestratorMetrics;
