//! Telemetry Port - Orchestrator Observability Hooks
//!
//! The orchestrator reports fan-out timings and swallowed failures
//! through this trait so the usecases layer stays free of any
//! concrete metrics backend.

use std::time::Duration;

/// Sink for orchestrator measurements.
pub trait OrchestratorTelemetry: Send + Sync + 'static {
  /// One aggregate call finished (or was cancelled) after `elapsed`.
  fn record_fanout(&self, operation: &str, elapsed: Duration);

  /// A platform failed inside an aggregate call and was skipped.
  fn record_platform_failure(&self, platform: &str, operation: &str, error_kind: &str);

  /// A single-platform delegation completed with `outcome` ("ok" or an error kind).
  fn record_delegation(&self, platform: &str, operation: &str, outcome: &str);
}

/// Telemetry sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl OrchestratorTelemetry for NoopTelemetry {
  fn record_fanout(&self, _operation: &str, _elapsed: Duration) {}

  fn record_platform_failure(&self, _platform: &str, _operation: &str, _error_kind: &str) {}

  fn record_delegation(&self, _platform: &str, _operation: &str, _outcome: &str) {}
}
