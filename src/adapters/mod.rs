//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (venue REST APIs, blockchain RPC, HTTP servers).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: REST venue connectors and their rate-limited HTTP client
//! - `chain`: EVM (alloy-rs), Solana (JSON-RPC) and simulated chains
//! - `metrics`: Prometheus metrics export and health checks
//! - `paper`: Fixture-backed paper trading venue

pub mod api;
pub mod chain;
pub mod metrics;
pub mod paper;

