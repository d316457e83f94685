//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketConnector`: Prediction market venues (reads and trading)
//! - `BlockchainConnector`: Settlement chains (balances, broadcast, finality)
//! - `OrchestratorTelemetry`: Metrics sink for fan-out and delegation

pub mod blockchain;
pub mod market_connector;
pub mod telemetry;

pub use blockchain::BlockchainConnector;
pub use market_connector::MarketConnector;
pub use telemetry::{NoopTelemetry, OrchestratorTelemetry};
