//! Use Cases Layer - Application Business Logic
//!
//! Composes port implementations into the trader's workflows.
//!
//! Use cases:
//! - `Orchestrator`: platform registry, fan-out reads, delegated writes
//! - `wait_for_finality`: shared confirmation polling over a chain

pub mod confirmation;
pub mod orchestrator;

pub use confirmation::{wait_for_finality, ConfirmationPolicy};
pub use orchestrator::{Aggregate, Orchestrator, OrchestratorBuilder};
