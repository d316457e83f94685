//! Prediction Market Trader - Library Root
//!
//! One orchestrator over many prediction-market venues settling on
//! different chains. Re-exports all modules for integration tests and
//! benchmarks.

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
