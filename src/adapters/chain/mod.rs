//! Chain Adapters - Blockchain Connector Implementations
//!
//! Provides `BlockchainConnector` implementations for:
//! - EVM networks (Ethereum, Polygon, BNB Chain) via alloy-rs 0.9
//! - Solana via JSON-RPC
//! - An in-memory simulated ledger for dry runs

pub mod evm;
pub mod simulated;
pub mod solana;

pub use evm::{EvmChain, EvmChainConfig};
pub use simulated::SimulatedChain;
pub use solana::SolanaChain;
