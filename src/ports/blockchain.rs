//! Blockchain Connector Port - Settlement Chain Interface
//!
//! Balance queries, raw transaction broadcast and single-poll
//! confirmation checks. Waiting loops live in the usecases layer
//! (`usecases::confirmation`) so every chain shares one policy.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{ConfirmationStatus, SignedTransaction, TradingResult, TransactionRef};

/// Trait for settlement chains.
#[async_trait]
pub trait BlockchainConnector: Send + Sync + 'static {
  /// Chain name used in logs and market records (e.g. "polygon").
  fn name(&self) -> &str;

  /// Native balance when `token` is `None`, else the balance of the
  /// token contract / mint, in whole tokens.
  async fn get_balance(&self, address: &str, token: Option<&str>) -> TradingResult<Decimal>;

  /// Broadcast a signed transaction and return its chain identifier.
  async fn submit_transaction(&self, tx: &SignedTransaction) -> TradingResult<TransactionRef>;

  /// Poll the chain once for the state of `tx`.
  async fn confirm(&self, tx: &TransactionRef) -> TradingResult<ConfirmationStatus>;

  /// Cheap liveness check, reported at startup.
  async fn is_healthy(&self) -> bool {
    true
  }
}
