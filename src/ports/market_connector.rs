//! Market Connector Port - Prediction Market Platform Interface
//!
//! One implementation per trading venue. Connectors speak the
//! canonical domain model: prices in `[0, 1]`, shares and quote
//! amounts as `Decimal`, errors as `TradingError`.
//!
//! Connectors are shared across concurrent orchestrator tasks, so
//! every method takes `&self` and implementors must be `Send + Sync`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{
  Market, MarketFilter, Orderbook, Position, PositionSide, TradingResult, TransactionOutcome,
  TransactionRef,
};

/// Trait for prediction market platforms.
#[async_trait]
pub trait MarketConnector: Send + Sync + 'static {
  /// List up to `limit` markets admitted by `filter`, in the venue's
  /// native order.
  async fn list_markets(&self, filter: &MarketFilter, limit: usize) -> TradingResult<Vec<Market>>;

  /// Fetch one market. `Ok(None)` when the venue does not know the id.
  async fn get_market(&self, market_id: &str) -> TradingResult<Option<Market>>;

  /// Current price of `side` in `[0, 1]`.
  ///
  /// # Errors
  /// `MarketNotFound` for an unknown market, `InvalidSide` when the
  /// market does not offer the side.
  async fn get_price(&self, market_id: &str, side: PositionSide) -> TradingResult<Decimal>;

  /// Normalized YES-side orderbook.
  async fn get_orderbook(&self, market_id: &str) -> TradingResult<Orderbook>;

  /// Spend `amount` quote currency on `side`.
  ///
  /// When `max_price` is set and the achievable price exceeds it the
  /// call fails with `SlippageExceeded` before anything is submitted.
  async fn create_position(
    &self,
    market_id: &str,
    side: PositionSide,
    amount: Decimal,
    max_price: Option<Decimal>,
  ) -> TradingResult<TransactionRef>;

  /// Close `shares` of a position, or all of it when `None`.
  async fn close_position(
    &self,
    position_id: &str,
    shares: Option<Decimal>,
  ) -> TradingResult<TransactionRef>;

  /// Positions held by `address` on this platform.
  async fn get_positions(&self, address: &str) -> TradingResult<Vec<Position>>;

  /// Wait until a transaction submitted by this connector is final.
  async fn wait_for_confirmation(&self, tx: &TransactionRef) -> TradingResult<TransactionOutcome>;
}
