//! Shared test fixtures: hand-written stub connectors for timing,
//! failure and call-counting scenarios that mocks express poorly.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use prediction_market_trader::domain::{
  ConfirmationStatus, Market, MarketFilter, MarketStatus, Orderbook, Position, PositionSide,
  SignedTransaction, TradingError, TradingResult, TransactionOutcome, TransactionRef,
};
use prediction_market_trader::ports::{BlockchainConnector, MarketConnector, OrchestratorTelemetry};

pub fn market(platform: &str, blockchain: &str, id: &str) -> Market {
  Market {
    market_id: id.to_string(),
    question: format!("Question {id}?"),
    description: None,
    outcomes: Market::binary_outcomes(),
    status: MarketStatus::Open,
    end_date: None,
    volume: None,
    liquidity: None,
    platform: platform.to_string(),
    blockchain: blockchain.to_string(),
    metadata: BTreeMap::new(),
  }
}

pub fn position(platform: &str, id: &str, shares: Decimal) -> Position {
  Position {
    position_id: id.to_string(),
    market_id: format!("market-{id}"),
    side: PositionSide::Yes,
    shares,
    cost_basis: shares / Decimal::TWO,
    current_value: shares / Decimal::TWO,
    platform: platform.to_string(),
    blockchain: "sim".to_string(),
  }
}

/// Read-only venue that answers after `delay`, or fails with `error`.
pub struct StubVenue {
  pub name: String,
  pub markets: Vec<Market>,
  pub positions: Vec<Position>,
  pub delay: Duration,
  pub error: Option<TradingError>,
  pub calls: AtomicUsize,
}

impl StubVenue {
  pub fn new(name: &str, market_count: usize) -> Self {
    Self {
      name: name.to_string(),
      markets: (0..market_count)
        .map(|i| market(name, "sim", &format!("{name}-{i}")))
        .collect(),
      positions: vec![position(name, &format!("{name}-pos"), Decimal::TEN)],
      delay: Duration::ZERO,
      error: None,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn delayed(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn failing(mut self, error: TradingError) -> Self {
    self.error = Some(error);
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  async fn respond<T>(&self, value: T) -> TradingResult<T> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    match &self.error {
      Some(e) => Err(e.clone()),
      None => Ok(value),
    }
  }
}

#[async_trait]
impl MarketConnector for StubVenue {
  async fn list_markets(&self, filter: &MarketFilter, limit: usize) -> TradingResult<Vec<Market>> {
    self
      .respond(
        self
          .markets
          .iter()
          .filter(|m| filter.matches(m))
          .take(limit)
          .cloned()
          .collect(),
      )
      .await
  }

  async fn get_market(&self, market_id: &str) -> TradingResult<Option<Market>> {
    self
      .respond(self.markets.iter().find(|m| m.market_id == market_id).cloned())
      .await
  }

  async fn get_price(&self, _market_id: &str, _side: PositionSide) -> TradingResult<Decimal> {
    self.respond(Decimal::new(5, 1)).await
  }

  async fn get_orderbook(&self, market_id: &str) -> TradingResult<Orderbook> {
    self
      .respond(Orderbook::empty(market_id))
      .await
  }

  async fn create_position(
    &self,
    _market_id: &str,
    _side: PositionSide,
    _amount: Decimal,
    _max_price: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    Err(TradingError::not_supported(self.name.clone(), "create_position"))
  }

  async fn close_position(
    &self,
    _position_id: &str,
    _shares: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    Err(TradingError::not_supported(self.name.clone(), "close_position"))
  }

  async fn get_positions(&self, _address: &str) -> TradingResult<Vec<Position>> {
    self.respond(self.positions.clone()).await
  }

  async fn wait_for_confirmation(&self, _tx: &TransactionRef) -> TradingResult<TransactionOutcome> {
    self.respond(TransactionOutcome::Confirmed).await
  }
}

/// Chain that confirms everything immediately and counts every call.
#[derive(Default)]
pub struct RecordingChain {
  pub balance_calls: AtomicUsize,
  pub submissions: Mutex<Vec<Vec<u8>>>,
  pub confirm_calls: AtomicUsize,
  /// How long each submission takes to be accepted.
  pub submit_delay: Duration,
  /// Reject submissions with `UpstreamUnavailable` while set.
  pub refusing: AtomicBool,
}

impl RecordingChain {
  pub fn slow(submit_delay: Duration) -> Self {
    Self {
      submit_delay,
      ..Self::default()
    }
  }

  pub fn refuse(&self, refusing: bool) {
    self.refusing.store(refusing, Ordering::SeqCst);
  }

  pub fn total_calls(&self) -> usize {
    self.balance_calls.load(Ordering::SeqCst)
      + self.submission_count()
      + self.confirm_calls.load(Ordering::SeqCst)
  }

  pub fn submission_count(&self) -> usize {
    self.submissions.lock().unwrap().len()
  }

  /// Decoded JSON of the `index`-th submission.
  pub fn submission_json(&self, index: usize) -> serde_json::Value {
    serde_json::from_slice(&self.submissions.lock().unwrap()[index]).unwrap()
  }
}

#[async_trait]
impl BlockchainConnector for RecordingChain {
  fn name(&self) -> &str {
    "recording"
  }

  async fn get_balance(&self, _address: &str, _token: Option<&str>) -> TradingResult<Decimal> {
    self.balance_calls.fetch_add(1, Ordering::SeqCst);
    Ok(Decimal::ZERO)
  }

  async fn submit_transaction(&self, tx: &SignedTransaction) -> TradingResult<TransactionRef> {
    if !self.submit_delay.is_zero() {
      tokio::time::sleep(self.submit_delay).await;
    }
    if self.refusing.load(Ordering::SeqCst) {
      return Err(TradingError::upstream("recording", "node refused the transaction"));
    }
    let mut submissions = self.submissions.lock().unwrap();
    submissions.push(tx.as_bytes().to_vec());
    Ok(TransactionRef::new(format!("0xrec{}", submissions.len())))
  }

  async fn confirm(&self, _tx: &TransactionRef) -> TradingResult<ConfirmationStatus> {
    self.confirm_calls.fetch_add(1, Ordering::SeqCst);
    Ok(ConfirmationStatus::Confirmed)
  }
}

/// Telemetry sink that keeps what it was told.
#[derive(Default)]
pub struct RecordingTelemetry {
  pub fanouts: Mutex<Vec<String>>,
  pub failures: Mutex<Vec<(String, String, String)>>,
  pub delegations: Mutex<Vec<(String, String, String)>>,
}

impl OrchestratorTelemetry for RecordingTelemetry {
  fn record_fanout(&self, operation: &str, _elapsed: Duration) {
    self.fanouts.lock().unwrap().push(operation.to_string());
  }

  fn record_platform_failure(&self, platform: &str, operation: &str, error_kind: &str) {
    self.failures.lock().unwrap().push((
      platform.to_string(),
      operation.to_string(),
      error_kind.to_string(),
    ));
  }

  fn record_delegation(&self, platform: &str, operation: &str, outcome: &str) {
    self.delegations.lock().unwrap().push((
      platform.to_string(),
      operation.to_string(),
      outcome.to_string(),
    ));
  }
}
