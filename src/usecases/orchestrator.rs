//! Trading Orchestrator - Multi-Platform Dispatch and Aggregation
//!
//! Holds the platform registry and exposes one operation set over
//! every registered market connector:
//! - Reads that span platforms fan out concurrently, one task per
//!   platform, each bounded by the fan-out timeout. A failing or slow
//!   platform is logged, counted and skipped.
//! - Single-platform calls (including every write) are delegated
//!   directly and return the connector's result untouched.
//!
//! The registry is fixed once `OrchestratorBuilder::build` returns.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
  Market, MarketFilter, Orderbook, PlatformFailure, Position, PositionSide, TradingError,
  TradingResult, TransactionOutcome, TransactionRef,
};
use crate::ports::{MarketConnector, NoopTelemetry, OrchestratorTelemetry};

/// Default per-platform bound for aggregate reads.
pub const DEFAULT_FANOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry entry for one platform.
struct RegisteredPlatform {
  /// Blockchain the platform settles on (informational tag).
  blockchain: String,
  /// Connector serving the platform.
  connector: Arc<dyn MarketConnector>,
}

/// Outcome of an aggregate read.
///
/// `items` are in registration order. `failures` lists the platforms
/// that errored or timed out. When `cancelled` is set, `items` holds
/// only what had completed before cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate<T> {
  pub items: Vec<T>,
  pub failures: Vec<PlatformFailure>,
  pub cancelled: bool,
}

impl<T> Aggregate<T> {
  fn empty() -> Self {
    Self {
      items: Vec::new(),
      failures: Vec::new(),
      cancelled: false,
    }
  }

  /// Strict view: a cancelled aggregate becomes `Cancelled`.
  pub fn into_items(self) -> TradingResult<Vec<T>> {
    if self.cancelled {
      Err(TradingError::Cancelled)
    } else {
      Ok(self.items)
    }
  }
}

/// Builder collecting registrations before the registry is frozen.
pub struct OrchestratorBuilder {
  platforms: IndexMap<String, RegisteredPlatform>,
  fanout_timeout: Duration,
  telemetry: Arc<dyn OrchestratorTelemetry>,
}

impl Default for OrchestratorBuilder {
  fn default() -> Self {
    Self {
      platforms: IndexMap::new(),
      fanout_timeout: DEFAULT_FANOUT_TIMEOUT,
      telemetry: Arc::new(NoopTelemetry),
    }
  }
}

impl OrchestratorBuilder {
  /// Per-platform timeout applied to every fan-out task.
  pub fn fanout_timeout(mut self, timeout: Duration) -> Self {
    self.fanout_timeout = timeout;
    self
  }

  /// Metrics sink for fan-out and delegation events.
  pub fn telemetry(mut self, telemetry: Arc<dyn OrchestratorTelemetry>) -> Self {
    self.telemetry = telemetry;
    self
  }

  /// Register `connector` under `platform`, settling on `blockchain`.
  ///
  /// # Errors
  /// `InvalidInput` if the name is empty or already registered.
  pub fn register(
    mut self,
    platform: impl Into<String>,
    blockchain: impl Into<String>,
    connector: Arc<dyn MarketConnector>,
  ) -> TradingResult<Self> {
    let platform = platform.into();
    if platform.trim().is_empty() {
      return Err(TradingError::invalid_input("platform name must not be empty"));
    }
    if self.platforms.contains_key(&platform) {
      return Err(TradingError::invalid_input(format!(
        "platform `{platform}` registered twice"
      )));
    }
    let blockchain = blockchain.into();
    debug!(platform = %platform, blockchain = %blockchain, "Registering platform");
    self.platforms.insert(
      platform,
      RegisteredPlatform {
        blockchain,
        connector,
      },
    );
    Ok(self)
  }

  pub fn build(self) -> Orchestrator {
    info!(
      platforms = self.platforms.len(),
      fanout_timeout_ms = self.fanout_timeout.as_millis() as u64,
      "Orchestrator ready"
    );
    Orchestrator {
      platforms: self.platforms,
      fanout_timeout: self.fanout_timeout,
      telemetry: self.telemetry,
    }
  }
}

/// Unified entry point over every registered platform.
pub struct Orchestrator {
  platforms: IndexMap<String, RegisteredPlatform>,
  fanout_timeout: Duration,
  telemetry: Arc<dyn OrchestratorTelemetry>,
}

impl Orchestrator {
  pub fn builder() -> OrchestratorBuilder {
    OrchestratorBuilder::default()
  }

  /// Registered platform names, in registration order.
  pub fn list_platforms(&self) -> Vec<&str> {
    self.platforms.keys().map(String::as_str).collect()
  }

  /// Blockchain tag recorded for `platform`.
  pub fn blockchain_for(&self, platform: &str) -> Option<&str> {
    self.platforms.get(platform).map(|p| p.blockchain.as_str())
  }

  pub fn platform_count(&self) -> usize {
    self.platforms.len()
  }

  pub const fn fanout_timeout(&self) -> Duration {
    self.fanout_timeout
  }

  // ── Aggregate reads ─────────────────────────────────────

  /// Up to `limit` markets from every platform, concatenated in
  /// registration order. Failing platforms contribute nothing.
  ///
  /// # Errors
  /// `AllPlatformsFailed` when every registered platform failed.
  pub async fn get_all_markets(&self, limit: usize) -> TradingResult<Vec<Market>> {
    self.search_markets(&MarketFilter::default(), limit).await
  }

  /// Cancellable form of [`Self::get_all_markets`].
  pub async fn get_all_markets_with(
    &self,
    limit: usize,
    cancel: &CancellationToken,
  ) -> Aggregate<Market> {
    self
      .search_markets_with(&MarketFilter::default(), limit, cancel)
      .await
  }

  /// [`Self::get_all_markets`] narrowed by category and status.
  ///
  /// # Errors
  /// `AllPlatformsFailed` when every registered platform failed.
  pub async fn search_markets(
    &self,
    filter: &MarketFilter,
    limit: usize,
  ) -> TradingResult<Vec<Market>> {
    let report = self
      .search_markets_with(filter, limit, &CancellationToken::new())
      .await;
    Self::strict("list_markets", self.platforms.len(), report)
  }

  /// Cancellable form of [`Self::search_markets`].
  #[instrument(skip(self, cancel))]
  pub async fn search_markets_with(
    &self,
    filter: &MarketFilter,
    limit: usize,
    cancel: &CancellationToken,
  ) -> Aggregate<Market> {
    if limit == 0 {
      return Aggregate::empty();
    }
    let filter = Arc::new(filter.clone());
    self
      .fan_out("list_markets", cancel, move |connector| {
        let filter = Arc::clone(&filter);
        async move {
          let mut markets = connector.list_markets(&filter, limit).await?;
          markets.retain(|m| filter.admits_status(m.status));
          markets.truncate(limit);
          Ok(markets)
        }
      })
      .await
  }

  /// Positions of `address` on every platform.
  ///
  /// # Errors
  /// `InvalidInput` for a blank address, `AllPlatformsFailed` when
  /// every registered platform failed.
  pub async fn get_all_positions(&self, address: &str) -> TradingResult<Vec<Position>> {
    Self::ensure_address(address)?;
    let report = self
      .get_all_positions_with(address, &CancellationToken::new())
      .await;
    Self::strict("get_positions", self.platforms.len(), report)
  }

  /// Cancellable form of [`Self::get_all_positions`].
  ///
  /// A blank address yields an empty report; connectors are not called.
  #[instrument(skip(self, cancel))]
  pub async fn get_all_positions_with(
    &self,
    address: &str,
    cancel: &CancellationToken,
  ) -> Aggregate<Position> {
    if Self::ensure_address(address).is_err() {
      return Aggregate::empty();
    }
    let address: Arc<str> = Arc::from(address);
    self
      .fan_out("get_positions", cancel, move |connector| {
        let address = Arc::clone(&address);
        async move { connector.get_positions(&address).await }
      })
      .await
  }

  // ── Single-platform delegation ──────────────────────────

  /// Market detail; `Ok(None)` when the platform does not know the id.
  #[instrument(skip(self))]
  pub async fn get_market(&self, platform: &str, market_id: &str) -> TradingResult<Option<Market>> {
    self
      .delegate(platform, "get_market", |c| c.get_market(market_id))
      .await
  }

  /// Market listing from one platform.
  #[instrument(skip(self))]
  pub async fn get_markets(
    &self,
    platform: &str,
    filter: &MarketFilter,
    limit: usize,
  ) -> TradingResult<Vec<Market>> {
    self
      .delegate(platform, "list_markets", |c| c.list_markets(filter, limit))
      .await
  }

  #[instrument(skip(self))]
  pub async fn get_price(
    &self,
    platform: &str,
    market_id: &str,
    side: PositionSide,
  ) -> TradingResult<Decimal> {
    self
      .delegate(platform, "get_price", |c| c.get_price(market_id, side))
      .await
  }

  #[instrument(skip(self))]
  pub async fn get_orderbook(&self, platform: &str, market_id: &str) -> TradingResult<Orderbook> {
    self
      .delegate(platform, "get_orderbook", |c| c.get_orderbook(market_id))
      .await
  }

  #[instrument(skip(self))]
  pub async fn create_position(
    &self,
    platform: &str,
    market_id: &str,
    side: PositionSide,
    amount: Decimal,
    max_price: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    self
      .delegate(platform, "create_position", |c| {
        c.create_position(market_id, side, amount, max_price)
      })
      .await
  }

  #[instrument(skip(self))]
  pub async fn close_position(
    &self,
    platform: &str,
    position_id: &str,
    shares: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    self
      .delegate(platform, "close_position", |c| {
        c.close_position(position_id, shares)
      })
      .await
  }

  /// Positions of `address` on one platform.
  #[instrument(skip(self))]
  pub async fn get_positions(&self, platform: &str, address: &str) -> TradingResult<Vec<Position>> {
    self
      .delegate(platform, "get_positions", |c| c.get_positions(address))
      .await
  }

  #[instrument(skip(self, tx), fields(tx = %tx))]
  pub async fn wait_for_confirmation(
    &self,
    platform: &str,
    tx: &TransactionRef,
  ) -> TradingResult<TransactionOutcome> {
    self
      .delegate(platform, "wait_for_confirmation", |c| {
        c.wait_for_confirmation(tx)
      })
      .await
  }

  // ── Internals ───────────────────────────────────────────

  fn ensure_address(address: &str) -> TradingResult<()> {
    if address.trim().is_empty() {
      return Err(TradingError::invalid_input("user address must not be empty"));
    }
    Ok(())
  }

  /// Collapse an aggregate into the strict single-result form.
  fn strict<T>(
    operation: &'static str,
    registered: usize,
    report: Aggregate<T>,
  ) -> TradingResult<Vec<T>> {
    if !report.cancelled && registered > 0 && report.failures.len() == registered {
      return Err(TradingError::AllPlatformsFailed {
        operation,
        failures: report.failures,
      });
    }
    report.into_items()
  }

  /// Run one single-platform call and record its outcome.
  async fn delegate<'a, T, Fut>(
    &'a self,
    platform: &str,
    operation: &'static str,
    call: impl FnOnce(&'a dyn MarketConnector) -> Fut,
  ) -> TradingResult<T>
  where
    Fut: Future<Output = TradingResult<T>>,
  {
    let entry = self
      .platforms
      .get(platform)
      .ok_or_else(|| TradingError::UnknownPlatform(platform.to_string()))?;

    let result = call(entry.connector.as_ref()).await;

    let outcome = match &result {
      Ok(_) => "ok",
      Err(e) => {
        debug!(platform, operation, error = %e, "Delegated call failed");
        e.kind()
      }
    };
    self.telemetry.record_delegation(platform, operation, outcome);
    result
  }

  /// Run `call` against every platform concurrently.
  ///
  /// Each task is bounded by the fan-out timeout. Results are slotted
  /// by registration index so output order never depends on timing.
  /// On cancellation the remaining tasks are aborted and the report is
  /// returned at once. Dropping the returned future aborts them too,
  /// since the `JoinSet` owns every task.
  async fn fan_out<T, F, Fut>(
    &self,
    operation: &'static str,
    cancel: &CancellationToken,
    call: F,
  ) -> Aggregate<T>
  where
    T: Send + 'static,
    F: Fn(Arc<dyn MarketConnector>) -> Fut,
    Fut: Future<Output = TradingResult<Vec<T>>> + Send + 'static,
  {
    let started = Instant::now();
    let timeout = self.fanout_timeout;
    let mut slots: Vec<Option<TradingResult<Vec<T>>>> =
      (0..self.platforms.len()).map(|_| None).collect();

    let mut tasks = JoinSet::new();
    for (index, (name, entry)) in self.platforms.iter().enumerate() {
      let task = call(Arc::clone(&entry.connector));
      let name = name.clone();
      tasks.spawn(async move {
        let result = match tokio::time::timeout(timeout, task).await {
          Ok(result) => result,
          Err(_) => Err(TradingError::upstream(
            name,
            format!("no response within {}ms", timeout.as_millis()),
          )),
        };
        (index, result)
      });
    }

    let mut cancelled = false;
    loop {
      tokio::select! {
        biased;
        () = cancel.cancelled() => {
          tasks.abort_all();
          cancelled = true;
          break;
        }
        joined = tasks.join_next() => match joined {
          Some(Ok((index, result))) => slots[index] = Some(result),
          Some(Err(join_error)) => {
            warn!(operation, error = %join_error, "Fan-out task did not complete");
          }
          None => break,
        },
      }
    }
    drop(tasks);

    let mut report = Aggregate {
      items: Vec::new(),
      failures: Vec::new(),
      cancelled,
    };

    for ((name, _), slot) in self.platforms.iter().zip(slots) {
      let error = match slot {
        Some(Ok(items)) => {
          debug!(platform = %name, operation, count = items.len(), "Platform responded");
          report.items.extend(items);
          continue;
        }
        Some(Err(e)) => e,
        None if cancelled => continue,
        None => TradingError::upstream(name.clone(), "task aborted before completing"),
      };
      warn!(
        platform = %name,
        operation,
        error_kind = error.kind(),
        error = %error,
        "Platform failed during fan-out, skipping"
      );
      self
        .telemetry
        .record_platform_failure(name, operation, error.kind());
      report.failures.push(PlatformFailure {
        platform: name.clone(),
        error,
      });
    }

    let elapsed = started.elapsed();
    self.telemetry.record_fanout(operation, elapsed);
    info!(
      operation,
      items = report.items.len(),
      failed = report.failures.len(),
      cancelled,
      elapsed_ms = elapsed.as_millis() as u64,
      "Fan-out complete"
    );
    report
  }
}
