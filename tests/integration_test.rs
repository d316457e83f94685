//! Integration Tests - Orchestrator over Mocked and Stub Venues
//!
//! Tests registry, fan-out, delegation and cancellation behavior of
//! the orchestrator. Uses mockall for trait mocking and tokio::test
//! for async tests; timing scenarios use the stubs in `common`.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use mockall::mock;
use mockall::predicate::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use prediction_market_trader::domain::{
  Market, MarketFilter, MarketStatus, Orderbook, Position, PositionSide, TradingError,
  TradingResult, TransactionOutcome, TransactionRef,
};
use prediction_market_trader::ports::MarketConnector;
use prediction_market_trader::usecases::Orchestrator;

use common::{market, RecordingTelemetry, StubVenue};

// ---- Mock Definitions ----

mock! {
  pub Venue {}

  #[async_trait::async_trait]
  impl MarketConnector for Venue {
    async fn list_markets(&self, filter: &MarketFilter, limit: usize) -> TradingResult<Vec<Market>>;
    async fn get_market(&self, market_id: &str) -> TradingResult<Option<Market>>;
    async fn get_price(&self, market_id: &str, side: PositionSide) -> TradingResult<Decimal>;
    async fn get_orderbook(&self, market_id: &str) -> TradingResult<Orderbook>;
    async fn create_position(
      &self,
      market_id: &str,
      side: PositionSide,
      amount: Decimal,
      max_price: Option<Decimal>,
    ) -> TradingResult<TransactionRef>;
    async fn close_position(
      &self,
      position_id: &str,
      shares: Option<Decimal>,
    ) -> TradingResult<TransactionRef>;
    async fn get_positions(&self, address: &str) -> TradingResult<Vec<Position>>;
    async fn wait_for_confirmation(&self, tx: &TransactionRef) -> TradingResult<TransactionOutcome>;
  }
}

fn markets(platform: &str, n: usize) -> Vec<Market> {
  (0..n).map(|i| market(platform, "polygon", &format!("{platform}-{i}"))).collect()
}

// ---- Registry ----

#[tokio::test]
async fn test_list_platforms_in_registration_order() {
  let orchestrator = Orchestrator::builder()
    .register("polymarket", "polygon", Arc::new(MockVenue::new()))
    .unwrap()
    .register("hedgehog", "solana", Arc::new(MockVenue::new()))
    .unwrap()
    .register("myriad", "ethereum", Arc::new(MockVenue::new()))
    .unwrap()
    .build();

  assert_eq!(
    orchestrator.list_platforms(),
    vec!["polymarket", "hedgehog", "myriad"]
  );
  assert_eq!(orchestrator.blockchain_for("hedgehog"), Some("solana"));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
  let result = Orchestrator::builder()
    .register("polymarket", "polygon", Arc::new(MockVenue::new()))
    .unwrap()
    .register("polymarket", "ethereum", Arc::new(MockVenue::new()));
  assert!(matches!(result, Err(TradingError::InvalidInput(_))));
}

// ---- Fan-out ----

#[tokio::test]
async fn test_get_all_markets_skips_failing_platform() {
  let mut healthy = MockVenue::new();
  healthy
    .expect_list_markets()
    .with(eq(MarketFilter::default()), eq(3))
    .times(1)
    .returning(|_, _| Ok(markets("polymarket", 5)));

  let mut broken = MockVenue::new();
  broken
    .expect_list_markets()
    .times(1)
    .returning(|_, _| Err(TradingError::upstream("hedgehog", "connection refused")));

  let telemetry = Arc::new(RecordingTelemetry::default());
  let orchestrator = Orchestrator::builder()
    .telemetry(telemetry.clone())
    .register("polymarket", "polygon", Arc::new(healthy))
    .unwrap()
    .register("hedgehog", "solana", Arc::new(broken))
    .unwrap()
    .build();

  let result = orchestrator.get_all_markets(3).await.unwrap();
  assert_eq!(result.len(), 3);
  assert!(result.iter().all(|m| m.platform == "polymarket"));
  assert_eq!(
    result.iter().map(|m| m.market_id.as_str()).collect::<Vec<_>>(),
    vec!["polymarket-0", "polymarket-1", "polymarket-2"]
  );

  let failures = telemetry.failures.lock().unwrap().clone();
  assert_eq!(
    failures,
    vec![(
      "hedgehog".to_string(),
      "list_markets".to_string(),
      "upstream_unavailable".to_string()
    )]
  );
  assert_eq!(telemetry.fanouts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_all_markets_zero_limit_calls_nobody() {
  // No expectations: any call would panic the mock.
  let orchestrator = Orchestrator::builder()
    .register("polymarket", "polygon", Arc::new(MockVenue::new()))
    .unwrap()
    .build();

  assert!(orchestrator.get_all_markets(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_all_markets_every_platform_failed() {
  let mut a = MockVenue::new();
  a.expect_list_markets()
    .returning(|_, _| Err(TradingError::RateLimited {
      source_name: "a".into(),
      retry_after: Some(Duration::from_secs(1)),
    }));
  let mut b = MockVenue::new();
  b.expect_list_markets()
    .returning(|_, _| Err(TradingError::upstream("b", "down")));

  let orchestrator = Orchestrator::builder()
    .register("a", "polygon", Arc::new(a))
    .unwrap()
    .register("b", "solana", Arc::new(b))
    .unwrap()
    .build();

  match orchestrator.get_all_markets(10).await {
    Err(TradingError::AllPlatformsFailed { operation, failures }) => {
      assert_eq!(operation, "list_markets");
      let names: Vec<_> = failures.iter().map(|f| f.platform.as_str()).collect();
      assert_eq!(names, vec!["a", "b"]);
      assert_eq!(failures[0].error.kind(), "rate_limited");
    }
    other => panic!("expected AllPlatformsFailed, got {other:?}"),
  }
}

#[tokio::test]
async fn test_search_markets_forwards_filter_and_enforces_status() {
  let wanted = MarketFilter::default()
    .with_category("crypto")
    .with_status(MarketStatus::Open);

  let mut venue = MockVenue::new();
  venue
    .expect_list_markets()
    .with(eq(wanted.clone()), eq(5))
    .times(1)
    .returning(|_, _| {
      let mut listed = markets("polymarket", 3);
      listed[1].status = MarketStatus::Resolved;
      Ok(listed)
    });

  let orchestrator = Orchestrator::builder()
    .register("polymarket", "polygon", Arc::new(venue))
    .unwrap()
    .build();

  let result = orchestrator.search_markets(&wanted, 5).await.unwrap();
  assert_eq!(
    result.iter().map(|m| m.market_id.as_str()).collect::<Vec<_>>(),
    vec!["polymarket-0", "polymarket-2"]
  );
}

#[tokio::test]
async fn test_get_all_positions_skips_failing_platform() {
  let telemetry = Arc::new(RecordingTelemetry::default());
  let orchestrator = Orchestrator::builder()
    .telemetry(telemetry.clone())
    .register("a", "sim", Arc::new(StubVenue::new("a", 0)))
    .unwrap()
    .register(
      "b",
      "sim",
      Arc::new(StubVenue::new("b", 0).failing(TradingError::upstream("b", "502 from gateway"))),
    )
    .unwrap()
    .build();

  let positions = orchestrator.get_all_positions("0xabc").await.unwrap();
  assert_eq!(positions.len(), 1);
  assert_eq!(positions[0].platform, "a");
  assert_eq!(positions[0].position_id, "a-pos");

  assert_eq!(
    telemetry.failures.lock().unwrap().clone(),
    vec![(
      "b".to_string(),
      "get_positions".to_string(),
      "upstream_unavailable".to_string()
    )]
  );
}

#[tokio::test]
async fn test_get_all_positions_every_platform_failed() {
  let a = Arc::new(StubVenue::new("a", 0).failing(TradingError::upstream("a", "down")));
  let b = Arc::new(StubVenue::new("b", 0).failing(TradingError::RateLimited {
    source_name: "b".into(),
    retry_after: None,
  }));
  let orchestrator = Orchestrator::builder()
    .register("a", "sim", a.clone())
    .unwrap()
    .register("b", "sim", b.clone())
    .unwrap()
    .build();

  match orchestrator.get_all_positions("0xabc").await {
    Err(TradingError::AllPlatformsFailed { operation, failures }) => {
      assert_eq!(operation, "get_positions");
      let kinds: Vec<_> = failures.iter().map(|f| f.error.kind()).collect();
      assert_eq!(kinds, vec!["upstream_unavailable", "rate_limited"]);
    }
    other => panic!("expected AllPlatformsFailed, got {other:?}"),
  }
  assert_eq!(a.calls() + b.calls(), 2);
}

#[tokio::test]
async fn test_empty_registry_aggregates_to_empty() {
  let orchestrator = Orchestrator::builder().build();
  assert!(orchestrator.get_all_markets(5).await.unwrap().is_empty());
  assert!(orchestrator.get_all_positions("0xabc").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fan_out_runs_platforms_concurrently() {
  let delay = Duration::from_millis(300);
  let orchestrator = Orchestrator::builder()
    .register("a", "sim", Arc::new(StubVenue::new("a", 2).delayed(delay)))
    .unwrap()
    .register("b", "sim", Arc::new(StubVenue::new("b", 2).delayed(delay)))
    .unwrap()
    .register("c", "sim", Arc::new(StubVenue::new("c", 2).delayed(delay)))
    .unwrap()
    .build();

  let started = Instant::now();
  let result = orchestrator.get_all_markets(10).await.unwrap();
  assert_eq!(result.len(), 6);
  assert!(
    started.elapsed() < Duration::from_millis(800),
    "sequential fan-out took {:?}",
    started.elapsed()
  );
}

#[tokio::test]
async fn test_slow_platform_times_out_and_is_skipped() {
  let slow = Arc::new(StubVenue::new("slow", 3).delayed(Duration::from_secs(5)));
  let orchestrator = Orchestrator::builder()
    .fanout_timeout(Duration::from_millis(100))
    .register("slow", "sim", slow)
    .unwrap()
    .register("fast", "sim", Arc::new(StubVenue::new("fast", 2)))
    .unwrap()
    .build();

  let started = Instant::now();
  let report = orchestrator
    .get_all_markets_with(10, &CancellationToken::new())
    .await;
  assert!(started.elapsed() < Duration::from_secs(2));
  assert!(!report.cancelled);
  assert_eq!(report.items.len(), 2);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].platform, "slow");
  assert!(matches!(
    report.failures[0].error,
    TradingError::UpstreamUnavailable { .. }
  ));
}

#[tokio::test]
async fn test_cancel_returns_completed_results_only() {
  let orchestrator = Orchestrator::builder()
    .register("fast", "sim", Arc::new(StubVenue::new("fast", 0)))
    .unwrap()
    .register(
      "slow",
      "sim",
      Arc::new(StubVenue::new("slow", 0).delayed(Duration::from_secs(10))),
    )
    .unwrap()
    .build();

  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(150)).await;
    trigger.cancel();
  });

  let started = Instant::now();
  let report = orchestrator.get_all_positions_with("0xabc", &cancel).await;

  assert!(started.elapsed() < Duration::from_secs(2));
  assert!(report.cancelled);
  assert!(report.failures.is_empty());
  assert_eq!(report.items.len(), 1);
  assert_eq!(report.items[0].platform, "fast");
  assert_eq!(report.into_items(), Err(TradingError::Cancelled));
}

#[tokio::test]
async fn test_get_all_positions_rejects_blank_address() {
  let venue = Arc::new(StubVenue::new("a", 0));
  let orchestrator = Orchestrator::builder()
    .register("a", "sim", venue.clone())
    .unwrap()
    .build();

  assert!(matches!(
    orchestrator.get_all_positions("  ").await,
    Err(TradingError::InvalidInput(_))
  ));
  assert_eq!(venue.calls(), 0);
}

// ---- Delegation ----

#[tokio::test]
async fn test_get_market_absent_is_not_an_error() {
  let mut venue = MockVenue::new();
  venue
    .expect_get_market()
    .with(eq("X"))
    .times(1)
    .returning(|_| Ok(None));

  let orchestrator = Orchestrator::builder()
    .register("polymarket", "polygon", Arc::new(venue))
    .unwrap()
    .build();

  assert_eq!(orchestrator.get_market("polymarket", "X").await, Ok(None));
}

#[tokio::test]
async fn test_unknown_platform_is_reported() {
  let orchestrator = Orchestrator::builder().build();
  assert_eq!(
    orchestrator.get_price("kalshi", "m1", PositionSide::Yes).await,
    Err(TradingError::UnknownPlatform("kalshi".into()))
  );
}

#[tokio::test]
async fn test_create_position_error_passes_through_verbatim() {
  let mut venue = MockVenue::new();
  venue
    .expect_create_position()
    .with(eq("m1"), eq(PositionSide::No), eq(dec!(25)), eq(Some(dec!(0.4))))
    .times(1)
    .returning(|_, _, _, max| {
      Err(TradingError::SlippageExceeded {
        achievable: dec!(0.45),
        max_price: max.unwrap_or_default(),
      })
    });

  let telemetry = Arc::new(RecordingTelemetry::default());
  let orchestrator = Orchestrator::builder()
    .telemetry(telemetry.clone())
    .register("polymarket", "polygon", Arc::new(venue))
    .unwrap()
    .build();

  let err = orchestrator
    .create_position("polymarket", "m1", PositionSide::No, dec!(25), Some(dec!(0.4)))
    .await
    .unwrap_err();
  assert_eq!(
    err,
    TradingError::SlippageExceeded {
      achievable: dec!(0.45),
      max_price: dec!(0.4),
    }
  );
  assert_eq!(
    telemetry.delegations.lock().unwrap()[0],
    (
      "polymarket".to_string(),
      "create_position".to_string(),
      "slippage_exceeded".to_string()
    )
  );
}

#[tokio::test]
async fn test_close_and_confirm_delegate_to_owner() {
  let mut venue = MockVenue::new();
  venue
    .expect_close_position()
    .with(eq("pos-1"), eq(None::<Decimal>))
    .times(1)
    .returning(|_, _| Ok(TransactionRef::new("0xfeed")));
  venue
    .expect_wait_for_confirmation()
    .withf(|tx| tx.as_str() == "0xfeed")
    .times(1)
    .returning(|_| Ok(TransactionOutcome::Confirmed));

  let orchestrator = Orchestrator::builder()
    .register("myriad", "ethereum", Arc::new(venue))
    .unwrap()
    .register("other", "polygon", Arc::new(MockVenue::new()))
    .unwrap()
    .build();

  let tx = orchestrator
    .close_position("myriad", "pos-1", None)
    .await
    .unwrap();
  let outcome = orchestrator.wait_for_confirmation("myriad", &tx).await.unwrap();
  assert!(outcome.is_confirmed());
}
