//! Paper Venue Tests - Trading Semantics Through the Orchestrator
//!
//! Exercises the paper venue end to end: slippage guard before any
//! chain call, partial and full closes, and confirmation through the
//! paired chain.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

use prediction_market_trader::adapters::chain::SimulatedChain;
use prediction_market_trader::adapters::paper::{PaperConnector, PaperFixture};
use prediction_market_trader::domain::{PositionSide, TradingError};
use prediction_market_trader::usecases::{ConfirmationPolicy, Orchestrator};

use common::RecordingChain;

const OWNER: &str = "0x000000000000000000000000000000000000dEaD";

const FIXTURE: &str = r#"{
  "markets": [
    {
      "market_id": "btc-150k",
      "question": "Will BTC trade above $150,000?",
      "bids": [{ "price": "0.33", "size": "100" }, { "price": "0.30", "size": "100" }],
      "asks": [{ "price": "0.35", "size": "100" }, { "price": "0.40", "size": "100" }]
    }
  ]
}"#;

fn policy() -> ConfirmationPolicy {
  ConfirmationPolicy {
    poll_interval: Duration::from_millis(10),
    timeout: Duration::from_secs(2),
  }
}

fn paper_on(chain: Arc<dyn prediction_market_trader::ports::BlockchainConnector>) -> Orchestrator {
  paper_with_timeout(chain, Duration::from_secs(10))
}

fn paper_with_timeout(
  chain: Arc<dyn prediction_market_trader::ports::BlockchainConnector>,
  fanout_timeout: Duration,
) -> Orchestrator {
  let venue = PaperConnector::new(
    "paper",
    OWNER,
    PaperFixture::from_json(FIXTURE).unwrap(),
    chain.clone(),
    policy(),
  )
  .unwrap();
  Orchestrator::builder()
    .fanout_timeout(fanout_timeout)
    .register("paper", chain.name(), Arc::new(venue))
    .unwrap()
    .build()
}

#[tokio::test]
async fn test_slippage_guard_never_touches_chain() {
  let chain = Arc::new(RecordingChain::default());
  let orchestrator = paper_on(chain.clone());

  // 50 spends past the 0.35 level (35 of depth) into 0.40.
  let err = orchestrator
    .create_position("paper", "btc-150k", PositionSide::Yes, dec!(50), Some(dec!(0.36)))
    .await
    .unwrap_err();
  assert_eq!(
    err,
    TradingError::SlippageExceeded {
      achievable: dec!(0.40),
      max_price: dec!(0.36),
    }
  );
  assert_eq!(chain.total_calls(), 0);
  assert!(orchestrator.get_positions("paper", OWNER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_buy_within_max_price_settles_once() {
  let chain = Arc::new(RecordingChain::default());
  let orchestrator = paper_on(chain.clone());

  let tx = assert_ok!(
    orchestrator
      .create_position("paper", "btc-150k", PositionSide::Yes, dec!(35), Some(dec!(0.35)))
      .await
  );
  assert_eq!(chain.submission_count(), 1);

  let settlement = chain.submission_json(0);
  assert_eq!(settlement["action"], "buy");
  assert_eq!(settlement["side"], "YES");
  assert_eq!(settlement["owner"], OWNER);

  let outcome = orchestrator.wait_for_confirmation("paper", &tx).await.unwrap();
  assert!(outcome.is_confirmed());

  let positions = orchestrator.get_positions("paper", OWNER).await.unwrap();
  assert_eq!(positions.len(), 1);
  assert_eq!(positions[0].shares, dec!(100));
  assert_eq!(positions[0].cost_basis, dec!(35));
  assert_eq!(positions[0].current_value, dec!(33));
  assert_eq!(positions[0].blockchain, "recording");
}

#[tokio::test]
async fn test_close_more_than_held_is_rejected() {
  let chain = Arc::new(RecordingChain::default());
  let orchestrator = paper_on(chain.clone());
  orchestrator
    .create_position("paper", "btc-150k", PositionSide::Yes, dec!(35), None)
    .await
    .unwrap();
  let position_id = orchestrator.get_positions("paper", OWNER).await.unwrap()[0]
    .position_id
    .clone();

  let err = orchestrator
    .close_position("paper", &position_id, Some(dec!(150)))
    .await
    .unwrap_err();
  assert_eq!(
    err,
    TradingError::InsufficientShares {
      requested: dec!(150),
      held: dec!(100),
    }
  );
  assert_eq!(chain.submission_count(), 1);
}

#[tokio::test]
async fn test_partial_then_full_close() {
  let chain = Arc::new(RecordingChain::default());
  let orchestrator = paper_on(chain.clone());
  orchestrator
    .create_position("paper", "btc-150k", PositionSide::Yes, dec!(35), None)
    .await
    .unwrap();
  let position_id = orchestrator.get_positions("paper", OWNER).await.unwrap()[0]
    .position_id
    .clone();

  orchestrator
    .close_position("paper", &position_id, Some(dec!(40)))
    .await
    .unwrap();
  let remaining = orchestrator.get_positions("paper", OWNER).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].shares, dec!(60));
  assert_eq!(remaining[0].cost_basis, dec!(21));

  orchestrator
    .close_position("paper", &position_id, None)
    .await
    .unwrap();
  assert!(orchestrator.get_positions("paper", OWNER).await.unwrap().is_empty());
  assert_eq!(chain.submission_count(), 3);
  assert_eq!(chain.submission_json(2)["action"], "sell");

  let err = assert_err!(orchestrator.close_position("paper", &position_id, None).await);
  assert!(matches!(err, TradingError::PositionNotFound { .. }));
}

#[tokio::test]
async fn test_no_side_buys_from_complemented_bids() {
  let chain = Arc::new(RecordingChain::default());
  let orchestrator = paper_on(chain.clone());

  // NO asks are 1 - YES bids: 0.67 then 0.70.
  orchestrator
    .create_position("paper", "btc-150k", PositionSide::No, dec!(67), Some(dec!(0.67)))
    .await
    .unwrap();
  let positions = orchestrator.get_positions("paper", OWNER).await.unwrap();
  assert_eq!(positions[0].side, PositionSide::No);
  assert_eq!(positions[0].shares, dec!(100));
  // Marked at the best NO bid, 1 - 0.35.
  assert_eq!(positions[0].current_value, dec!(65));
}

#[tokio::test]
async fn test_market_carries_registry_identity() {
  let chain = Arc::new(SimulatedChain::new("polygon", 1));
  let orchestrator = paper_on(chain);

  let market = orchestrator
    .get_market("paper", "btc-150k")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(market.market_id, "btc-150k");
  assert_eq!(market.platform, "paper");
  assert_eq!(
    Some(market.blockchain.as_str()),
    orchestrator.blockchain_for("paper")
  );
  assert_eq!(orchestrator.get_market("paper", "nope").await, Ok(None));
}

#[tokio::test]
async fn test_simulated_chain_confirms_after_polls() {
  let chain = Arc::new(SimulatedChain::new("sim", 3));
  let orchestrator = paper_on(chain.clone());

  let tx = orchestrator
    .create_position("paper", "btc-150k", PositionSide::Yes, dec!(10), None)
    .await
    .unwrap();
  let outcome = orchestrator.wait_for_confirmation("paper", &tx).await.unwrap();
  assert!(outcome.is_confirmed());
  assert_eq!(chain.submissions(), 1);
}

#[tokio::test]
async fn test_reads_are_served_while_a_buy_settles() {
  let chain = Arc::new(RecordingChain::slow(Duration::from_millis(800)));
  let orchestrator = Arc::new(paper_with_timeout(chain.clone(), Duration::from_millis(200)));

  let buyer = tokio::spawn({
    let orchestrator = Arc::clone(&orchestrator);
    async move {
      orchestrator
        .create_position("paper", "btc-150k", PositionSide::Yes, dec!(35), None)
        .await
    }
  });
  tokio::time::sleep(Duration::from_millis(50)).await;

  let markets = assert_ok!(orchestrator.get_all_markets(10).await);
  assert_eq!(markets.len(), 1);
  let positions = assert_ok!(orchestrator.get_all_positions(OWNER).await);
  assert!(positions.is_empty());
  assert_eq!(
    orchestrator.get_price("paper", "btc-150k", PositionSide::Yes).await,
    Ok(dec!(0.34))
  );

  assert_ok!(buyer.await.unwrap());
  assert_eq!(chain.submission_count(), 1);
  assert_eq!(orchestrator.get_positions("paper", OWNER).await.unwrap()[0].shares, dec!(100));
}

#[tokio::test]
async fn test_refused_sale_restores_position() {
  let chain = Arc::new(RecordingChain::default());
  let orchestrator = paper_on(chain.clone());
  orchestrator
    .create_position("paper", "btc-150k", PositionSide::Yes, dec!(35), None)
    .await
    .unwrap();
  let position_id = orchestrator.get_positions("paper", OWNER).await.unwrap()[0]
    .position_id
    .clone();

  chain.refuse(true);
  let err = assert_err!(
    orchestrator
      .close_position("paper", &position_id, Some(dec!(40)))
      .await
  );
  assert!(err.is_retryable());
  let err = assert_err!(orchestrator.close_position("paper", &position_id, None).await);
  assert!(matches!(err, TradingError::UpstreamUnavailable { .. }));

  let positions = orchestrator.get_positions("paper", OWNER).await.unwrap();
  assert_eq!(positions.len(), 1);
  assert_eq!(positions[0].shares, dec!(100));
  assert_eq!(positions[0].cost_basis, dec!(35));

  chain.refuse(false);
  assert_ok!(orchestrator.close_position("paper", &position_id, None).await);
  assert!(orchestrator.get_positions("paper", OWNER).await.unwrap().is_empty());
}
