//! Confirmation Wait - Shared Finality Polling
//!
//! Market connectors that settle on a chain delegate their
//! `wait_for_confirmation` here, so every chain gets the same
//! poll/timeout policy and only implements a single-shot `confirm`.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

use crate::domain::{ConfirmationStatus, TradingError, TradingResult, TransactionOutcome, TransactionRef};
use crate::ports::BlockchainConnector;

/// Polling policy for confirmation waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
  /// Delay between `confirm` polls.
  pub poll_interval: Duration,
  /// Give up after this long.
  pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(2),
      timeout: Duration::from_secs(120),
    }
  }
}

/// Poll `chain` until `tx` is final or the policy timeout elapses.
///
/// Transient `confirm` errors (RPC hiccups) are logged and polled
/// through; any other error ends the wait immediately.
///
/// # Errors
/// `ConfirmationTimeout` when the chain still reports pending at the deadline.
#[instrument(skip(chain, tx, policy), fields(chain = chain.name(), tx = %tx))]
pub async fn wait_for_finality(
  chain: &dyn BlockchainConnector,
  tx: &TransactionRef,
  policy: ConfirmationPolicy,
) -> TradingResult<TransactionOutcome> {
  let started = Instant::now();
  let deadline = started + policy.timeout;
  let mut polls: u32 = 0;

  loop {
    polls += 1;
    match chain.confirm(tx).await {
      Ok(ConfirmationStatus::Confirmed) => {
        debug!(polls, "Transaction final");
        return Ok(TransactionOutcome::Confirmed);
      }
      Ok(ConfirmationStatus::Failed { reason }) => {
        warn!(polls, reason = %reason, "Transaction failed on chain");
        return Ok(TransactionOutcome::Failed { reason });
      }
      Ok(ConfirmationStatus::Pending) => {}
      Err(e) if e.is_retryable() => {
        debug!(polls, error = %e, "Confirmation poll failed, retrying");
      }
      Err(e) => return Err(e),
    }

    let now = Instant::now();
    if now >= deadline {
      return Err(TradingError::ConfirmationTimeout {
        tx: tx.to_string(),
        waited: now - started,
      });
    }
    sleep(policy.poll_interval.min(deadline - now)).await;
  }
}
