//! Simulated chain (no real RPC calls).
//!
//! In-memory ledger for dry runs and paper venues. Every accepted
//! submission reports `Pending` until it has been polled
//! `confirm_after_polls` times, then `Confirmed`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{ConfirmationStatus, SignedTransaction, TradingError, TradingResult, TransactionRef};
use crate::ports::BlockchainConnector;

#[derive(Debug)]
struct SimTransaction {
    polls: u32,
    failure: Option<String>,
}

#[derive(Debug, Default)]
struct Ledger {
    /// Balances keyed by (address, token). `None` token is native.
    balances: HashMap<(String, Option<String>), Decimal>,
    transactions: HashMap<String, SimTransaction>,
    /// Failure reason attached to the next submission.
    fail_next: Option<String>,
}

pub struct SimulatedChain {
    name: String,
    confirm_after_polls: u32,
    ledger: Mutex<Ledger>,
    submissions: AtomicU64,
}

impl SimulatedChain {
    pub fn new(name: impl Into<String>, confirm_after_polls: u32) -> Self {
        let name = name.into();
        info!(chain = %name, confirm_after_polls, "[DRY] Simulated chain ready");
        Self {
            name,
            confirm_after_polls,
            ledger: Mutex::new(Ledger::default()),
            submissions: AtomicU64::new(0),
        }
    }

    /// Credit `amount` to `address` (native when `token` is `None`).
    pub async fn credit(&self, address: &str, token: Option<&str>, amount: Decimal) {
        let mut ledger = self.ledger.lock().await;
        let balance = ledger
            .balances
            .entry((address.to_string(), token.map(str::to_string)))
            .or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Make the next submission land as a reverted transaction.
    pub async fn fail_next(&self, reason: impl Into<String>) {
        self.ledger.lock().await.fail_next = Some(reason.into());
    }

    /// Number of accepted submissions so far.
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockchainConnector for SimulatedChain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_balance(&self, address: &str, token: Option<&str>) -> TradingResult<Decimal> {
        if address.trim().is_empty() {
            return Err(TradingError::invalid_input("address must not be empty"));
        }
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .balances
            .get(&(address.to_string(), token.map(str::to_string)))
            .copied()
            .unwrap_or_default())
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> TradingResult<TransactionRef> {
        if tx.is_empty() {
            return Err(TradingError::invalid_input("empty signed transaction"));
        }
        let id = format!("0x{}", uuid::Uuid::new_v4().simple());
        let mut ledger = self.ledger.lock().await;
        let failure = ledger.fail_next.take();
        ledger.transactions.insert(id.clone(), SimTransaction { polls: 0, failure });
        self.submissions.fetch_add(1, Ordering::SeqCst);
        debug!(chain = %self.name, tx = %id, bytes = tx.len(), "[DRY] Transaction accepted");
        Ok(TransactionRef::new(id))
    }

    async fn confirm(&self, tx: &TransactionRef) -> TradingResult<ConfirmationStatus> {
        let mut ledger = self.ledger.lock().await;
        let Some(entry) = ledger.transactions.get_mut(tx.as_str()) else {
            return Ok(ConfirmationStatus::Failed {
                reason: format!("unknown transaction {tx}"),
            });
        };
        entry.polls = entry.polls.saturating_add(1);
        if entry.polls < self.confirm_after_polls {
            return Ok(ConfirmationStatus::Pending);
        }
        Ok(match &entry.failure {
            Some(reason) => ConfirmationStatus::Failed {
                reason: reason.clone(),
            },
            None => ConfirmationStatus::Confirmed,
        })
    }
}
