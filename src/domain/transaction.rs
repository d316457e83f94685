//! Transaction references and confirmation states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chain-assigned transaction identifier (tx hash or signature).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TransactionRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Fully signed, serialized transaction bytes ready for broadcast.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction(Vec<u8>);

impl SignedTransaction {
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedTransaction({} bytes)", self.0.len())
    }
}

/// Single-poll view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Reached the chain's finality rule.
    Confirmed,
    /// Included but reverted, or rejected by the chain.
    Failed { reason: String },
    /// Not yet final; keep polling.
    Pending,
}

/// Terminal outcome of waiting on a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Confirmed,
    Failed { reason: String },
}

impl TransactionOutcome {
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}
