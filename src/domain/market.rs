//! Normalized market representation.
//!
//! Every market connector converts its venue payload into `Market`.
//! Identifiers are platform-scoped: the same `market_id` may exist
//! on two platforms and refer to unrelated markets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{TradingError, TradingResult};

/// Platform-scoped market identifier.
pub type MarketId = String;

/// Lifecycle state of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
    Resolved,
    Unknown,
}

impl MarketStatus {
    /// Map a venue status string onto the canonical enum.
    ///
    /// Anything unrecognized (including "cancelled") becomes `Unknown`
    /// rather than an error so that listings never fail on a new state.
    pub fn from_venue(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" | "active" | "live" | "trading" => Self::Open,
            "closed" | "paused" | "halted" => Self::Closed,
            "resolved" | "settled" | "finalized" => Self::Resolved,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Resolved => write!(f, "resolved"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A prediction market on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub market_id: MarketId,
    pub question: String,
    pub description: Option<String>,
    /// Ordered outcome labels; index 0 is YES, index 1 is NO for binary markets.
    pub outcomes: Vec<String>,
    pub status: MarketStatus,
    pub end_date: Option<DateTime<Utc>>,
    /// Traded volume in the platform's quote currency.
    pub volume: Option<Decimal>,
    /// Available liquidity in the platform's quote currency.
    pub liquidity: Option<Decimal>,
    pub platform: String,
    pub blockchain: String,
    /// Platform-specific extras that have no canonical field.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Market {
    /// Default labels for binary markets that omit their outcomes.
    pub fn binary_outcomes() -> Vec<String> {
        vec!["YES".to_string(), "NO".to_string()]
    }

    /// Enforce the data-model invariants before handing a market out.
    pub fn validate(&self) -> TradingResult<()> {
        if self.market_id.is_empty() {
            return Err(TradingError::malformed(
                self.platform.clone(),
                "market with empty id",
            ));
        }
        if self.status == MarketStatus::Open && self.outcomes.is_empty() {
            return Err(TradingError::malformed(
                self.platform.clone(),
                format!("open market `{}` lists no outcomes", self.market_id),
            ));
        }
        Ok(())
    }

    pub fn is_binary(&self) -> bool {
        self.outcomes.len() == 2
    }

    pub fn is_tradable(&self) -> bool {
        self.status == MarketStatus::Open
    }

    /// Category label from `metadata`, when the venue supplies one.
    pub fn category(&self) -> Option<&str> {
        self.metadata.get(CATEGORY_KEY).and_then(serde_json::Value::as_str)
    }
}

/// Metadata key carrying a market's category label.
pub const CATEGORY_KEY: &str = "category";

/// Optional narrowing applied to market listings.
///
/// The default filter admits every market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketFilter {
    /// Category label, compared case-insensitively.
    pub category: Option<String>,
    pub status: Option<MarketStatus>,
}

impl MarketFilter {
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: MarketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn admits_status(&self, status: MarketStatus) -> bool {
        self.status.is_none_or(|wanted| wanted == status)
    }

    /// Whether `market` carries the wanted category in its metadata.
    pub fn admits_category(&self, market: &Market) -> bool {
        let Some(wanted) = &self.category else {
            return true;
        };
        market
            .category()
            .is_some_and(|category| category.eq_ignore_ascii_case(wanted))
    }

    pub fn matches(&self, market: &Market) -> bool {
        self.admits_status(market.status) && self.admits_category(market)
    }
}

/// Parse a venue timestamp: RFC 3339, or a naive ISO-8601 string taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
