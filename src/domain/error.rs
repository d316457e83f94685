//! Trading error taxonomy shared by connectors and the orchestrator.
//!
//! Every port returns `TradingResult<T>`. Single-platform calls hand
//! these errors to the caller untouched; aggregate calls record them
//! per platform and keep going.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use super::position::PositionSide;

/// A failure recorded for one platform during a fan-out query.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformFailure {
    /// Registered platform name.
    pub platform: String,
    /// What went wrong on that platform.
    pub error: TradingError,
}

/// Errors surfaced by market connectors, blockchain connectors and the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradingError {
    #[error("platform `{0}` is not registered")]
    UnknownPlatform(String),

    #[error("market `{market_id}` not found on {platform}")]
    MarketNotFound { platform: String, market_id: String },

    #[error("side {side} is not offered by market `{market_id}`")]
    InvalidSide { market_id: String, side: PositionSide },

    #[error("{source_name} unavailable: {reason}")]
    UpstreamUnavailable { source_name: String, reason: String },

    #[error("{source_name} rate limited (retry after {retry_after:?})")]
    RateLimited {
        source_name: String,
        retry_after: Option<Duration>,
    },

    #[error("achievable price {achievable} exceeds max price {max_price}")]
    SlippageExceeded {
        achievable: Decimal,
        max_price: Decimal,
    },

    #[error("requested {requested} shares but only {held} held")]
    InsufficientShares { requested: Decimal, held: Decimal },

    #[error("market `{market_id}` on {platform} has no quotes")]
    NoQuote { platform: String, market_id: String },

    #[error("orderbook depth {available} cannot fill {requested}")]
    InsufficientLiquidity {
        requested: Decimal,
        available: Decimal,
    },

    #[error("position `{position_id}` not found on {platform}")]
    PositionNotFound {
        platform: String,
        position_id: String,
    },

    #[error("transaction {tx} not final after {waited:?}")]
    ConfirmationTimeout { tx: String, waited: Duration },

    #[error("{operation} is not supported on {platform}")]
    NotSupported {
        platform: String,
        operation: &'static str,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed response from {source_name}: {reason}")]
    MalformedResponse { source_name: String, reason: String },

    #[error("{operation} failed on every platform ({} failures)", .failures.len())]
    AllPlatformsFailed {
        operation: &'static str,
        failures: Vec<PlatformFailure>,
    },
}

impl TradingError {
    pub fn upstream(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_supported(platform: impl Into<String>, operation: &'static str) -> Self {
        Self::NotSupported {
            platform: platform.into(),
            operation,
        }
    }

    pub fn market_not_found(platform: impl Into<String>, market_id: impl Into<String>) -> Self {
        Self::MarketNotFound {
            platform: platform.into(),
            market_id: market_id.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Transient failures a caller may retry. `NotSupported` never is.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. }
                | Self::RateLimited { .. }
                | Self::ConfirmationTimeout { .. }
        )
    }

    /// Stable snake_case label for logs and metric labels.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownPlatform(_) => "unknown_platform",
            Self::MarketNotFound { .. } => "market_not_found",
            Self::InvalidSide { .. } => "invalid_side",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::SlippageExceeded { .. } => "slippage_exceeded",
            Self::InsufficientShares { .. } => "insufficient_shares",
            Self::NoQuote { .. } => "no_quote",
            Self::InsufficientLiquidity { .. } => "insufficient_liquidity",
            Self::PositionNotFound { .. } => "position_not_found",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::NotSupported { .. } => "not_supported",
            Self::Cancelled => "cancelled",
            Self::InvalidInput(_) => "invalid_input",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::AllPlatformsFailed { .. } => "all_platforms_failed",
        }
    }
}

/// Result alias for every trading operation.
pub type TradingResult<T> = Result<T, TradingError>;
