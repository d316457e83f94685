//! Positions held on a platform and the cross-platform side enum.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{TradingError, TradingResult};
use super::market::MarketId;

/// Platform-scoped position identifier.
pub type PositionId = String;

/// Minimal cross-platform outcome side.
///
/// Platforms with more than two outcomes expose the extra
/// outcomes through `Market::metadata`, not through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Yes,
    No,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

impl FromStr for PositionSide {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" | "Y" => Ok(Self::Yes),
            "NO" | "N" => Ok(Self::No),
            other => Err(TradingError::invalid_input(format!(
                "unknown position side `{other}`"
            ))),
        }
    }
}

/// A user's holding in one side of one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Platform-scoped identifier.
    pub position_id: PositionId,
    /// Parent market.
    pub market_id: MarketId,
    /// Outcome held.
    pub side: PositionSide,
    /// Shares held, never negative.
    pub shares: Decimal,
    /// Quote currency spent to acquire the shares.
    pub cost_basis: Decimal,
    /// Mark-to-market value in quote currency.
    pub current_value: Decimal,
    /// Owning platform.
    pub platform: String,
    /// Blockchain the platform settles on.
    pub blockchain: String,
}

impl Position {
    /// Enforce the non-negative share invariant.
    pub fn validate(&self) -> TradingResult<()> {
        if self.shares < Decimal::ZERO {
            return Err(TradingError::invalid_input(format!(
                "position `{}` has negative shares {}",
                self.position_id, self.shares
            )));
        }
        Ok(())
    }

    /// Whether any shares remain.
    pub fn is_open(&self) -> bool {
        self.shares > Decimal::ZERO
    }

    /// Unrealized profit or loss in quote currency.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.current_value.saturating_sub(self.cost_basis)
    }

    /// Average price paid per share, if any shares are held.
    pub fn average_entry_price(&self) -> Option<Decimal> {
        if self.is_open() {
            self.cost_basis.checked_div(self.shares)
        } else {
            None
        }
    }
}
