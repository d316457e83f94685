//! Paper venue fixture format.
//!
//! ```json
//! { "markets": [ { "market_id": "btc-150k", "question": "...",
//!     "last_price": "0.42",
//!     "bids": [{ "price": "0.41", "size": "500" }],
//!     "asks": [{ "price": "0.44", "size": "350" }] } ] }
//! ```
//!
//! Books are YES-side. Prices accept JSON numbers or strings.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{MarketStatus, PriceLevel};

#[derive(Debug, Clone, Deserialize)]
pub struct PaperFixture {
  #[serde(default)]
  pub markets: Vec<FixtureMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureMarket {
  pub market_id: String,
  pub question: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Defaults to `["YES", "NO"]`.
  #[serde(default)]
  pub outcomes: Option<Vec<String>>,
  #[serde(default = "default_status")]
  pub status: MarketStatus,
  #[serde(default)]
  pub end_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub volume: Option<Decimal>,
  #[serde(default)]
  pub liquidity: Option<Decimal>,
  /// Last traded YES price, quoted when the book is empty.
  #[serde(default)]
  pub last_price: Option<Decimal>,
  #[serde(default)]
  pub bids: Vec<PriceLevel>,
  #[serde(default)]
  pub asks: Vec<PriceLevel>,
  #[serde(default)]
  pub metadata: BTreeMap<String, serde_json::Value>,
}

const fn default_status() -> MarketStatus {
  MarketStatus::Open
}

impl PaperFixture {
  /// Read and parse a fixture file.
  pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read paper fixture: {}", path.display()))?;
    Self::from_json(&content).with_context(|| format!("Invalid paper fixture: {}", path.display()))
  }

  pub fn from_json(content: &str) -> anyhow::Result<Self> {
    let fixture: Self = serde_json::from_str(content).context("Failed to parse fixture JSON")?;
    fixture.validate()?;
    Ok(fixture)
  }

  fn validate(&self) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for market in &self.markets {
      if market.market_id.trim().is_empty() {
        bail!("fixture market with empty market_id");
      }
      if !seen.insert(market.market_id.as_str()) {
        bail!("duplicate fixture market `{}`", market.market_id);
      }
      if let Some(price) = market.last_price {
        if price < Decimal::ZERO || price > Decimal::ONE {
          bail!("market `{}` last_price {price} outside [0, 1]", market.market_id);
        }
      }
    }
    Ok(())
  }
}
