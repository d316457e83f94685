//! Hedgehog Markets API Response Types
//!
//! Wire shapes of the Hedgehog REST API. Numeric fields accept either
//! JSON numbers or strings; unknown market fields are kept so they can
//! be surfaced through `Market::metadata`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// `GET markets` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsEnvelope {
  #[serde(default)]
  pub markets: Vec<HedgehogMarket>,
}

/// `GET markets/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketEnvelope {
  pub market: Option<HedgehogMarket>,
}

/// Market record as served by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct HedgehogMarket {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub question: String,
  pub description: Option<String>,
  pub outcomes: Option<Vec<String>>,
  /// Explicit status string, when the venue sends one.
  pub status: Option<String>,
  #[serde(default)]
  pub closed: bool,
  #[serde(default)]
  pub resolved: bool,
  #[serde(rename = "endDate")]
  pub end_date: Option<String>,
  pub volume: Option<Decimal>,
  pub liquidity: Option<Decimal>,
  /// Everything else (category, slug, image...).
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

/// `GET markets/{id}/price` response.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceEnvelope {
  #[serde(default)]
  pub data: PriceData,
}

/// Per-side prices, probabilities in `[0, 1]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceData {
  #[serde(rename = "YES")]
  pub yes: Option<Decimal>,
  #[serde(rename = "NO")]
  pub no: Option<Decimal>,
}

/// `GET markets/{id}/orderbook` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookEnvelope {
  #[serde(default)]
  pub data: HedgehogBook,
}

/// YES-side book.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HedgehogBook {
  #[serde(default)]
  pub bids: Vec<HedgehogLevel>,
  #[serde(default)]
  pub asks: Vec<HedgehogLevel>,
}

/// A price level, sent either as an object or a `[price, size]` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HedgehogLevel {
  Object { price: Decimal, size: Decimal },
  Pair(Decimal, Decimal),
}

impl HedgehogLevel {
  pub const fn parts(&self) -> (Decimal, Decimal) {
    match *self {
      Self::Object { price, size } | Self::Pair(price, size) => (price, size),
    }
  }
}

/// `GET users/{address}/positions` response.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsEnvelope {
  #[serde(default)]
  pub positions: Vec<HedgehogPosition>,
}

/// Position record as served by the venue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgehogPosition {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub market_id: String,
  #[serde(default)]
  pub side: String,
  #[serde(default)]
  pub shares: Decimal,
  #[serde(default)]
  pub cost_basis: Decimal,
  #[serde(default)]
  pub current_value: Decimal,
}
