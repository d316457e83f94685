//! Hedgehog Markets Connector - Read-only REST Venue
//!
//! Implements `MarketConnector` over the Hedgehog REST API. Trading
//! requires contract integration the venue does not expose over REST,
//! so `create_position` and `close_position` fail with `NotSupported`.
//! Confirmation waits go through the paired blockchain connector.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::domain::market::parse_timestamp;
use crate::domain::units::ensure_probability;
use crate::domain::{
  Market, MarketFilter, MarketStatus, Orderbook, Position, PositionSide, PriceLevel, TradingError,
  TradingResult, TransactionOutcome, TransactionRef,
};
use crate::ports::{BlockchainConnector, MarketConnector};
use crate::usecases::confirmation::{wait_for_finality, ConfirmationPolicy};

use super::client::HttpClient;
use super::types::{
  HedgehogLevel, HedgehogMarket, HedgehogPosition, MarketEnvelope, MarketsEnvelope,
  OrderbookEnvelope, PositionsEnvelope, PriceEnvelope,
};

/// Hedgehog Markets venue connector.
pub struct HedgehogConnector {
  /// Registered platform name.
  platform: String,
  /// REST client (rate limited, retrying).
  client: HttpClient,
  /// Settlement chain, used for confirmation waits.
  chain: Arc<dyn BlockchainConnector>,
  /// Finality polling policy.
  confirmation: ConfirmationPolicy,
}

impl HedgehogConnector {
  pub fn new(
    platform: impl Into<String>,
    client: HttpClient,
    chain: Arc<dyn BlockchainConnector>,
    confirmation: ConfirmationPolicy,
  ) -> Self {
    Self {
      platform: platform.into(),
      client,
      chain,
      confirmation,
    }
  }

  /// Convert a venue market into the canonical model.
  ///
  /// When `requested_id` is set the body must describe that market; an
  /// empty body id is filled in from it.
  fn to_market(&self, raw: HedgehogMarket, requested_id: Option<&str>) -> TradingResult<Market> {
    let status = match raw.status.as_deref() {
      Some(status) => MarketStatus::from_venue(status),
      None if raw.resolved => MarketStatus::Resolved,
      None if raw.closed => MarketStatus::Closed,
      None => MarketStatus::Open,
    };

    let market_id = match requested_id {
      Some(requested) if raw.id.is_empty() || raw.id == requested => requested.to_string(),
      Some(requested) => {
        return Err(TradingError::malformed(
          self.platform.clone(),
          format!("asked for market `{requested}`, got `{}`", raw.id),
        ));
      }
      None => raw.id,
    };

    let end_date = raw.end_date.as_deref().and_then(|ts| {
      let parsed = parse_timestamp(ts);
      if parsed.is_none() {
        debug!(market_id = %market_id, raw = ts, "Unparseable endDate");
      }
      parsed
    });

    let market = Market {
      market_id,
      question: raw.question,
      description: raw.description,
      outcomes: raw
        .outcomes
        .filter(|o| !o.is_empty())
        .unwrap_or_else(Market::binary_outcomes),
      status,
      end_date,
      volume: raw.volume,
      liquidity: raw.liquidity,
      platform: self.platform.clone(),
      blockchain: self.chain.name().to_string(),
      metadata: raw.extra,
    };
    market.validate()?;
    Ok(market)
  }

  /// Convert a venue position; `None` for records that cannot be held.
  fn to_position(&self, raw: HedgehogPosition) -> Option<Position> {
    let side = match raw.side.parse::<PositionSide>() {
      Ok(side) => side,
      Err(_) => {
        warn!(position_id = %raw.id, side = %raw.side, "Skipping position with unknown side");
        return None;
      }
    };
    let position = Position {
      position_id: raw.id,
      market_id: raw.market_id,
      side,
      shares: raw.shares,
      cost_basis: raw.cost_basis,
      current_value: raw.current_value,
      platform: self.platform.clone(),
      blockchain: self.chain.name().to_string(),
    };
    if let Err(e) = position.validate() {
      warn!(error = %e, "Skipping invalid position");
      return None;
    }
    position.is_open().then_some(position)
  }

  fn market_path(market_id: &str) -> TradingResult<String> {
    let id = market_id.trim();
    if id.is_empty() || id.contains('/') {
      return Err(TradingError::invalid_input(format!("invalid market id `{market_id}`")));
    }
    Ok(format!("markets/{id}"))
  }
}

#[async_trait]
impl MarketConnector for HedgehogConnector {
  /// Category is filtered by the venue; status is applied here.
  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn list_markets(&self, filter: &MarketFilter, limit: usize) -> TradingResult<Vec<Market>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let mut query = vec![("limit", limit.to_string())];
    if let Some(category) = &filter.category {
      query.push(("category", category.clone()));
    }
    let envelope: MarketsEnvelope = self
      .client
      .get_json("markets", &query)
      .await?
      .ok_or_else(|| TradingError::upstream(self.platform.clone(), "markets endpoint missing"))?;

    let mut markets = Vec::with_capacity(envelope.markets.len().min(limit));
    for raw in envelope.markets {
      match self.to_market(raw, None) {
        Ok(market) if filter.admits_status(market.status) => markets.push(market),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Skipping malformed market"),
      }
      if markets.len() == limit {
        break;
      }
    }
    debug!(count = markets.len(), "Markets fetched");
    Ok(markets)
  }

  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn get_market(&self, market_id: &str) -> TradingResult<Option<Market>> {
    let path = Self::market_path(market_id)?;
    let envelope: Option<MarketEnvelope> = self.client.get_json(&path, &[]).await?;
    match envelope.and_then(|e| e.market) {
      Some(raw) => self.to_market(raw, Some(market_id)).map(Some),
      None => Ok(None),
    }
  }

  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn get_price(&self, market_id: &str, side: PositionSide) -> TradingResult<Decimal> {
    let path = format!("{}/price", Self::market_path(market_id)?);
    let envelope: PriceEnvelope = self
      .client
      .get_json(&path, &[])
      .await?
      .ok_or_else(|| TradingError::market_not_found(self.platform.clone(), market_id))?;

    let price = match side {
      PositionSide::Yes => envelope.data.yes,
      PositionSide::No => envelope.data.no,
    }
    .ok_or_else(|| TradingError::InvalidSide {
      market_id: market_id.to_string(),
      side,
    })?;
    ensure_probability(&self.platform, price)
  }

  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn get_orderbook(&self, market_id: &str) -> TradingResult<Orderbook> {
    let path = format!("{}/orderbook", Self::market_path(market_id)?);
    let envelope: OrderbookEnvelope = self
      .client
      .get_json(&path, &[])
      .await?
      .ok_or_else(|| TradingError::market_not_found(self.platform.clone(), market_id))?;

    let level = |l: &HedgehogLevel| {
      let (price, size) = l.parts();
      PriceLevel::new(price, size)
    };
    let book = Orderbook::normalized(
      &self.platform,
      market_id,
      envelope.data.bids.iter().map(level),
      envelope.data.asks.iter().map(level),
    )?;
    debug!(
      bids = book.bids.len(),
      asks = book.asks.len(),
      spread = ?book.spread(),
      "Orderbook fetched"
    );
    Ok(book)
  }

  async fn create_position(
    &self,
    _market_id: &str,
    _side: PositionSide,
    _amount: Decimal,
    _max_price: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    Err(TradingError::not_supported(self.platform.clone(), "create_position"))
  }

  async fn close_position(
    &self,
    _position_id: &str,
    _shares: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    Err(TradingError::not_supported(self.platform.clone(), "close_position"))
  }

  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn get_positions(&self, address: &str) -> TradingResult<Vec<Position>> {
    let address = address.trim();
    if address.is_empty() || address.contains('/') {
      return Err(TradingError::invalid_input(format!("invalid user address `{address}`")));
    }
    let envelope: Option<PositionsEnvelope> = self
      .client
      .get_json(&format!("users/{address}/positions"), &[])
      .await?;

    Ok(
      envelope
        .map(|e| e.positions)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| self.to_position(raw))
        .collect(),
    )
  }

  async fn wait_for_confirmation(&self, tx: &TransactionRef) -> TradingResult<TransactionOutcome> {
    wait_for_finality(self.chain.as_ref(), tx, self.confirmation).await
  }
}
