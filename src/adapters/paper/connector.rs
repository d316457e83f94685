//! Paper Venue Connector - In-memory Trading Venue
//!
//! Serves markets and YES-side books from a fixture and trades against
//! them for a single owner address. Fills walk the book, settlements are
//! submitted through the paired blockchain connector, and positions are
//! marked to the best bid of their side.
//!
//! The fixture book is a static reference: fills do not deplete it, so
//! market data is read without locking. Only positions sit behind the
//! mutex, and it is never held while a settlement is in flight.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::units::{complement, ensure_probability};
use crate::domain::{
  Market, MarketFilter, MarketId, Orderbook, Position, PositionId, PositionSide, SignedTransaction,
  TradingError, TradingResult, TransactionOutcome, TransactionRef,
};
use crate::ports::{BlockchainConnector, MarketConnector};
use crate::usecases::confirmation::{wait_for_finality, ConfirmationPolicy};

use super::fixture::PaperFixture;

#[derive(Debug, Clone)]
struct PaperMarket {
  market: Market,
  book: Orderbook,
  /// Last traded YES price.
  last_price: Option<Decimal>,
}

impl PaperMarket {
  fn price(&self, side: PositionSide) -> Option<Decimal> {
    self.book.implied_price(side).or_else(|| {
      self.last_price.map(|yes| match side {
        PositionSide::Yes => yes,
        PositionSide::No => complement(yes),
      })
    })
  }

  /// Mark price for a held position: best bid of its side, else the quote.
  fn mark(&self, side: PositionSide) -> Decimal {
    self
      .book
      .side_view(side)
      .best_bid()
      .map(|level| level.price)
      .or_else(|| self.price(side))
      .unwrap_or(Decimal::ZERO)
  }
}

/// Shares and cost taken off a position while its sale settles.
#[derive(Debug, Clone, Copy)]
struct Reservation {
  shares: Decimal,
  cost_basis: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum FillAction {
  Buy,
  Sell,
}

/// Settlement record submitted to the paired chain.
#[derive(Debug, Serialize)]
struct Settlement<'a> {
  venue: &'a str,
  owner: &'a str,
  market_id: &'a str,
  side: PositionSide,
  action: FillAction,
  shares: Decimal,
  /// Quote currency paid (buy) or received (sell).
  amount: Decimal,
  worst_price: Decimal,
  nonce: Uuid,
}

/// In-memory venue with real trading semantics.
pub struct PaperConnector {
  platform: String,
  owner: String,
  chain: Arc<dyn BlockchainConnector>,
  confirmation: ConfirmationPolicy,
  markets: IndexMap<MarketId, PaperMarket>,
  positions: Mutex<IndexMap<PositionId, Position>>,
}

impl PaperConnector {
  pub fn new(
    platform: impl Into<String>,
    owner: impl Into<String>,
    fixture: PaperFixture,
    chain: Arc<dyn BlockchainConnector>,
    confirmation: ConfirmationPolicy,
  ) -> TradingResult<Self> {
    let platform = platform.into();
    let owner = owner.into();
    if owner.trim().is_empty() {
      return Err(TradingError::invalid_input("paper venue owner address must not be empty"));
    }

    let mut markets = IndexMap::with_capacity(fixture.markets.len());
    for raw in fixture.markets {
      let market = Market {
        market_id: raw.market_id.clone(),
        question: raw.question,
        description: raw.description,
        outcomes: raw
          .outcomes
          .filter(|o| !o.is_empty())
          .unwrap_or_else(Market::binary_outcomes),
        status: raw.status,
        end_date: raw.end_date,
        volume: raw.volume,
        liquidity: raw.liquidity,
        platform: platform.clone(),
        blockchain: chain.name().to_string(),
        metadata: raw.metadata,
      };
      market.validate()?;
      let book = Orderbook::normalized(&platform, raw.market_id.clone(), raw.bids, raw.asks)?;
      markets.insert(
        raw.market_id,
        PaperMarket {
          market,
          book,
          last_price: raw.last_price,
        },
      );
    }

    info!(platform = %platform, markets = markets.len(), chain = chain.name(), "Paper venue loaded");
    Ok(Self {
      platform,
      owner,
      chain,
      confirmation,
      markets,
      positions: Mutex::new(IndexMap::new()),
    })
  }

  pub fn owner(&self) -> &str {
    &self.owner
  }

  fn position_id(market_id: &str, side: PositionSide) -> PositionId {
    format!("{market_id}:{side}")
  }

  fn lookup(&self, market_id: &str) -> TradingResult<&PaperMarket> {
    self
      .markets
      .get(market_id)
      .ok_or_else(|| TradingError::market_not_found(self.platform.clone(), market_id))
  }

  fn offered(&self, market_id: &str, side: PositionSide) -> TradingResult<&PaperMarket> {
    let entry = self.lookup(market_id)?;
    if !entry.market.is_binary() {
      return Err(TradingError::InvalidSide {
        market_id: market_id.to_string(),
        side,
      });
    }
    Ok(entry)
  }

  async fn settle(&self, settlement: &Settlement<'_>) -> TradingResult<TransactionRef> {
    let payload = serde_json::to_vec(settlement)
      .map_err(|e| TradingError::invalid_input(format!("unencodable settlement: {e}")))?;
    self
      .chain
      .submit_transaction(&SignedTransaction::new(payload))
      .await
  }

  /// Take `shares` off a held position ahead of settlement.
  ///
  /// A full close removes the position; a partial close scales the cost
  /// basis by the fraction kept.
  fn reserve(
    positions: &mut IndexMap<PositionId, Position>,
    held: &Position,
    shares: Decimal,
    mark: Decimal,
  ) -> Reservation {
    if shares == held.shares {
      positions.shift_remove(&held.position_id);
      return Reservation {
        shares,
        cost_basis: held.cost_basis,
      };
    }
    let remaining = held.shares - shares;
    let kept_cost = held.cost_basis * (remaining / held.shares);
    if let Some(position) = positions.get_mut(&held.position_id) {
      position.shares = remaining;
      position.cost_basis = kept_cost;
      position.current_value = remaining * mark;
    }
    Reservation {
      shares,
      cost_basis: held.cost_basis - kept_cost,
    }
  }

  /// Put reserved shares back after a settlement the chain refused.
  async fn release(&self, held: &Position, reservation: Reservation) {
    let mut positions = self.positions.lock().await;
    let position = positions
      .entry(held.position_id.clone())
      .or_insert_with(|| Position {
        shares: Decimal::ZERO,
        cost_basis: Decimal::ZERO,
        current_value: Decimal::ZERO,
        ..held.clone()
      });
    position.shares = position.shares.saturating_add(reservation.shares);
    position.cost_basis = position.cost_basis.saturating_add(reservation.cost_basis);
    if let Ok(entry) = self.lookup(&held.market_id) {
      position.current_value = position.shares * entry.mark(held.side);
    }
  }
}

#[async_trait]
impl MarketConnector for PaperConnector {
  async fn list_markets(&self, filter: &MarketFilter, limit: usize) -> TradingResult<Vec<Market>> {
    Ok(
      self
        .markets
        .values()
        .filter(|entry| filter.matches(&entry.market))
        .take(limit)
        .map(|entry| entry.market.clone())
        .collect(),
    )
  }

  async fn get_market(&self, market_id: &str) -> TradingResult<Option<Market>> {
    Ok(self.markets.get(market_id).map(|entry| entry.market.clone()))
  }

  async fn get_price(&self, market_id: &str, side: PositionSide) -> TradingResult<Decimal> {
    let entry = self.offered(market_id, side)?;
    let price = entry.price(side).ok_or_else(|| TradingError::NoQuote {
      platform: self.platform.clone(),
      market_id: market_id.to_string(),
    })?;
    ensure_probability(&self.platform, price)
  }

  async fn get_orderbook(&self, market_id: &str) -> TradingResult<Orderbook> {
    Ok(self.lookup(market_id)?.book.clone())
  }

  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn create_position(
    &self,
    market_id: &str,
    side: PositionSide,
    amount: Decimal,
    max_price: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    let entry = self.offered(market_id, side)?;
    if !entry.market.is_tradable() {
      return Err(TradingError::invalid_input(format!(
        "market `{market_id}` is {}",
        entry.market.status
      )));
    }
    if amount <= Decimal::ZERO {
      return Err(TradingError::invalid_input(format!("amount must be positive, got {amount}")));
    }
    if let Some(max) = max_price {
      if max < Decimal::ZERO || max > Decimal::ONE {
        return Err(TradingError::invalid_input(format!("max price {max} outside [0, 1]")));
      }
    }

    let view = entry.book.side_view(side);
    let quote = view
      .quote_buy(amount)
      .ok_or_else(|| TradingError::InsufficientLiquidity {
        requested: amount,
        available: view.ask_depth(),
      })?;
    if let Some(max) = max_price {
      if quote.worst_price > max {
        debug!(worst = %quote.worst_price, max = %max, "Slippage guard rejected buy");
        return Err(TradingError::SlippageExceeded {
          achievable: quote.worst_price,
          max_price: max,
        });
      }
    }

    let tx = self
      .settle(&Settlement {
        venue: &self.platform,
        owner: &self.owner,
        market_id,
        side,
        action: FillAction::Buy,
        shares: quote.shares,
        amount: quote.cost,
        worst_price: quote.worst_price,
        nonce: Uuid::new_v4(),
      })
      .await?;

    let mut positions = self.positions.lock().await;
    let position_id = Self::position_id(market_id, side);
    let position = positions
      .entry(position_id.clone())
      .or_insert_with(|| Position {
        position_id,
        market_id: market_id.to_string(),
        side,
        shares: Decimal::ZERO,
        cost_basis: Decimal::ZERO,
        current_value: Decimal::ZERO,
        platform: self.platform.clone(),
        blockchain: self.chain.name().to_string(),
      });
    position.shares = position.shares.saturating_add(quote.shares);
    position.cost_basis = position.cost_basis.saturating_add(quote.cost);
    position.current_value = position.shares * entry.mark(side);

    info!(
      tx = %tx,
      shares = %quote.shares,
      avg_price = %quote.average_price,
      held = %position.shares,
      "Paper buy filled"
    );
    Ok(tx)
  }

  #[instrument(skip(self), fields(platform = %self.platform))]
  async fn close_position(
    &self,
    position_id: &str,
    shares: Option<Decimal>,
  ) -> TradingResult<TransactionRef> {
    let (held, sale, reservation) = {
      let mut positions = self.positions.lock().await;
      let held = positions
        .get(position_id)
        .cloned()
        .ok_or_else(|| TradingError::PositionNotFound {
          platform: self.platform.clone(),
          position_id: position_id.to_string(),
        })?;

      let requested = match shares {
        Some(s) if s <= Decimal::ZERO => {
          return Err(TradingError::invalid_input(format!("shares must be positive, got {s}")));
        }
        Some(s) if s > held.shares => {
          return Err(TradingError::InsufficientShares {
            requested: s,
            held: held.shares,
          });
        }
        Some(s) => s,
        None => held.shares,
      };

      let entry = self.lookup(&held.market_id)?;
      let view = entry.book.side_view(held.side);
      let sale = view
        .quote_sell(requested)
        .ok_or_else(|| TradingError::InsufficientLiquidity {
          requested,
          available: view.bid_depth(),
        })?;
      // Reserved now so a concurrent close cannot sell the same shares.
      let reservation = Self::reserve(&mut positions, &held, requested, entry.mark(held.side));
      (held, sale, reservation)
    };

    let settled = self
      .settle(&Settlement {
        venue: &self.platform,
        owner: &self.owner,
        market_id: &held.market_id,
        side: held.side,
        action: FillAction::Sell,
        shares: sale.shares,
        amount: sale.proceeds,
        worst_price: sale.worst_price,
        nonce: Uuid::new_v4(),
      })
      .await;

    match settled {
      Ok(tx) => {
        info!(
          tx = %tx,
          proceeds = %sale.proceeds,
          remaining = %(held.shares - reservation.shares),
          "Paper sell filled"
        );
        Ok(tx)
      }
      Err(e) => {
        warn!(error = %e, position_id, "Settlement refused, restoring reserved shares");
        self.release(&held, reservation).await;
        Err(e)
      }
    }
  }

  async fn get_positions(&self, address: &str) -> TradingResult<Vec<Position>> {
    let address = address.trim();
    if address.is_empty() {
      return Err(TradingError::invalid_input("user address must not be empty"));
    }
    if !address.eq_ignore_ascii_case(&self.owner) {
      return Ok(Vec::new());
    }

    let positions = self.positions.lock().await;
    Ok(
      positions
        .values()
        .map(|position| {
          let mut marked = position.clone();
          if let Some(entry) = self.markets.get(&position.market_id) {
            marked.current_value = position.shares * entry.mark(position.side);
          }
          marked
        })
        .collect(),
    )
  }

  async fn wait_for_confirmation(&self, tx: &TransactionRef) -> TradingResult<TransactionOutcome> {
    wait_for_finality(self.chain.as_ref(), tx, self.confirmation).await
  }
}
