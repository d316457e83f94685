//! Orderbook normalization and fill quoting.
//!
//! A binary market's book is stored for the YES outcome. The NO view
//! is derived by complementing prices: NO asks come from YES bids and
//! NO bids from YES asks.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{TradingError, TradingResult};
use super::market::MarketId;
use super::position::PositionSide;
use super::units::complement;

/// One resting price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Normalized book: bids descending, asks ascending, one entry per price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orderbook {
    pub market_id: MarketId,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Result of walking the ask side with a quote-currency budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillQuote {
    /// Shares acquired.
    pub shares: Decimal,
    /// Quote currency spent.
    pub cost: Decimal,
    /// Volume-weighted average price.
    pub average_price: Decimal,
    /// Highest level touched; the price checked against a limit.
    pub worst_price: Decimal,
}

/// Result of walking the bid side to sell a number of shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleQuote {
    pub shares: Decimal,
    pub proceeds: Decimal,
    pub worst_price: Decimal,
}

impl Orderbook {
    /// Build a book from raw venue levels, enforcing the data-model invariants.
    ///
    /// Drops levels with non-positive size or a price outside `[0, 1]`,
    /// merges duplicate price levels and sorts best-first.
    ///
    /// # Errors
    /// `MalformedResponse` (attributed to `source`) when merged sizes at
    /// one price overflow `Decimal`.
    pub fn normalized(
        source: &str,
        market_id: impl Into<MarketId>,
        bids: impl IntoIterator<Item = PriceLevel>,
        asks: impl IntoIterator<Item = PriceLevel>,
    ) -> TradingResult<Self> {
        let market_id = market_id.into();
        let mut bids = merge_levels(source, &market_id, bids)?;
        bids.reverse();
        let asks = merge_levels(source, &market_id, asks)?;
        Ok(Self {
            market_id,
            bids,
            asks,
        })
    }

    /// Book with no levels on either side.
    pub fn empty(market_id: impl Into<MarketId>) -> Self {
        Self {
            market_id: market_id.into(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Book as seen by a trader of `side`.
    pub fn side_view(&self, side: PositionSide) -> Self {
        match side {
            PositionSide::Yes => self.clone(),
            PositionSide::No => Self {
                market_id: self.market_id.clone(),
                bids: self
                    .asks
                    .iter()
                    .map(|l| PriceLevel::new(complement(l.price), l.size))
                    .collect(),
                asks: self
                    .bids
                    .iter()
                    .map(|l| PriceLevel::new(complement(l.price), l.size))
                    .collect(),
            },
        }
    }

    /// Implied price for `side`: mid if two-sided, else whichever side exists.
    pub fn implied_price(&self, side: PositionSide) -> Option<Decimal> {
        let view = self.side_view(side);
        view.mid_price()
            .or_else(|| view.best_ask().map(|l| l.price))
            .or_else(|| view.best_bid().map(|l| l.price))
    }

    /// Walk the asks spending up to `budget` quote currency.
    ///
    /// Returns `None` when the book cannot absorb the whole budget or the
    /// share count overflows.
    pub fn quote_buy(&self, budget: Decimal) -> Option<FillQuote> {
        if budget <= Decimal::ZERO {
            return None;
        }
        let mut remaining = budget;
        let mut shares = Decimal::ZERO;
        let mut worst_price = Decimal::ZERO;

        for level in &self.asks {
            if level.price.is_zero() {
                continue;
            }
            let level_cost = level.price.checked_mul(level.size)?;
            let spend = remaining.min(level_cost);
            shares = shares.checked_add(spend.checked_div(level.price)?)?;
            remaining -= spend;
            worst_price = level.price;
            if remaining.is_zero() {
                break;
            }
        }

        if remaining > Decimal::ZERO || shares.is_zero() {
            return None;
        }

        Some(FillQuote {
            shares,
            cost: budget,
            average_price: budget / shares,
            worst_price,
        })
    }

    /// Walk the bids selling `shares`; `None` when depth is insufficient.
    pub fn quote_sell(&self, shares: Decimal) -> Option<SaleQuote> {
        if shares <= Decimal::ZERO {
            return None;
        }
        let mut remaining = shares;
        let mut proceeds = Decimal::ZERO;
        let mut worst_price = Decimal::ZERO;

        for level in &self.bids {
            let fill = remaining.min(level.size);
            proceeds = proceeds.checked_add(fill.checked_mul(level.price)?)?;
            remaining -= fill;
            worst_price = level.price;
            if remaining.is_zero() {
                break;
            }
        }

        if remaining > Decimal::ZERO {
            return None;
        }
        Some(SaleQuote {
            shares,
            proceeds,
            worst_price,
        })
    }

    /// Total quote currency resting on the ask side, saturating at `Decimal::MAX`.
    pub fn ask_depth(&self) -> Decimal {
        self.asks
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.price.saturating_mul(l.size)))
    }

    /// Total shares resting on the bid side, saturating at `Decimal::MAX`.
    pub fn bid_depth(&self) -> Decimal {
        self.bids
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.size))
    }
}

/// Merge levels by price, ascending.
fn merge_levels(
    source: &str,
    market_id: &str,
    levels: impl IntoIterator<Item = PriceLevel>,
) -> TradingResult<Vec<PriceLevel>> {
    let mut merged: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for level in levels {
        if level.size <= Decimal::ZERO
            || level.price < Decimal::ZERO
            || level.price > Decimal::ONE
        {
            continue;
        }
        let slot = merged.entry(level.price.normalize()).or_default();
        *slot = slot.checked_add(level.size).ok_or_else(|| {
            TradingError::malformed(
                source,
                format!("size at price {} overflows in `{market_id}`", level.price),
            )
        })?;
    }
    Ok(merged
        .into_iter()
        .map(|(price, size)| PriceLevel::new(price, size))
        .collect())
}
