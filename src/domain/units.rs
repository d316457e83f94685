//! Canonical unit conventions.
//!
//! Prices are probabilities in `[0, 1]` expressed as `Decimal`: the quote
//! currency cost of one share paying 1 on its outcome. Chain balances are
//! whole tokens (`atomic / 10^decimals`).

use rust_decimal::Decimal;

use super::error::{TradingError, TradingResult};

/// Decimals of native ether-style balances (wei).
pub const EVM_NATIVE_DECIMALS: u32 = 18;

/// Decimals of native SOL balances (lamports).
pub const SOLANA_NATIVE_DECIMALS: u32 = 9;

/// Largest scale `rust_decimal` can represent.
const MAX_SCALE: u32 = 28;

/// Check that a price already lies in the canonical `[0, 1]` range.
pub fn ensure_probability(source: &str, price: Decimal) -> TradingResult<Decimal> {
    if price < Decimal::ZERO || price > Decimal::ONE {
        return Err(TradingError::malformed(
            source,
            format!("price {price} outside [0, 1]"),
        ));
    }
    Ok(price.normalize())
}

/// Complementary price of the other side of a binary market.
pub fn complement(price: Decimal) -> Decimal {
    Decimal::ONE - price
}

/// Convert an on-chain atomic amount into whole tokens.
pub fn from_atomic_units(raw: u128, decimals: u32) -> TradingResult<Decimal> {
    if decimals > MAX_SCALE {
        return Err(TradingError::invalid_input(format!(
            "token decimals {decimals} exceed supported scale {MAX_SCALE}"
        )));
    }
    let mantissa = i128::try_from(raw)
        .map_err(|_| TradingError::invalid_input(format!("amount {raw} out of range")))?;
    Decimal::try_from_i128_with_scale(mantissa, decimals)
        .map(|value| value.normalize())
        .map_err(|e| TradingError::invalid_input(format!("amount {raw} out of range: {e}")))
}
