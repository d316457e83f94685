//! Domain layer - Core trading models.
//!
//! Platform-agnostic markets, positions, orderbooks and the error
//! taxonomy every connector speaks. No I/O here (hexagonal inner ring).

pub mod error;
pub mod market;
pub mod orderbook;
pub mod position;
pub mod transaction;
pub mod units;

pub use error::{PlatformFailure, TradingError, TradingResult};
pub use market::{Market, MarketFilter, MarketId, MarketStatus};
pub use orderbook::{FillQuote, Orderbook, PriceLevel, SaleQuote};
pub use position::{Position, PositionId, PositionSide};
pub use transaction::{ConfirmationStatus, SignedTransaction, TransactionOutcome, TransactionRef};
