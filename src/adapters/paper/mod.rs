//! Paper venue: fixture-backed markets with full trading semantics.

pub mod connector;
pub mod fixture;

pub use connector::PaperConnector;
pub use fixture::PaperFixture;
