//! REST Venue Adapters
//!
//! HTTP-backed market connectors.
//!
//! Sub-modules:
//! - `client`: HTTP client with rate limiting and retries
//! - `hedgehog`: Hedgehog Markets connector (read-only)
//! - `types`: API response type definitions

pub mod client;
pub mod hedgehog;
pub mod types;

pub use client::{HttpClient, HttpClientConfig};
pub use hedgehog::HedgehogConnector;
