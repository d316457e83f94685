//! Configuration Module - TOML-based Trader Configuration
//!
//! Loads and validates configuration from `config.toml`. Secrets
//! never live in the file: each chain and platform names the
//! environment variable holding its key, and the loader resolves
//! it into a redacted `Credential`.

pub mod loader;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level trader configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and logging.
  #[serde(default)]
  pub trader: TraderConfig,
  /// Fan-out and confirmation timing.
  #[serde(default)]
  pub orchestrator: OrchestratorConfig,
  /// Shared HTTP client tuning for venue APIs.
  #[serde(default)]
  pub http: HttpConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Settlement chains, connected in order.
  #[serde(default)]
  pub blockchains: Vec<BlockchainConfig>,
  /// Trading venues, registered in order.
  #[serde(default)]
  pub platforms: Vec<PlatformConfig>,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TraderConfig {
  /// Human-readable instance name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for TraderConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
    }
  }
}

/// Orchestrator timing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
  /// Per-platform bound on aggregate reads (milliseconds).
  #[serde(default = "default_fanout_timeout")]
  pub fanout_timeout_ms: u64,
  /// Give up waiting for finality after this many seconds.
  #[serde(default = "default_confirmation_timeout")]
  pub confirmation_timeout_secs: u64,
  /// Delay between confirmation polls (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub confirmation_poll_ms: u64,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      fanout_timeout_ms: default_fanout_timeout(),
      confirmation_timeout_secs: default_confirmation_timeout(),
      confirmation_poll_ms: default_poll_interval(),
    }
  }
}

impl OrchestratorConfig {
  pub const fn fanout_timeout(&self) -> Duration {
    Duration::from_millis(self.fanout_timeout_ms)
  }

  pub const fn confirmation_timeout(&self) -> Duration {
    Duration::from_secs(self.confirmation_timeout_secs)
  }

  pub const fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.confirmation_poll_ms)
  }
}

/// HTTP client configuration shared by REST venue connectors.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Maximum retries on transient errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff), milliseconds.
  #[serde(default = "default_retry_delay")]
  pub retry_base_delay_ms: u64,
  /// Maximum concurrent in-flight requests per venue.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Client-side request budget per venue.
  #[serde(default = "default_rps")]
  pub requests_per_second: u32,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: default_timeout(),
      max_retries: default_max_retries(),
      retry_base_delay_ms: default_retry_delay(),
      max_concurrent: default_max_concurrent(),
      requests_per_second: default_rps(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export and the health server.
  #[serde(default)]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// Blockchain family, selecting the connector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
  /// Account/nonce chains: Ethereum, Polygon, BNB Chain.
  Evm,
  /// Signature/lookup chain.
  Solana,
  /// In-memory ledger for dry runs.
  Simulated,
}

/// Solana commitment level treated as final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
  #[default]
  Confirmed,
  Finalized,
}

impl Commitment {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Confirmed => "confirmed",
      Self::Finalized => "finalized",
    }
  }
}

/// One settlement chain.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainConfig {
  /// Registry name ("ethereum", "polygon", "bnb", "solana", ...).
  pub name: String,
  /// Connector family.
  pub family: ChainFamily,
  /// RPC endpoint; falls back to `<NAME>_RPC_URL` then a per-chain default.
  pub rpc_url: Option<String>,
  /// Expected EVM chain id; defaults per well-known chain name.
  pub chain_id: Option<u64>,
  /// EVM blocks on top of the inclusion block before a tx is final.
  #[serde(default = "default_confirmations")]
  pub required_confirmations: u64,
  /// Solana commitment considered final.
  #[serde(default)]
  pub commitment: Commitment,
  /// Simulated chain: polls before a submission confirms.
  #[serde(default = "default_confirm_after")]
  pub confirm_after_polls: u32,
  /// Environment variable holding the signing key, if any.
  pub private_key_env: Option<String>,
  /// Resolved key material (never deserialized from the file).
  #[serde(skip)]
  pub private_key: Option<Credential>,
  /// Simulated chain: opening balances.
  #[serde(default)]
  pub balances: Vec<SeedBalance>,
}

/// Opening balance credited to a simulated chain account.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedBalance {
  pub address: String,
  /// Token contract or mint; native when absent.
  pub token: Option<String>,
  pub amount: Decimal,
}

/// Venue family, selecting the connector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
  /// Hedgehog Markets REST API (read-only).
  Hedgehog,
  /// In-memory venue seeded from a JSON fixture.
  Paper,
}

/// One trading venue.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
  /// Registry name.
  pub name: String,
  /// Connector family.
  pub kind: PlatformKind,
  /// Blockchain preference list; the first connected one is used.
  pub blockchains: Vec<String>,
  /// REST base URL (hedgehog).
  pub api_url: Option<String>,
  /// Environment variable holding the API key, if any.
  pub api_key_env: Option<String>,
  /// Resolved API key (never deserialized from the file).
  #[serde(skip)]
  pub api_key: Option<Credential>,
  /// Market fixture (paper).
  pub fixture: Option<PathBuf>,
  /// Account owning paper positions.
  pub owner_address: Option<String>,
}

/// Secret value whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
  pub fn new(secret: impl Into<String>) -> Self {
    Self(secret.into())
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Credential(***)")
  }
}

/// Well-known RPC endpoint for a chain name.
pub fn default_rpc_url(chain: &str) -> Option<&'static str> {
  match chain {
    "ethereum" => Some("https://eth.llamarpc.com"),
    "polygon" => Some("https://polygon-rpc.com"),
    "bnb" => Some("https://bsc-dataseed1.binance.org"),
    "solana" => Some("https://api.mainnet-beta.solana.com"),
    _ => None,
  }
}

/// Well-known EVM chain id for a chain name.
pub fn default_chain_id(chain: &str) -> Option<u64> {
  match chain {
    "ethereum" => Some(1),
    "polygon" => Some(137),
    "bnb" => Some(56),
    _ => None,
  }
}

// Default value functions for serde

fn default_name() -> String {
  "prediction-market-trader".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_fanout_timeout() -> u64 {
  10_000
}

fn default_confirmation_timeout() -> u64 {
  120
}

fn default_poll_interval() -> u64 {
  2_000
}

fn default_timeout() -> u64 {
  30
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_delay() -> u64 {
  200
}

fn default_max_concurrent() -> usize {
  10
}

fn default_rps() -> u32 {
  5
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_confirmations() -> u64 {
  1
}

fn default_confirm_after() -> u32 {
  1
}
