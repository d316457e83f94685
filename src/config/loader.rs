//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, resolving environment-provided
//! endpoints and secrets, validating all parameters, and providing
//! clear error messages for misconfiguration.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{default_rpc_url, AppConfig, ChainFamily, Credential, PlatformKind};

/// Default Hedgehog Markets REST endpoint.
pub const HEDGEHOG_API_URL: &str = "https://api.hedgehog.markets";

/// Upper bound on HTTP retries, keeps backoff schedules finite.
const MAX_HTTP_RETRIES: u32 = 10;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content, |key| std::env::var(key).ok())
    .with_context(|| format!("Invalid configuration in {}", path.display()))?;

  info!(
    blockchains = config.blockchains.len(),
    platforms = config.platforms.len(),
    fanout_timeout_ms = config.orchestrator.fanout_timeout_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse, resolve and validate configuration text.
///
/// `env` looks up environment variables; tests pass a closure over a map.
pub fn parse_config(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
  let mut config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  resolve(&mut config, &env);
  validate_config(&config)?;
  Ok(config)
}

/// Fill endpoints and secrets from the environment and built-in defaults.
fn resolve(config: &mut AppConfig, env: &impl Fn(&str) -> Option<String>) {
  for chain in &mut config.blockchains {
    if chain.rpc_url.is_none() {
      let var = format!("{}_RPC_URL", chain.name.to_ascii_uppercase());
      chain.rpc_url = env(&var).or_else(|| default_rpc_url(&chain.name).map(str::to_string));
    }
    if chain.family == ChainFamily::Evm && chain.chain_id.is_none() {
      chain.chain_id = super::default_chain_id(&chain.name);
    }
    if let Some(var) = &chain.private_key_env {
      chain.private_key = env(var).filter(|v| !v.is_empty()).map(Credential::new);
      if chain.private_key.is_none() {
        warn!(chain = %chain.name, var = %var, "Signing key not set, chain is read-only");
      }
    }
  }

  for platform in &mut config.platforms {
    if platform.kind == PlatformKind::Hedgehog && platform.api_url.is_none() {
      platform.api_url = Some(HEDGEHOG_API_URL.to_string());
    }
    if let Some(var) = &platform.api_key_env {
      platform.api_key = env(var).filter(|v| !v.is_empty()).map(Credential::new);
    }
  }
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Orchestrator validation
  anyhow::ensure!(
    config.orchestrator.fanout_timeout_ms > 0,
    "orchestrator.fanout_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.orchestrator.confirmation_poll_ms > 0,
    "orchestrator.confirmation_poll_ms must be positive"
  );
  anyhow::ensure!(
    config.orchestrator.confirmation_timeout_secs > 0,
    "orchestrator.confirmation_timeout_secs must be positive"
  );

  // HTTP validation
  anyhow::ensure!(
    config.http.max_concurrent > 0,
    "http.max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.http.requests_per_second > 0,
    "http.requests_per_second must be positive"
  );
  anyhow::ensure!(
    config.http.max_retries <= MAX_HTTP_RETRIES,
    "http.max_retries must be at most {MAX_HTTP_RETRIES}"
  );

  // Blockchain validation
  let mut chains = HashMap::new();
  for chain in &config.blockchains {
    anyhow::ensure!(!chain.name.is_empty(), "Blockchain with empty name");
    anyhow::ensure!(
      chains.insert(chain.name.as_str(), chain.family).is_none(),
      "Blockchain `{}` configured twice",
      chain.name
    );
    if chain.family != ChainFamily::Simulated {
      anyhow::ensure!(
        chain.rpc_url.as_deref().is_some_and(|u| !u.is_empty()),
        "Blockchain `{}` has no rpc_url and no default is known",
        chain.name
      );
    }
    for seed in &chain.balances {
      anyhow::ensure!(
        chain.family == ChainFamily::Simulated,
        "Blockchain `{}` seeds balances but is not simulated",
        chain.name
      );
      anyhow::ensure!(
        !seed.address.trim().is_empty() && seed.amount >= rust_decimal::Decimal::ZERO,
        "Blockchain `{}` has an invalid seed balance for `{}`",
        chain.name,
        seed.address
      );
    }
    if chain.family == ChainFamily::Evm {
      anyhow::ensure!(
        chain.required_confirmations > 0,
        "Blockchain `{}` required_confirmations must be at least 1",
        chain.name
      );
    }
  }

  // Platform validation
  let mut platforms = HashSet::new();
  for platform in &config.platforms {
    anyhow::ensure!(!platform.name.is_empty(), "Platform with empty name");
    anyhow::ensure!(
      platforms.insert(platform.name.as_str()),
      "Platform `{}` configured twice",
      platform.name
    );
    anyhow::ensure!(
      !platform.blockchains.is_empty(),
      "Platform `{}` lists no blockchains",
      platform.name
    );
    for chain in &platform.blockchains {
      let family = chains.get(chain.as_str()).copied();
      anyhow::ensure!(
        family.is_some(),
        "Platform `{}` references unknown blockchain `{}`",
        platform.name,
        chain
      );
      // Paper settlements are JSON payloads only the simulated ledger accepts.
      anyhow::ensure!(
        platform.kind != PlatformKind::Paper || family == Some(ChainFamily::Simulated),
        "Paper platform `{}` can only settle on simulated chains, `{}` is not",
        platform.name,
        chain
      );
    }
    if platform.kind == PlatformKind::Paper {
      anyhow::ensure!(
        platform.fixture.is_some(),
        "Paper platform `{}` needs a fixture path",
        platform.name
      );
      anyhow::ensure!(
        platform
          .owner_address
          .as_deref()
          .is_some_and(|a| !a.trim().is_empty()),
        "Paper platform `{}` needs an owner_address",
        platform.name
      );
    }
  }

  Ok(())
}
