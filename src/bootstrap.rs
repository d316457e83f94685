//! Bootstrap - Composition Root
//!
//! Turns an `AppConfig` into a ready `Orchestrator`: connects every
//! configured chain, builds each venue connector on the first chain of
//! its preference list that came up, and registers venues in config
//! order. A chain that fails to connect is logged and skipped along
//! with any venue left without a chain.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::adapters::api::{HedgehogConnector, HttpClient, HttpClientConfig};
use crate::adapters::chain::{EvmChain, EvmChainConfig, SimulatedChain, SolanaChain};
use crate::adapters::paper::{PaperConnector, PaperFixture};
use crate::config::loader::HEDGEHOG_API_URL;
use crate::config::{AppConfig, BlockchainConfig, ChainFamily, HttpConfig, PlatformConfig, PlatformKind};
use crate::ports::{BlockchainConnector, MarketConnector, OrchestratorTelemetry};
use crate::usecases::{ConfirmationPolicy, Orchestrator};

/// Chains keyed by configured name, in config order.
pub type ChainRegistry = IndexMap<String, Arc<dyn BlockchainConnector>>;

/// Everything the binary needs after startup.
pub struct Bootstrapped {
  pub orchestrator: Orchestrator,
  pub chains: ChainRegistry,
  /// Platforms left unregistered, with the reason.
  pub skipped: Vec<(String, String)>,
}

/// Connect one chain according to its family.
pub async fn connect_chain(
  config: &BlockchainConfig,
  http: &HttpConfig,
) -> Result<Arc<dyn BlockchainConnector>> {
  let chain: Arc<dyn BlockchainConnector> = match config.family {
    ChainFamily::Evm => Arc::new(EvmChain::connect(EvmChainConfig::from_config(config)?).await?),
    ChainFamily::Solana => {
      Arc::new(SolanaChain::connect(config, std::time::Duration::from_secs(http.timeout_seconds)).await?)
    }
    ChainFamily::Simulated => {
      let chain = SimulatedChain::new(config.name.clone(), config.confirm_after_polls);
      for seed in &config.balances {
        chain.credit(&seed.address, seed.token.as_deref(), seed.amount).await;
      }
      Arc::new(chain)
    }
  };
  Ok(chain)
}

/// First chain in `preferences` that is connected.
pub fn select_chain<'a>(
  preferences: &'a [String],
  chains: &ChainRegistry,
) -> Option<(&'a str, Arc<dyn BlockchainConnector>)> {
  preferences
    .iter()
    .find_map(|name| chains.get(name).map(|chain| (name.as_str(), Arc::clone(chain))))
}

/// Build the market connector for one venue on `chain`.
pub fn build_connector(
  platform: &PlatformConfig,
  chain: Arc<dyn BlockchainConnector>,
  config: &AppConfig,
) -> Result<Arc<dyn MarketConnector>> {
  let confirmation = ConfirmationPolicy {
    poll_interval: config.orchestrator.poll_interval(),
    timeout: config.orchestrator.confirmation_timeout(),
  };

  let connector: Arc<dyn MarketConnector> = match platform.kind {
    PlatformKind::Hedgehog => {
      let base_url = platform.api_url.as_deref().unwrap_or(HEDGEHOG_API_URL);
      let client = HttpClient::new(
        HttpClientConfig::new(platform.name.clone(), base_url, &config.http)
          .with_api_key(platform.api_key.clone()),
      )?;
      Arc::new(HedgehogConnector::new(
        platform.name.clone(),
        client,
        chain,
        confirmation,
      ))
    }
    PlatformKind::Paper => {
      let Some(path) = &platform.fixture else {
        bail!("Paper platform `{}` has no fixture", platform.name);
      };
      let Some(owner) = &platform.owner_address else {
        bail!("Paper platform `{}` has no owner_address", platform.name);
      };
      let fixture = PaperFixture::load(path)?;
      Arc::new(PaperConnector::new(
        platform.name.clone(),
        owner.clone(),
        fixture,
        chain,
        confirmation,
      )?)
    }
  };
  Ok(connector)
}

/// Connect chains, build venues and assemble the orchestrator.
pub async fn bootstrap(
  config: &AppConfig,
  telemetry: Arc<dyn OrchestratorTelemetry>,
) -> Result<Bootstrapped> {
  let mut chains = ChainRegistry::new();
  for chain_config in &config.blockchains {
    match connect_chain(chain_config, &config.http).await {
      Ok(chain) => {
        info!(chain = %chain_config.name, "Blockchain connected");
        chains.insert(chain_config.name.clone(), chain);
      }
      Err(e) => error!(chain = %chain_config.name, error = %e, "Blockchain connection failed"),
    }
  }

  let mut builder = Orchestrator::builder()
    .fanout_timeout(config.orchestrator.fanout_timeout())
    .telemetry(telemetry);
  let mut skipped = Vec::new();

  for platform in &config.platforms {
    let Some((chain_name, chain)) = select_chain(&platform.blockchains, &chains) else {
      warn!(
        platform = %platform.name,
        preferences = ?platform.blockchains,
        "No connected blockchain, skipping platform"
      );
      skipped.push((platform.name.clone(), "no connected blockchain".to_string()));
      continue;
    };

    match build_connector(platform, chain, config) {
      Ok(connector) => {
        builder = builder
          .register(platform.name.clone(), chain_name, connector)
          .with_context(|| format!("Failed to register platform `{}`", platform.name))?;
        info!(platform = %platform.name, chain = chain_name, "Platform registered");
      }
      Err(e) => {
        error!(platform = %platform.name, error = %e, "Platform initialization failed");
        skipped.push((platform.name.clone(), e.to_string()));
      }
    }
  }

  Ok(Bootstrapped {
    orchestrator: builder.build(),
    chains,
    skipped,
  })
}
