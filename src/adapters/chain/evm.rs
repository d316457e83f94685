//! EVM Chain Connector - alloy-rs 0.9 Account/Nonce Chains
//!
//! One connector type serves Ethereum, Polygon and BNB Chain; only
//! the RPC endpoint and expected chain id differ. The chain id is
//! validated at connect so a mislabelled endpoint never settles a
//! trade on the wrong network.
//!
//! Finality: a receipt with status 1 whose inclusion block is at
//! least `required_confirmations` deep.
//!
//! In alloy 0.9, `ProviderBuilder::new().on_http()` returns a complex
//! filler type. We store it as a type-erased `dyn Provider`.

use std::sync::Arc;

use alloy::network::ReceiptResponse;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::{RpcError, TransportError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::config::{BlockchainConfig, Credential};
use crate::domain::units::{from_atomic_units, EVM_NATIVE_DECIMALS};
use crate::domain::{ConfirmationStatus, SignedTransaction, TradingError, TradingResult, TransactionRef};
use crate::ports::BlockchainConnector;

/// Settings for one EVM chain.
#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    /// Registry name ("ethereum", "polygon", "bnb").
    pub name: String,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Expected chain id; `None` skips the check.
    pub chain_id: Option<u64>,
    /// Blocks (inclusion block counted) before a receipt is final.
    pub required_confirmations: u64,
    /// Signing key, only used to report the wallet address.
    pub private_key: Option<Credential>,
}

impl EvmChainConfig {
    pub fn from_config(config: &BlockchainConfig) -> Result<Self> {
        let rpc_url = config
            .rpc_url
            .clone()
            .with_context(|| format!("Blockchain `{}` has no rpc_url", config.name))?;
        Ok(Self {
            name: config.name.clone(),
            rpc_url,
            chain_id: config.chain_id,
            required_confirmations: config.required_confirmations.max(1),
            private_key: config.private_key.clone(),
        })
    }
}

/// Blockchain connector for EVM networks backed by alloy-rs 0.9.
pub struct EvmChain {
    name: String,
    /// The alloy HTTP provider (type-erased).
    provider: Arc<dyn Provider + Send + Sync>,
    required_confirmations: u64,
    /// Wallet derived from the configured key, if any.
    wallet: Option<Address>,
}

impl EvmChain {
    /// Connect to the RPC endpoint and validate the chain id.
    #[instrument(skip_all, fields(chain = %config.name))]
    pub async fn connect(config: EvmChainConfig) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .on_http(config.rpc_url.parse().context("Invalid RPC URL")?);
        // Boxing erases the HTTP transport so the provider fits `dyn Provider`.
        let provider: Arc<dyn Provider + Send + Sync> = Arc::new(provider.boxed());

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if let Some(expected) = config.chain_id {
            anyhow::ensure!(
                chain_id == expected,
                "Expected {} (chain_id={expected}), got {chain_id}",
                config.name
            );
        }

        let wallet = match &config.private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .expose()
                    .parse()
                    .with_context(|| format!("Invalid private key for {}", config.name))?;
                info!(chain_id, address = %signer.address(), "Connected with wallet");
                Some(signer.address())
            }
            None => {
                info!(chain_id, "Connected without wallet (read-only mode)");
                None
            }
        };

        Ok(Self {
            name: config.name,
            provider,
            required_confirmations: config.required_confirmations,
            wallet,
        })
    }

    /// Address of the configured wallet, if a key was provided.
    pub const fn wallet(&self) -> Option<Address> {
        self.wallet
    }

    fn rpc_error(&self, e: TransportError) -> TradingError {
        match e {
            RpcError::ErrorResp(payload) => TradingError::invalid_input(format!(
                "{} rejected request: {}",
                self.name, payload.message
            )),
            other => TradingError::upstream(self.name.clone(), other),
        }
    }

    /// `eth_call` against `to` and return the raw 32-byte word.
    async fn call_word(&self, to: Address, calldata: Vec<u8>) -> TradingResult<U256> {
        let request = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(calldata).into());
        let result = self
            .provider
            .call(&request)
            .await
            .map_err(|e| self.rpc_error(e))?;
        if result.len() < 32 {
            return Err(TradingError::malformed(
                self.name.clone(),
                format!("call to {to} returned {} bytes", result.len()),
            ));
        }
        Ok(U256::from_be_slice(&result[..32]))
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> TradingResult<Decimal> {
        let mut owner_word = [0u8; 32];
        owner_word[12..].copy_from_slice(owner.as_slice());
        let balance_calldata = [&keccak256(b"balanceOf(address)")[..4], &owner_word[..]].concat();
        let decimals_calldata = keccak256(b"decimals()")[..4].to_vec();

        let raw = self.call_word(token, balance_calldata).await?;
        let decimals = self.call_word(token, decimals_calldata).await?;

        let decimals = u32::try_from(decimals)
            .map_err(|_| TradingError::malformed(self.name.clone(), "token decimals out of range"))?;
        let raw = u128::try_from(raw)
            .map_err(|_| TradingError::malformed(self.name.clone(), "token balance out of range"))?;
        from_atomic_units(raw, decimals)
    }
}

fn parse_address(raw: &str) -> TradingResult<Address> {
    raw.trim()
        .parse()
        .map_err(|_| TradingError::invalid_input(format!("invalid EVM address `{raw}`")))
}

fn parse_tx_hash(tx: &TransactionRef) -> TradingResult<B256> {
    tx.as_str()
        .parse()
        .map_err(|_| TradingError::invalid_input(format!("invalid transaction hash `{tx}`")))
}

#[async_trait]
impl BlockchainConnector for EvmChain {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(chain = %self.name))]
    async fn get_balance(&self, address: &str, token: Option<&str>) -> TradingResult<Decimal> {
        let owner = parse_address(address)?;
        match token {
            Some(token) => self.erc20_balance(parse_address(token)?, owner).await,
            None => {
                let wei = self
                    .provider
                    .get_balance(owner)
                    .await
                    .map_err(|e| self.rpc_error(e))?;
                let wei = u128::try_from(wei)
                    .map_err(|_| TradingError::malformed(self.name.clone(), "balance out of range"))?;
                from_atomic_units(wei, EVM_NATIVE_DECIMALS)
            }
        }
    }

    #[instrument(skip(self, tx), fields(chain = %self.name, bytes = tx.len()))]
    async fn submit_transaction(&self, tx: &SignedTransaction) -> TradingResult<TransactionRef> {
        if tx.is_empty() {
            return Err(TradingError::invalid_input("empty signed transaction"));
        }
        let pending = self
            .provider
            .send_raw_transaction(tx.as_bytes())
            .await
            .map_err(|e| self.rpc_error(e))?;
        let hash = *pending.tx_hash();
        info!(tx = %hash, "Transaction broadcast");
        Ok(TransactionRef::new(hash.to_string()))
    }

    #[instrument(skip(self, tx), fields(chain = %self.name, tx = %tx))]
    async fn confirm(&self, tx: &TransactionRef) -> TradingResult<ConfirmationStatus> {
        let hash = parse_tx_hash(tx)?;
        let Some(receipt) = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| self.rpc_error(e))?
        else {
            return Ok(ConfirmationStatus::Pending);
        };

        if !receipt.status() {
            return Ok(ConfirmationStatus::Failed {
                reason: "transaction reverted".to_string(),
            });
        }

        let Some(included) = receipt.block_number() else {
            return Ok(ConfirmationStatus::Pending);
        };
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| self.rpc_error(e))?;
        let depth = head.saturating_sub(included) + 1;
        debug!(included, head, depth, required = self.required_confirmations, "Receipt found");

        if depth >= self.required_confirmations {
            Ok(ConfirmationStatus::Confirmed)
        } else {
            Ok(ConfirmationStatus::Pending)
        }
    }

    async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parsing() {
        assert!(parse_address("0x0000000000000000000000000000000000000001").is_ok());
        assert!(matches!(
            parse_address("not-an-address"),
            Err(TradingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tx_hash_parsing() {
        let good = TransactionRef::new(format!("0x{}", "ab".repeat(32)));
        assert!(parse_tx_hash(&good).is_ok());
        assert!(parse_tx_hash(&TransactionRef::new("0x1234")).is_err());
    }
}
