//! Solana Chain Connector - JSON-RPC over reqwest
//!
//! Signature/lookup chain: there is no nonce to track, a submitted
//! transaction is identified by its base58 signature and finality is
//! read from `getSignatureStatuses` at the configured commitment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::config::{BlockchainConfig, Commitment};
use crate::domain::units::{from_atomic_units, SOLANA_NATIVE_DECIMALS};
use crate::domain::{ConfirmationStatus, SignedTransaction, TradingError, TradingResult, TransactionRef};
use crate::ports::BlockchainConnector;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most read methods.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

/// Blockchain connector for Solana.
pub struct SolanaChain {
    name: String,
    http: Client,
    rpc_url: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

impl SolanaChain {
    /// Build the client and check the node answers `getVersion`.
    #[instrument(skip_all, fields(chain = %config.name))]
    pub async fn connect(config: &BlockchainConfig, timeout: Duration) -> Result<Self> {
        let rpc_url = config
            .rpc_url
            .clone()
            .with_context(|| format!("Blockchain `{}` has no rpc_url", config.name))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let chain = Self {
            name: config.name.clone(),
            http,
            rpc_url,
            commitment: config.commitment,
            next_id: AtomicU64::new(1),
        };

        let version: Value = chain
            .rpc("getVersion", json!([]))
            .await
            .context("Solana node did not answer getVersion")?;
        let core = version
            .get("solana-core")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(
            version = core,
            commitment = chain.commitment.as_str(),
            signer = config.private_key.is_some(),
            "Connected to Solana RPC"
        );
        Ok(chain)
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> TradingResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TradingError::upstream(self.name.clone(), e))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(TradingError::RateLimited {
                    source_name: self.name.clone(),
                    retry_after: None,
                });
            }
            status if !status.is_success() => {
                return Err(TradingError::upstream(
                    self.name.clone(),
                    format!("{method} returned HTTP {status}"),
                ));
            }
            _ => {}
        }

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| TradingError::malformed(self.name.clone(), e))?;

        if let Some(error) = envelope.error {
            debug!(method, code = error.code, message = %error.message, "RPC error");
            return Err(TradingError::invalid_input(format!(
                "{} rejected {method}: {} ({})",
                self.name, error.message, error.code
            )));
        }
        envelope
            .result
            .ok_or_else(|| TradingError::malformed(self.name.clone(), format!("{method} returned no result")))
    }
}

/// Light syntactic check for base58 account keys.
fn validate_pubkey(raw: &str) -> TradingResult<&str> {
    let raw = raw.trim();
    let valid_len = (32..=44).contains(&raw.len());
    if !valid_len || !raw.chars().all(|c| BASE58_ALPHABET.contains(c)) {
        return Err(TradingError::invalid_input(format!("invalid Solana address `{raw}`")));
    }
    Ok(raw)
}

/// Sum the raw amounts of jsonParsed SPL token accounts.
fn sum_token_accounts(source: &str, accounts: &[Value]) -> TradingResult<Decimal> {
    let mut raw_total: u128 = 0;
    let mut decimals: Option<u32> = None;
    for account in accounts {
        let amount = account
            .pointer("/account/data/parsed/info/tokenAmount")
            .ok_or_else(|| TradingError::malformed(source, "token account without tokenAmount"))?;
        let raw = amount
            .get("amount")
            .and_then(Value::as_str)
            .and_then(|a| a.parse::<u128>().ok())
            .ok_or_else(|| TradingError::malformed(source, "unparseable token amount"))?;
        let account_decimals = amount
            .get("decimals")
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok())
            .ok_or_else(|| TradingError::malformed(source, "token amount without decimals"))?;
        decimals = Some(account_decimals);
        raw_total = raw_total
            .checked_add(raw)
            .ok_or_else(|| TradingError::malformed(source, "token balance overflow"))?;
    }
    match decimals {
        Some(d) => from_atomic_units(raw_total, d),
        None => Ok(Decimal::ZERO),
    }
}

/// Whether a reported confirmation level satisfies `commitment`.
fn meets_commitment(reported: &str, commitment: Commitment) -> bool {
    match commitment {
        Commitment::Confirmed => matches!(reported, "confirmed" | "finalized"),
        Commitment::Finalized => reported == "finalized",
    }
}

#[async_trait]
impl BlockchainConnector for SolanaChain {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(chain = %self.name))]
    async fn get_balance(&self, address: &str, token: Option<&str>) -> TradingResult<Decimal> {
        let owner = validate_pubkey(address)?;
        let commitment = json!({ "commitment": self.commitment.as_str() });
        match token {
            None => {
                let lamports: WithContext<u64> =
                    self.rpc("getBalance", json!([owner, commitment])).await?;
                from_atomic_units(u128::from(lamports.value), SOLANA_NATIVE_DECIMALS)
            }
            Some(mint) => {
                let mint = validate_pubkey(mint)?;
                let accounts: WithContext<Vec<Value>> = self
                    .rpc(
                        "getTokenAccountsByOwner",
                        json!([
                            owner,
                            { "mint": mint },
                            { "encoding": "jsonParsed", "commitment": self.commitment.as_str() }
                        ]),
                    )
                    .await?;
                sum_token_accounts(&self.name, &accounts.value)
            }
        }
    }

    #[instrument(skip(self, tx), fields(chain = %self.name, bytes = tx.len()))]
    async fn submit_transaction(&self, tx: &SignedTransaction) -> TradingResult<TransactionRef> {
        if tx.is_empty() {
            return Err(TradingError::invalid_input("empty signed transaction"));
        }
        let encoded = BASE64.encode(tx.as_bytes());
        let signature: String = self
            .rpc(
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "preflightCommitment": self.commitment.as_str() }]),
            )
            .await?;
        info!(signature = %signature, "Transaction broadcast");
        Ok(TransactionRef::new(signature))
    }

    #[instrument(skip(self, tx), fields(chain = %self.name, tx = %tx))]
    async fn confirm(&self, tx: &TransactionRef) -> TradingResult<ConfirmationStatus> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .rpc(
                "getSignatureStatuses",
                json!([[tx.as_str()], { "searchTransactionHistory": true }]),
            )
            .await?;

        let Some(Some(status)) = statuses.value.into_iter().next() else {
            return Ok(ConfirmationStatus::Pending);
        };
        if let Some(err) = status.err {
            return Ok(ConfirmationStatus::Failed {
                reason: err.to_string(),
            });
        }
        match status.confirmation_status.as_deref() {
            Some(level) if meets_commitment(level, self.commitment) => Ok(ConfirmationStatus::Confirmed),
            _ => Ok(ConfirmationStatus::Pending),
        }
    }

    async fn is_healthy(&self) -> bool {
        self.rpc::<Value>("getHealth", json!([])).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pubkey_validation() {
        assert!(validate_pubkey("So11111111111111111111111111111111111111112").is_ok());
        assert!(validate_pubkey("0xabc").is_err());
        // '0' and 'O' are not in the base58 alphabet.
        assert!(validate_pubkey("O0111111111111111111111111111111111111111").is_err());
    }

    #[test]
    fn test_commitment_levels() {
        assert!(meets_commitment("finalized", Commitment::Confirmed));
        assert!(meets_commitment("confirmed", Commitment::Confirmed));
        assert!(!meets_commitment("confirmed", Commitment::Finalized));
        assert!(!meets_commitment("processed", Commitment::Confirmed));
    }

    #[test]
    fn test_token_accounts_are_summed() {
        let account = |amount: &str| {
            json!({
                "account": { "data": { "parsed": { "info": {
                    "tokenAmount": { "amount": amount, "decimals": 6 }
                }}}}
            })
        };
        let total = sum_token_accounts("solana", &[account("1500000"), account("250000")]).unwrap();
        assert_eq!(total, dec!(1.75));
        assert_eq!(sum_token_accounts("solana", &[]).unwrap(), Decimal::ZERO);
    }
}
