//! # Solana Provider
//!
//! Payment verification against the Solana JSON-RPC API. Supports native
//! SOL transfers and USDC (SPL token) transfers, linked to deals by memo.
//!
//! ## Security Properties
//!
//! - Only `finalized` commitment is consulted; re-orgs are negligible there
//! - SPL transfers must land on the derived associated token account, so a
//!   payment to an attacker-chosen account never verifies
//! - Amount matching uses the shared relative tolerance

use async_trait::async_trait;
use aura_types::{CryptoCurrency, PaymentProof};
use chrono::{DateTime, Utc};
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ports::{amount_matches, CryptoProvider, ProviderError};

/// Commitment level consulted for verification.
pub const FINALIZED_COMMITMENT: &str = "finalized";

/// SPL token program id.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Associated token account program id.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Deadline for chain RPC calls.
pub const RPC_DEADLINE: Duration = Duration::from_secs(30);

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;
const USDC_DECIMALS: f64 = 1_000_000.0;
const SIGNATURE_FETCH_LIMIT: usize = 100;

/// Solana payment verification provider.
pub struct SolanaProvider {
    client: reqwest::Client,
    rpc_url: String,
    network: String,
    wallet_address: String,
    usdc_token_account: String,
}

impl SolanaProvider {
    /// Build from a base58 private key and chain endpoints.
    ///
    /// Accepts either a 64-byte keypair encoding (secret ‖ public) or a
    /// 32-byte seed. The USDC associated token account is derived here so
    /// verification can insist on the exact destination.
    pub fn new(
        private_key_base58: &str,
        rpc_url: &str,
        network: &str,
        usdc_mint: &str,
    ) -> Result<Self, ProviderError> {
        let key_bytes = bs58::decode(private_key_base58)
            .into_vec()
            .map_err(|e| ProviderError::Config(format!("private key not base58: {e}")))?;
        let seed: [u8; 32] = match key_bytes.len() {
            64 => key_bytes[..32]
                .try_into()
                .map_err(|_| ProviderError::Config("keypair truncated".to_string()))?,
            32 => key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| ProviderError::Config("seed truncated".to_string()))?,
            n => {
                return Err(ProviderError::Config(format!(
                    "private key must be 32 or 64 bytes, got {n}"
                )))
            }
        };
        let signing_key = SigningKey::from_bytes(&seed);
        let owner = signing_key.verifying_key().to_bytes();
        let wallet_address = bs58::encode(owner).into_string();

        let mint = decode_pubkey(usdc_mint)
            .map_err(|e| ProviderError::Config(format!("usdc mint invalid: {e}")))?;
        let token_program = decode_pubkey(TOKEN_PROGRAM_ID)
            .map_err(|e| ProviderError::Config(e))?;
        let ata_program = decode_pubkey(ASSOCIATED_TOKEN_PROGRAM_ID)
            .map_err(|e| ProviderError::Config(e))?;
        let (ata, _bump) = find_program_address(&[&owner, &token_program, &mint], &ata_program)
            .ok_or_else(|| ProviderError::Config("no valid ATA bump found".to_string()))?;
        let usdc_token_account = bs58::encode(ata).into_string();

        info!(
            event = "solana_provider_initialized",
            wallet = %wallet_address,
            usdc_token_account = %usdc_token_account,
            network,
            "provider ready"
        );

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(RPC_DEADLINE)
                .build()
                .unwrap_or_default(),
            rpc_url: rpc_url.to_string(),
            network: network.to_string(),
            wallet_address,
            usdc_token_account,
        })
    }

    /// The derived USDC associated token account address.
    pub fn usdc_token_account(&self) -> &str {
        &self.usdc_token_account
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        if let Some(err) = body.get("error") {
            return Err(ProviderError::Rpc(err.to_string()));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn recent_signatures(&self) -> Result<Vec<String>, ProviderError> {
        let result = self
            .rpc(
                "getSignaturesForAddress",
                json!([
                    self.wallet_address,
                    {"limit": SIGNATURE_FETCH_LIMIT, "commitment": FINALIZED_COMMITMENT},
                ]),
            )
            .await?;
        Ok(result
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("signature").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<Value>, ProviderError> {
        let result = self
            .rpc(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "jsonParsed",
                        "commitment": FINALIZED_COMMITMENT,
                        "maxSupportedTransactionVersion": 0,
                    },
                ]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(result))
    }

    fn matching_transfer(
        &self,
        tx: &Value,
        expected_amount: f64,
        currency: CryptoCurrency,
    ) -> Option<String> {
        match currency {
            CryptoCurrency::Sol => self.sol_transfer_from(tx, expected_amount),
            CryptoCurrency::Usdc => self.usdc_transfer_from(tx, expected_amount),
        }
    }

    /// SOL: compare our balance delta; sender is the signer with the
    /// largest balance decrease among the other accounts.
    fn sol_transfer_from(&self, tx: &Value, expected_amount: f64) -> Option<String> {
        let pre = tx.pointer("/meta/preBalances")?.as_array()?;
        let post = tx.pointer("/meta/postBalances")?.as_array()?;
        let keys = tx.pointer("/transaction/message/accountKeys")?.as_array()?;

        let mut our_idx = None;
        for (idx, key) in keys.iter().enumerate() {
            if account_key(key) == Some(self.wallet_address.as_str()) {
                let received =
                    (post.get(idx)?.as_i64()? - pre.get(idx)?.as_i64()?) as f64 / LAMPORTS_PER_SOL;
                if amount_matches(expected_amount, received) {
                    our_idx = Some(idx);
                }
                break;
            }
        }
        let our_idx = our_idx?;

        let mut sender = String::new();
        let mut max_decrease = 0i64;
        for (idx, key) in keys.iter().enumerate() {
            if idx == our_idx {
                continue;
            }
            let decrease = pre.get(idx).and_then(Value::as_i64).unwrap_or(0)
                - post.get(idx).and_then(Value::as_i64).unwrap_or(0);
            if decrease > max_decrease {
                max_decrease = decrease;
                sender = account_key(key).unwrap_or_default().to_string();
            }
        }
        Some(sender)
    }

    /// USDC: an spl-token transfer instruction whose destination is our
    /// derived associated token account.
    fn usdc_transfer_from(&self, tx: &Value, expected_amount: f64) -> Option<String> {
        let instructions = tx
            .pointer("/transaction/message/instructions")?
            .as_array()?;
        for instr in instructions {
            if instr.get("program").and_then(Value::as_str) != Some("spl-token") {
                continue;
            }
            if instr.pointer("/parsed/type").and_then(Value::as_str) != Some("transfer") {
                continue;
            }
            let info = instr.pointer("/parsed/info")?;
            // The destination check is what stops payments routed to an
            // attacker-owned token account from verifying.
            if info.get("destination").and_then(Value::as_str)
                != Some(self.usdc_token_account.as_str())
            {
                continue;
            }
            let raw_amount = info.get("amount").and_then(Value::as_str)?;
            let received = raw_amount.parse::<f64>().ok()? / USDC_DECIMALS;
            if !amount_matches(expected_amount, received) {
                continue;
            }
            let source = info.get("source").and_then(Value::as_str).unwrap_or("");
            let authority = info
                .get("authority")
                .and_then(Value::as_str)
                .unwrap_or(source);
            return Some(authority.to_string());
        }
        None
    }

    fn extract_proof(tx: &Value, signature: &str, from_address: String) -> PaymentProof {
        let block_time = tx.get("blockTime").and_then(Value::as_i64).unwrap_or(0);
        let slot = tx.get("slot").and_then(Value::as_u64).unwrap_or(0);
        let confirmed_at = DateTime::<Utc>::from_timestamp(block_time, 0).unwrap_or_else(Utc::now);
        PaymentProof {
            tx_hash: signature.to_string(),
            block: slot.to_string(),
            from_address: if from_address.is_empty() {
                "unknown".to_string()
            } else {
                from_address
            },
            confirmed_at,
        }
    }
}

#[async_trait]
impl CryptoProvider for SolanaProvider {
    fn address(&self) -> String {
        self.wallet_address.clone()
    }

    fn network(&self) -> String {
        self.network.clone()
    }

    #[tracing::instrument(name = "crypto_provider_verify_payment", skip(self), fields(currency = %currency))]
    async fn verify_payment(
        &self,
        amount: f64,
        memo: &str,
        currency: CryptoCurrency,
    ) -> Result<Option<PaymentProof>, ProviderError> {
        let signatures = self.recent_signatures().await?;
        if signatures.is_empty() {
            debug!(event = "no_recent_transactions", "nothing to scan");
            return Ok(None);
        }

        for signature in &signatures {
            let Some(tx) = self.transaction(signature).await? else {
                continue;
            };
            if !has_memo(&tx, memo) {
                continue;
            }
            if let Some(from_address) = self.matching_transfer(&tx, amount, currency) {
                info!(
                    event = "payment_verified_on_chain",
                    tx_hash = %signature,
                    "matching finalized transfer found"
                );
                return Ok(Some(Self::extract_proof(&tx, signature, from_address)));
            }
        }

        warn!(event = "payment_not_found", "no matching payment in recent history");
        Ok(None)
    }
}

/// Exact-match memo instruction scan.
fn has_memo(tx: &Value, expected_memo: &str) -> bool {
    tx.pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
        .map(|instructions| {
            instructions.iter().any(|instr| {
                instr.get("program").and_then(Value::as_str) == Some("spl-memo")
                    && instr.get("parsed").and_then(Value::as_str) == Some(expected_memo)
            })
        })
        .unwrap_or(false)
}

fn account_key(entry: &Value) -> Option<&str> {
    entry
        .as_str()
        .or_else(|| entry.get("pubkey").and_then(Value::as_str))
}

fn decode_pubkey(address: &str) -> Result<[u8; 32], String> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| format!("address not base58: {e}"))?;
    bytes
        .try_into()
        .map_err(|_| format!("address '{address}' is not 32 bytes"))
}

/// Derive a program address: seeds ‖ bump ‖ program id ‖ marker hashed
/// until the result is off the Ed25519 curve.
fn find_program_address(seeds: &[&[u8]], program_id: &[u8; 32]) -> Option<([u8; 32], u8)> {
    for bump in (0..=255u8).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id);
        hasher.update(b"ProgramDerivedAddress");
        let hash: [u8; 32] = hasher.finalize().into();
        if !is_on_curve(&hash) {
            return Some((hash, bump));
        }
    }
    None
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}
