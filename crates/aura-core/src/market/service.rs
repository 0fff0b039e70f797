//! # Market Service
//!
//! Owns the locked-deal lifecycle: creation with a unique memo, idempotent
//! payment resolution under the row lock, and secret revelation. No other
//! component touches a [`LockedDeal`] directly.

use aura_crypto::{generate_memo, SecretBox};
use aura_telemetry::{DEALS_CREATED, PAYMENTS_VERIFIED};
use aura_types::{
    CryptoCurrency, DealStatus, LockedDeal, LockedDealParams, PaymentInstructions, PaymentProof,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::ports::{CryptoProvider, DealStore};
use super::MarketError;

/// Attempts at minting a unique memo before giving up.
const MEMO_RETRIES: usize = 5;

/// Request to lock a secret behind a payment.
#[derive(Clone, Debug)]
pub struct CreateOffer {
    /// Negotiated item id.
    pub item_id: String,
    /// Item display name.
    pub item_name: String,
    /// The plaintext secret to lock (reservation code).
    pub secret: String,
    /// Final agreed price in USD.
    pub final_price_usd: f64,
    /// Amount due in native currency units.
    pub crypto_amount: f64,
    /// Settlement currency.
    pub currency: CryptoCurrency,
    /// Buyer DID, when known.
    pub buyer_did: Option<String>,
    /// Lock TTL in seconds.
    pub ttl_seconds: u64,
}

/// Decrypted secret revealed after payment.
#[derive(Clone, Debug, PartialEq)]
pub struct RevealedSecret {
    /// The reservation code.
    pub reservation_code: String,
    /// Item display name.
    pub item_name: String,
    /// Final agreed price in USD.
    pub final_price: f64,
    /// Unix seconds of payment confirmation.
    pub paid_at: i64,
}

/// Outcome of a `check_status` resolution.
#[derive(Clone, Debug)]
pub enum DealResolution {
    /// No such deal.
    NotFound,
    /// TTL elapsed before payment; terminal.
    Expired,
    /// Still awaiting payment.
    Pending {
        /// Current payment instructions.
        instructions: PaymentInstructions,
    },
    /// Payment confirmed; terminal.
    Paid {
        /// The revealed secret.
        secret: RevealedSecret,
        /// Cached on-chain proof.
        proof: PaymentProof,
    },
}

/// Service managing crypto-locked deals.
pub struct MarketService {
    provider: Arc<dyn CryptoProvider>,
    store: Arc<dyn DealStore>,
    secrets: SecretBox,
}

impl MarketService {
    /// Wire the market against its provider, store, and sealing key.
    pub fn new(provider: Arc<dyn CryptoProvider>, store: Arc<dyn DealStore>, secrets: SecretBox) -> Self {
        Self {
            provider,
            store,
            secrets,
        }
    }

    /// Create a locked deal and return payment instructions.
    ///
    /// Memo collisions (unique index) are retried with a fresh memo.
    #[tracing::instrument(name = "market_create_offer", skip_all, fields(item_id = %offer.item_id))]
    pub async fn create_offer(&self, offer: CreateOffer) -> Result<PaymentInstructions, MarketError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(offer.ttl_seconds as i64);
        let secret_ciphertext = self.secrets.seal(&offer.secret);

        for _attempt in 0..MEMO_RETRIES {
            let memo = generate_memo();
            let deal = LockedDeal::new(LockedDealParams {
                item_id: offer.item_id.clone(),
                item_name: offer.item_name.clone(),
                final_price: offer.final_price_usd,
                currency: offer.currency,
                crypto_amount: offer.crypto_amount,
                payment_memo: memo,
                secret_ciphertext: secret_ciphertext.clone(),
                buyer_did: offer.buyer_did.clone(),
                created_at: now,
                expires_at,
            });

            match self.store.insert(deal.clone()).await {
                Ok(()) => {
                    DEALS_CREATED
                        .with_label_values(&[offer.currency.as_str()])
                        .inc();
                    info!(
                        event = "deal_created",
                        deal_id = %deal.id,
                        memo = %deal.payment_memo,
                        amount = deal.crypto_amount,
                        currency = %deal.currency,
                        expires_at = %deal.expires_at,
                        "locked deal persisted"
                    );
                    return Ok(deal
                        .instructions(&self.provider.address(), &self.provider.network()));
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(event = "memo_collision_retrying", "regenerating memo");
                    continue;
                }
                Err(e) => return Err(MarketError::Store(e)),
            }
        }
        Err(MarketError::MemoExhausted(MEMO_RETRIES))
    }

    /// Idempotent payment resolver.
    ///
    /// The row lock serializes concurrent calls: the first finalizer wins
    /// and later callers observe the cached terminal state. A PAID deal is
    /// never re-verified on-chain.
    #[tracing::instrument(name = "market_check_status", skip(self), fields(deal_id = %deal_id))]
    pub async fn check_status(&self, deal_id: Uuid) -> Result<DealResolution, MarketError> {
        let Some(lease) = self.store.acquire(deal_id).await? else {
            info!(event = "deal_not_found", "no such deal");
            return Ok(DealResolution::NotFound);
        };

        let mut deal = lease.deal().clone();
        let now = Utc::now();

        // Expiry wins over verification for pending deals.
        if deal.status == DealStatus::Pending && deal.is_expired(now) {
            deal.mark_expired(now);
            lease.commit(deal).await?;
            info!(event = "deal_expired", "pending deal expired");
            return Ok(DealResolution::Expired);
        }

        match deal.status {
            DealStatus::Expired => {
                lease.release().await?;
                Ok(DealResolution::Expired)
            }
            DealStatus::Paid => {
                // Idempotent: cached proof, no on-chain call.
                lease.release().await?;
                info!(event = "deal_already_paid", "serving cached result");
                self.paid_resolution(&deal)
            }
            DealStatus::Pending => {
                let verification = self
                    .provider
                    .verify_payment(deal.crypto_amount, &deal.payment_memo, deal.currency)
                    .await;

                match verification {
                    Ok(Some(proof)) => {
                        deal.mark_paid(&proof, now);
                        PAYMENTS_VERIFIED
                            .with_label_values(&[deal.currency.as_str()])
                            .inc();
                        let resolution = self.paid_resolution(&deal)?;
                        lease.commit(deal).await?;
                        info!(event = "payment_verified", tx_hash = %proof.tx_hash, "deal settled");
                        Ok(resolution)
                    }
                    Ok(None) => {
                        let instructions = deal
                            .instructions(&self.provider.address(), &self.provider.network());
                        lease.release().await?;
                        info!(event = "payment_pending", "no matching payment yet");
                        Ok(DealResolution::Pending { instructions })
                    }
                    Err(e) => {
                        // On-chain failure is treated as payment-not-found.
                        warn!(event = "on_chain_verification_failed", error = %e, "treating as pending");
                        let instructions = deal
                            .instructions(&self.provider.address(), &self.provider.network());
                        lease.release().await?;
                        Ok(DealResolution::Pending { instructions })
                    }
                }
            }
        }
    }

    fn paid_resolution(&self, deal: &LockedDeal) -> Result<DealResolution, MarketError> {
        let reservation_code = self
            .secrets
            .open(&deal.secret_ciphertext)
            .map_err(|_| MarketError::SecretUnseal)?;
        let proof = deal.proof().ok_or(MarketError::SecretUnseal)?;
        Ok(DealResolution::Paid {
            secret: RevealedSecret {
                reservation_code,
                item_name: deal.item_name.clone(),
                final_price: deal.final_price,
                paid_at: deal.paid_at.map(|t| t.timestamp()).unwrap_or_default(),
            },
            proof,
        })
    }
}
