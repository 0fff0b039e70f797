//! # Connector (C)
//!
//! Maps the validated intent into the wire response. In crypto-lock mode
//! an accept additionally creates a locked deal: the plaintext reservation
//! code is cleared from the response and replaced with payment
//! instructions.

use aura_proto::negotiation as pb;
use aura_types::{reason, CryptoCurrency, HiveContext, Intent, IntentAction, Observation};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::market::{CreateOffer, MarketService, PriceConverter};

/// Session tokens are valid for ten minutes.
pub const SESSION_VALIDITY_SECS: u64 = 600;

/// Crypto-lock wiring; present only when `crypto.enabled`.
pub struct CryptoLock {
    /// Market owning the locked deals.
    pub market: Arc<MarketService>,
    /// USD→crypto conversion.
    pub converter: PriceConverter,
    /// Settlement currency.
    pub currency: CryptoCurrency,
    /// Deal TTL in seconds.
    pub ttl_seconds: u64,
}

/// C — maps intents to gRPC responses and external systems.
pub struct HiveConnector {
    crypto: Option<CryptoLock>,
}

impl HiveConnector {
    /// Plain connector (no crypto lock).
    pub fn new() -> Self {
        Self { crypto: None }
    }

    /// Connector with crypto-lock mode enabled.
    pub fn with_crypto(crypto: CryptoLock) -> Self {
        Self {
            crypto: Some(crypto),
        }
    }

    /// Execute the decision and produce the response plus an observation.
    #[tracing::instrument(
        name = "connector_act",
        skip_all,
        fields(action = %intent.action.as_str(), price = intent.price, request_id = %ctx.request_id)
    )]
    pub async fn act(&self, intent: &Intent, ctx: &HiveContext) -> (pb::NegotiateResponse, Observation) {
        debug!(event = "connector_act_started", "mapping intent");

        let session_token = if ctx.request_id.is_empty() {
            format!("sess_{}", Uuid::new_v4())
        } else {
            format!("sess_{}", ctx.request_id)
        };
        let valid_until = unix_now() + SESSION_VALIDITY_SECS;

        let mut response = pb::NegotiateResponse {
            session_token: session_token.clone(),
            valid_until_timestamp: valid_until as i64,
            result: None,
        };

        match intent.action {
            IntentAction::Accept => {
                let mut accepted = pb::OfferAccepted {
                    final_price: intent.price,
                    reservation_code: format!("HIVE-{}", Uuid::new_v4()),
                    crypto_payment: None,
                };
                if let Some(crypto) = &self.crypto {
                    self.lock_behind_payment(crypto, &mut accepted, intent, ctx).await;
                }
                response.result = Some(pb::negotiate_response::Result::Accepted(accepted));
            }
            IntentAction::Counter => {
                response.result = Some(pb::negotiate_response::Result::Countered(
                    pb::OfferCountered {
                        proposed_price: intent.price,
                        human_message: intent.message.clone(),
                        reason_code: intent
                            .reason_code
                            .clone()
                            .unwrap_or_else(|| reason::NEGOTIATION_ONGOING.to_string()),
                    },
                ));
            }
            IntentAction::Reject => {
                response.result = Some(pb::negotiate_response::Result::Rejected(
                    pb::OfferRejected {
                        reason_code: intent
                            .reason_code
                            .clone()
                            .unwrap_or_else(|| reason::OFFER_TOO_LOW.to_string()),
                    },
                ));
            }
            IntentAction::Escalate => {
                response.result = Some(pb::negotiate_response::Result::UiRequired(
                    pb::UiRequired {
                        template_id: intent
                            .template_id
                            .clone()
                            .unwrap_or_else(|| "manual_review".to_string()),
                        context_data: intent.context_data.clone().into_iter().collect(),
                    },
                ));
            }
            IntentAction::Failure => {
                // The membrane rewrites failures before the connector; if
                // one slips through, fail closed.
                error!(event = "unknown_action_type", "failure intent reached connector");
                response.result = Some(pb::negotiate_response::Result::Rejected(
                    pb::OfferRejected {
                        reason_code: reason::INTERNAL_ERROR.to_string(),
                    },
                ));
            }
        }

        let observation = Observation {
            success: true,
            event_type: format!("negotiation_{}", intent.action.as_str()),
            session_token: Some(session_token),
        };
        (response, observation)
    }

    /// Swap the plaintext reservation code for payment instructions.
    ///
    /// A market failure is logged and leaves the plaintext path in place:
    /// a paid lock must never turn a successful negotiation into an error.
    async fn lock_behind_payment(
        &self,
        crypto: &CryptoLock,
        accepted: &mut pb::OfferAccepted,
        intent: &Intent,
        ctx: &HiveContext,
    ) {
        let item_name = ctx
            .item
            .as_ref()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "Aura Item".to_string());
        let crypto_amount = crypto.converter.usd_to_crypto(intent.price, crypto.currency);

        let created = crypto
            .market
            .create_offer(CreateOffer {
                item_id: ctx.item_id.clone(),
                item_name,
                secret: accepted.reservation_code.clone(),
                final_price_usd: intent.price,
                crypto_amount,
                currency: crypto.currency,
                buyer_did: Some(ctx.offer.agent_did.clone()),
                ttl_seconds: crypto.ttl_seconds,
            })
            .await;

        match created {
            Ok(instructions) => {
                info!(
                    event = "crypto_offer_created",
                    deal_id = %instructions.deal_id,
                    amount = crypto_amount,
                    "reservation code locked"
                );
                accepted.reservation_code.clear();
                accepted.crypto_payment = Some(pb::CryptoPaymentInstructions {
                    deal_id: instructions.deal_id.to_string(),
                    wallet_address: instructions.wallet_address,
                    amount: instructions.amount,
                    currency: instructions.currency.as_str().to_string(),
                    memo: instructions.memo,
                    network: instructions.network,
                    expires_at: instructions.expires_at,
                });
            }
            Err(e) => {
                error!(event = "crypto_lock_failed", error = %e, "deal not locked");
            }
        }
    }
}

impl Default for HiveConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
