//! # Crypto-Locked Deals
//!
//! A [`LockedDeal`] is a finalized accept whose secret (the reservation
//! code) is withheld until an on-chain payment is confirmed. The deal is
//! exclusively owned by the market service; other components reach it only
//! through the market's operations.
//!
//! ## Lifecycle
//!
//! ```text
//! PENDING --(verified proof)--> PAID     (terminal)
//! PENDING --(now > expires_at)-> EXPIRED (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Supported payment currencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CryptoCurrency {
    /// Native SOL.
    #[serde(rename = "SOL")]
    Sol,
    /// USDC SPL token.
    #[serde(rename = "USDC")]
    Usdc,
}

impl CryptoCurrency {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoCurrency::Sol => "SOL",
            CryptoCurrency::Usdc => "USDC",
        }
    }
}

impl fmt::Display for CryptoCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptoCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SOL" => Ok(CryptoCurrency::Sol),
            "USDC" => Ok(CryptoCurrency::Usdc),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Deal settlement state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    /// Awaiting payment.
    Pending,
    /// Payment verified on-chain. Terminal.
    Paid,
    /// TTL elapsed before payment. Terminal.
    Expired,
}

impl DealStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Pending => "PENDING",
            DealStatus::Paid => "PAID",
            DealStatus::Expired => "EXPIRED",
        }
    }

    /// Whether the state accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Paid | DealStatus::Expired)
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DealStatus::Pending),
            "PAID" => Ok(DealStatus::Paid),
            "EXPIRED" => Ok(DealStatus::Expired),
            other => Err(format!("unknown deal status: {other}")),
        }
    }
}

/// Proof of on-chain payment confirmation.
///
/// Only finalized transactions produce proofs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Blockchain transaction id.
    pub tx_hash: String,
    /// Block (slot) the transaction landed in.
    pub block: String,
    /// Payer's wallet address.
    pub from_address: String,
    /// Confirmation timestamp.
    pub confirmed_at: DateTime<Utc>,
}

/// Instructions handed to the buyer for settling a locked deal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentInstructions {
    /// Deal identifier.
    pub deal_id: Uuid,
    /// Destination wallet address.
    pub wallet_address: String,
    /// Amount in native currency units.
    pub amount: f64,
    /// Payment currency.
    pub currency: CryptoCurrency,
    /// 8-character memo binding the transfer to this deal.
    pub memo: String,
    /// Network name (e.g. `devnet`, `mainnet-beta`).
    pub network: String,
    /// Unix seconds after which the deal expires.
    pub expires_at: i64,
}

/// Constructor parameters for [`LockedDeal::new`].
#[derive(Clone, Debug)]
pub struct LockedDealParams {
    /// Negotiated item id.
    pub item_id: String,
    /// Item display name (echoed in the revealed secret).
    pub item_name: String,
    /// Final agreed price in USD.
    pub final_price: f64,
    /// Payment currency.
    pub currency: CryptoCurrency,
    /// Amount due in native currency units.
    pub crypto_amount: f64,
    /// Unique URL-safe memo.
    pub payment_memo: String,
    /// Authenticated-encrypted reservation code.
    pub secret_ciphertext: String,
    /// Buyer DID, when known.
    pub buyer_did: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

/// A deal whose secret is locked behind a verifiable on-chain payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockedDeal {
    /// UUID v4 identifier.
    pub id: Uuid,
    /// Negotiated item id.
    pub item_id: String,
    /// Item display name.
    pub item_name: String,
    /// Final agreed price in USD.
    pub final_price: f64,
    /// Payment currency.
    pub currency: CryptoCurrency,
    /// Amount due in native currency units.
    pub crypto_amount: f64,
    /// Unique URL-safe memo; unique-indexed in the store.
    pub payment_memo: String,
    /// Authenticated-encrypted reservation code (Fernet token).
    pub secret_ciphertext: String,
    /// Settlement state.
    pub status: DealStatus,
    /// Buyer DID, when known.
    pub buyer_did: Option<String>,
    /// Transaction hash once paid.
    pub tx_hash: Option<String>,
    /// Block once paid.
    pub block: Option<String>,
    /// Payer address once paid.
    pub from_address: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Payment confirmation time.
    pub paid_at: Option<DateTime<Utc>>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl LockedDeal {
    /// Create a fresh PENDING deal.
    pub fn new(params: LockedDealParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: params.item_id,
            item_name: params.item_name,
            final_price: params.final_price,
            currency: params.currency,
            crypto_amount: params.crypto_amount,
            payment_memo: params.payment_memo,
            secret_ciphertext: params.secret_ciphertext,
            status: DealStatus::Pending,
            buyer_did: params.buyer_did,
            tx_hash: None,
            block: None,
            from_address: None,
            created_at: params.created_at,
            expires_at: params.expires_at,
            paid_at: None,
            updated_at: params.created_at,
        }
    }

    /// Whether the TTL has elapsed. Only meaningful for PENDING deals.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Record a verified payment. Returns `false` (no-op) on terminal deals,
    /// keeping the transition idempotent under the row lock.
    pub fn mark_paid(&mut self, proof: &PaymentProof, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = DealStatus::Paid;
        self.tx_hash = Some(proof.tx_hash.clone());
        self.block = Some(proof.block.clone());
        self.from_address = Some(proof.from_address.clone());
        self.paid_at = Some(proof.confirmed_at);
        self.updated_at = now;
        true
    }

    /// Expire a PENDING deal. Returns `false` (no-op) on terminal deals.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = DealStatus::Expired;
        self.updated_at = now;
        true
    }

    /// Cached proof for a PAID deal.
    pub fn proof(&self) -> Option<PaymentProof> {
        if self.status != DealStatus::Paid {
            return None;
        }
        Some(PaymentProof {
            tx_hash: self.tx_hash.clone().unwrap_or_default(),
            block: self.block.clone().unwrap_or_default(),
            from_address: self.from_address.clone().unwrap_or_default(),
            confirmed_at: self.paid_at.unwrap_or(self.updated_at),
        })
    }

    /// Payment instructions for a PENDING deal.
    pub fn instructions(&self, wallet_address: &str, network: &str) -> PaymentInstructions {
        PaymentInstructions {
            deal_id: self.id,
            wallet_address: wallet_address.to_string(),
            amount: self.crypto_amount,
            currency: self.currency,
            memo: self.payment_memo.clone(),
            network: network.to_string(),
            expires_at: self.expires_at.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_deal(now: DateTime<Utc>) -> LockedDeal {
        LockedDeal::new(LockedDealParams {
            item_id: "hotel_alpha".into(),
            item_name: "Grand Hotel Alpha".into(),
            final_price: 900.0,
            currency: CryptoCurrency::Sol,
            crypto_amount: 9.0,
            payment_memo: "Ab3xYz_9".into(),
            secret_ciphertext: "gAAAAA...".into(),
            buyer_did: Some("did:key:ab".into()),
            created_at: now,
            expires_at: now + Duration::seconds(3600),
        })
    }

    fn sample_proof(now: DateTime<Utc>) -> PaymentProof {
        PaymentProof {
            tx_hash: "5Nf...sig".into(),
            block: "1234".into(),
            from_address: "Payer111".into(),
            confirmed_at: now,
        }
    }

    #[test]
    fn test_new_deal_is_pending() {
        let now = Utc::now();
        let deal = sample_deal(now);
        assert_eq!(deal.status, DealStatus::Pending);
        assert!(!deal.status.is_terminal());
        assert!(deal.proof().is_none());
    }

    #[test]
    fn test_mark_paid_is_idempotent() {
        let now = Utc::now();
        let mut deal = sample_deal(now);
        let proof = sample_proof(now);
        assert!(deal.mark_paid(&proof, now));
        assert_eq!(deal.status, DealStatus::Paid);
        let cached = deal.proof().unwrap();

        // Second transition is a no-op: the first finalizer wins.
        let other = PaymentProof {
            tx_hash: "other".into(),
            ..sample_proof(now)
        };
        assert!(!deal.mark_paid(&other, now));
        assert_eq!(deal.proof().unwrap(), cached);
    }

    #[test]
    fn test_expired_is_terminal() {
        let now = Utc::now();
        let mut deal = sample_deal(now);
        assert!(deal.mark_expired(now));
        assert_eq!(deal.status, DealStatus::Expired);
        assert!(!deal.mark_paid(&sample_proof(now), now));
        assert_eq!(deal.status, DealStatus::Expired);
    }

    #[test]
    fn test_expiry_window() {
        let now = Utc::now();
        let deal = sample_deal(now);
        assert!(!deal.is_expired(now + Duration::seconds(3599)));
        assert!(deal.is_expired(now + Duration::seconds(3601)));
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("sol".parse::<CryptoCurrency>(), Ok(CryptoCurrency::Sol));
        assert_eq!("USDC".parse::<CryptoCurrency>(), Ok(CryptoCurrency::Usdc));
        assert!("ETH".parse::<CryptoCurrency>().is_err());
    }

    #[test]
    fn test_instructions_reflect_deal() {
        let now = Utc::now();
        let deal = sample_deal(now);
        let instructions = deal.instructions("Wallet111", "devnet");
        assert_eq!(instructions.amount, 9.0);
        assert_eq!(instructions.memo, "Ab3xYz_9");
        assert_eq!(instructions.expires_at, deal.expires_at.timestamp());
    }
}
