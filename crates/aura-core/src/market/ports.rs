//! # Market Ports
//!
//! Driven-side interfaces: the chain-agnostic payment verifier and the
//! row-locking deal repository. Mock adapters live here so integration
//! tests wire the real service against scripted dependencies.

use async_trait::async_trait;
use aura_types::{CryptoCurrency, LockedDeal, PaymentProof, StoreError};
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Relative tolerance when matching on-chain amounts.
pub const AMOUNT_TOLERANCE: f64 = 1e-4;

/// Errors from a chain provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// RPC transport failed.
    #[error("chain rpc failed: {0}")]
    Rpc(String),

    /// Response could not be interpreted.
    #[error("chain response unparseable: {0}")]
    Parse(String),

    /// Provider misconfiguration (bad key, bad mint).
    #[error("provider configuration invalid: {0}")]
    Config(String),
}

/// Chain-agnostic payment verification.
///
/// Implementations MUST consider only finalized transactions, match the
/// memo exactly, match the amount within [`AMOUNT_TOLERANCE`] relative, and
/// verify the destination is the provider's own address (for SPL tokens,
/// the derived associated token account).
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Wallet address payments must be sent to.
    fn address(&self) -> String;

    /// Network name for payment instructions.
    fn network(&self) -> String;

    /// Search finalized history for a matching payment.
    async fn verify_payment(
        &self,
        amount: f64,
        memo: &str,
        currency: CryptoCurrency,
    ) -> Result<Option<PaymentProof>, ProviderError>;
}

/// Whether a received amount matches the expectation.
pub fn amount_matches(expected: f64, received: f64) -> bool {
    (received - expected).abs() <= expected.abs() * AMOUNT_TOLERANCE
}

/// A held row lock on one deal.
///
/// Exactly one lease per deal exists at a time; concurrent `check_status`
/// calls serialize here. The lease must be resolved with [`commit`] or
/// [`release`]; the mutation is atomic with the lock release.
///
/// [`commit`]: DealLease::commit
/// [`release`]: DealLease::release
#[async_trait]
pub trait DealLease: Send {
    /// The row as read under the lock.
    fn deal(&self) -> &LockedDeal;

    /// Persist the updated row and release the lock.
    async fn commit(self: Box<Self>, deal: LockedDeal) -> Result<(), StoreError>;

    /// Release the lock without changes.
    async fn release(self: Box<Self>) -> Result<(), StoreError>;
}

/// Deal repository port.
#[async_trait]
pub trait DealStore: Send + Sync {
    /// Persist a fresh deal. `UniqueViolation` signals a memo collision.
    async fn insert(&self, deal: LockedDeal) -> Result<(), StoreError>;

    /// Acquire the row lock for a deal; `None` when it does not exist.
    async fn acquire(&self, id: Uuid) -> Result<Option<Box<dyn DealLease>>, StoreError>;
}

/// Scripted chain provider for tests and development.
///
/// Payments become visible once registered with [`MockChainProvider::settle`];
/// the failure flag simulates an unreachable chain.
pub struct MockChainProvider {
    address: String,
    network: String,
    settled: Mutex<Vec<(String, f64, PaymentProof)>>,
    failing: Mutex<bool>,
}

impl MockChainProvider {
    /// Provider with a fixed wallet address.
    pub fn new(address: &str, network: &str) -> Self {
        Self {
            address: address.to_string(),
            network: network.to_string(),
            settled: Mutex::new(Vec::new()),
            failing: Mutex::new(false),
        }
    }

    /// Record a finalized payment for `memo` of `amount`.
    pub fn settle(&self, memo: &str, amount: f64, proof: PaymentProof) {
        self.settled.lock().push((memo.to_string(), amount, proof));
    }

    /// Toggle simulated RPC failure.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl CryptoProvider for MockChainProvider {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn network(&self) -> String {
        self.network.clone()
    }

    async fn verify_payment(
        &self,
        amount: f64,
        memo: &str,
        _currency: CryptoCurrency,
    ) -> Result<Option<PaymentProof>, ProviderError> {
        if *self.failing.lock() {
            return Err(ProviderError::Rpc("simulated outage".to_string()));
        }
        Ok(self
            .settled
            .lock()
            .iter()
            .find(|(m, a, _)| m == memo && amount_matches(amount, *a))
            .map(|(_, _, proof)| proof.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn proof() -> PaymentProof {
        PaymentProof {
            tx_hash: "sig".into(),
            block: "1".into(),
            from_address: "payer".into(),
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn test_amount_tolerance_relative() {
        assert!(amount_matches(9.0, 9.0));
        assert!(amount_matches(9.0, 9.0008));
        assert!(!amount_matches(9.0, 9.01));
        assert!(!amount_matches(9.0, 8.99));
    }

    #[tokio::test]
    async fn test_mock_provider_matches_memo_and_amount() {
        let provider = MockChainProvider::new("Wallet111", "devnet");
        provider.settle("Ab3xYz_9", 9.0, proof());

        let hit = provider
            .verify_payment(9.0, "Ab3xYz_9", CryptoCurrency::Sol)
            .await
            .unwrap();
        assert!(hit.is_some());

        let wrong_memo = provider
            .verify_payment(9.0, "other", CryptoCurrency::Sol)
            .await
            .unwrap();
        assert!(wrong_memo.is_none());

        let wrong_amount = provider
            .verify_payment(5.0, "Ab3xYz_9", CryptoCurrency::Sol)
            .await
            .unwrap();
        assert!(wrong_amount.is_none());
    }

    #[tokio::test]
    async fn test_mock_provider_failure_mode() {
        let provider = MockChainProvider::new("Wallet111", "devnet");
        provider.set_failing(true);
        assert!(provider
            .verify_payment(1.0, "m", CryptoCurrency::Sol)
            .await
            .is_err());
    }
}
