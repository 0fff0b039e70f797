//! # Market — Crypto-Locked Deals
//!
//! Pay-to-reveal settlement: an accepted deal's reservation code is sealed
//! and withheld until a finalized on-chain payment with the matching memo
//! and amount is observed.
//!
//! ## Module Structure
//!
//! ```text
//! market/
//! ├── ports.rs     # CryptoProvider + DealStore ports (mocks included)
//! ├── store.rs     # Postgres (row-locked) and in-memory deal stores
//! ├── pricing.rs   # Fixed-rate USD→crypto conversion
//! ├── solana.rs    # Solana JSON-RPC provider adapter
//! └── service.rs   # create_offer / check_status state machine
//! ```

pub mod ports;
pub mod pricing;
pub mod service;
pub mod solana;
pub mod store;

pub use ports::{CryptoProvider, DealLease, DealStore, MockChainProvider, ProviderError};
pub use pricing::PriceConverter;
pub use service::{CreateOffer, DealResolution, MarketService, RevealedSecret};
pub use solana::SolanaProvider;
pub use store::MemoryDealStore;
pub use store::PgDealStore;

use aura_types::StoreError;
use thiserror::Error;

/// Errors surfaced by the market service.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The deal store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Could not mint a unique payment memo after retries.
    #[error("payment memo collision persisted after {0} attempts")]
    MemoExhausted(usize),

    /// The sealed secret could not be opened (wrong key or tampering).
    #[error("secret unseal failed")]
    SecretUnseal,

    /// The secret could not be sealed.
    #[error("secret seal failed: {0}")]
    SecretSeal(String),
}
