//! # Aura Types
//!
//! Domain entities shared across the hive subsystems.
//!
//! ## Module Structure
//!
//! ```text
//! aura-types/
//! ├── item.rs      # Catalog items and their economic metadata
//! ├── context.rs   # Per-request context, offers, intents
//! ├── deal.rs      # Crypto-locked deals and payment proofs
//! └── errors.rs    # Store-level error types
//! ```
//!
//! Components never exchange ad-hoc maps: everything that crosses a
//! subsystem boundary is defined here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod deal;
pub mod errors;
pub mod item;

pub use context::{
    HiveContext, HiveEvent, HealthStatus, Intent, IntentAction, IntentMetadata,
    NegotiationOffer, Observation, SystemHealth,
};
pub use deal::{
    CryptoCurrency, DealStatus, LockedDeal, LockedDealParams, PaymentInstructions, PaymentProof,
};
pub use errors::StoreError;
pub use item::{Item, ItemMeta, ItemSnapshot, Occupancy, SearchHit, ValueAdd};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reason codes used on the wire and in audit logs.
pub mod reason {
    /// Counter: bid was below the configured floor (rule reasoner).
    pub const BELOW_FLOOR: &str = "BELOW_FLOOR";
    /// Counter: membrane rewrote a price under the floor.
    pub const FLOOR_PRICE_VIOLATION: &str = "FLOOR_PRICE_VIOLATION";
    /// Counter: membrane rewrote a price under the minimum margin.
    pub const MIN_MARGIN_VIOLATION: &str = "MIN_MARGIN_VIOLATION";
    /// Counter: membrane capped a discount past the configured maximum.
    pub const DISCOUNT_LIMIT: &str = "DISCOUNT_LIMIT";
    /// Counter: the reasoner errored and the membrane substituted a safe offer.
    pub const FAILURE_RECOVERY: &str = "FAILURE_RECOVERY";
    /// Counter: message advertised an add-on outside the whitelist.
    pub const ADDON_NOT_ALLOWED: &str = "ADDON_NOT_ALLOWED";
    /// Counter: plain ongoing negotiation.
    pub const NEGOTIATION_ONGOING: &str = "NEGOTIATION_ONGOING";
    /// Reject: the bid is not worth countering.
    pub const OFFER_TOO_LOW: &str = "OFFER_TOO_LOW";
    /// Reject: the referenced item does not exist.
    pub const ITEM_NOT_FOUND: &str = "ITEM_NOT_FOUND";
    /// Reject: unrecoverable processing error.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
