//! # Core Error Types
//!
//! Every error that can cross the RPC boundary is mapped explicitly to a
//! gRPC status in `rpc`; nothing bubbles out as a panic.

use aura_types::StoreError;
use thiserror::Error;

/// Errors produced by the core service.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Inbound membrane rejected the signal.
    #[error("invalid bid: {0}")]
    InvalidBid(String),

    /// A storage adapter failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The market could not complete an operation.
    #[error(transparent)]
    Market(#[from] crate::market::MarketError),

    /// Embedding generation failed.
    #[error("failed to generate embeddings: {0}")]
    Embeddings(String),

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}
