//! # Aura Crypto
//!
//! Cryptographic primitives for the hive boundary.
//!
//! ## Components
//!
//! - **did**: `did:key:<hex-ed25519>` identities and verification
//! - **signing**: canonical request hashing and the signed-header scheme
//! - **secrets**: authenticated sealing of reservation codes
//! - **memo**: short URL-safe payment memos
//!
//! ## Security Properties
//!
//! - Ed25519 signatures with deterministic nonces (no RNG at verify time)
//! - Canonical JSON (sorted keys, minimal separators) so that signer and
//!   verifier hash identical bytes
//! - Fernet tokens: a sealed secret cannot be read or altered without the key

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod did;
pub mod memo;
pub mod secrets;
pub mod signing;

pub use did::AgentDid;
pub use memo::generate_memo;
pub use secrets::SecretBox;
pub use signing::{canonical_body_hash, signing_message, AgentWallet, SignedHeaders};

use thiserror::Error;

/// Errors produced by this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// DID is not of the form `did:key:<hex-ed25519-pubkey>`.
    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    /// Hex decoded, but the bytes are not a valid Ed25519 public key.
    #[error("invalid public key in DID")]
    InvalidPublicKey,

    /// Signature bytes are not valid hex of the right width.
    #[error("invalid signature format; expected a hex-encoded string")]
    SignatureFormat,

    /// The signature does not verify against the message.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Request body is not valid JSON.
    #[error("invalid JSON body")]
    MalformedBody,

    /// The wallet holds no signing key (view-only).
    #[error("wallet is view-only; no signing key available")]
    ViewOnly,

    /// Sealing key is not a valid base64 32-byte Fernet key.
    #[error("invalid encryption key")]
    InvalidEncryptionKey,

    /// Token failed authentication or decryption.
    #[error("decryption failed: invalid token or wrong key")]
    OpenFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_never_leak_material() {
        // Error strings are fixed phrases; nothing interpolates key bytes.
        let err = CryptoError::SignatureVerificationFailed;
        assert_eq!(err.to_string(), "signature verification failed");
    }
}
