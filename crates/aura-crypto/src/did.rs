//! # Agent Identities
//!
//! Buyer agents are identified by `did:key:<hex-ed25519-pubkey>`. The hex
//! part must decode to exactly the Ed25519 public-key width; anything else
//! is rejected before signature verification is attempted.

use crate::CryptoError;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};

/// Prefix every agent DID carries.
pub const DID_PREFIX: &str = "did:key:";

/// A parsed and validated agent identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentDid {
    did: String,
    key: VerifyingKey,
}

impl AgentDid {
    /// Parse and validate a DID string.
    pub fn parse(did: &str) -> Result<Self, CryptoError> {
        let hex_part = did
            .strip_prefix(DID_PREFIX)
            .ok_or_else(|| CryptoError::InvalidDid(did.to_string()))?;
        if hex_part.is_empty() {
            return Err(CryptoError::InvalidDid(did.to_string()));
        }
        let bytes = hex::decode(hex_part).map_err(|_| CryptoError::InvalidDid(did.to_string()))?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidDid(did.to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self {
            did: did.to_string(),
            key,
        })
    }

    /// Build a DID from a verifying key.
    pub fn from_key(key: VerifyingKey) -> Self {
        Self {
            did: format!("{DID_PREFIX}{}", hex::encode(key.to_bytes())),
            key,
        }
    }

    /// The full `did:key:...` string.
    pub fn as_str(&self) -> &str {
        &self.did
    }

    /// The underlying verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Verify a hex-encoded Ed25519 signature over `message`.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> Result<(), CryptoError> {
        let sig_bytes = hex::decode(signature_hex).map_err(|_| CryptoError::SignatureFormat)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| CryptoError::SignatureFormat)?;
        self.key
            .verify(message, &signature)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl std::fmt::Display for AgentDid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.did)
    }
}
