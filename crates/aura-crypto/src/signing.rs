//! # Request Signing
//!
//! Requests crossing the hive boundary carry three headers:
//!
//! - `X-Agent-ID`: the agent's DID
//! - `X-Timestamp`: Unix seconds as a decimal string
//! - `X-Signature`: hex Ed25519 signature
//!
//! The signed message is `METHOD ‖ PATH ‖ TIMESTAMP ‖ BODY_HASH` (ASCII
//! concatenation, no separators), where `BODY_HASH` is the SHA-256 of the
//! canonical JSON body. Canonical means sorted keys and minimal separators,
//! so any signer producing canonical JSON hashes identical bytes.

use crate::did::AgentDid;
use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Header names used by the signed-request scheme.
pub mod header {
    /// DID of the calling agent.
    pub const AGENT_ID: &str = "x-agent-id";
    /// Unix-seconds timestamp.
    pub const TIMESTAMP: &str = "x-timestamp";
    /// Hex Ed25519 signature.
    pub const SIGNATURE: &str = "x-signature";
}

/// The three auth headers produced by [`AgentWallet::sign_request`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `X-Agent-ID` value.
    pub agent_id: String,
    /// `X-Timestamp` value.
    pub timestamp: String,
    /// `X-Signature` value.
    pub signature: String,
}

/// Hash the canonical form of a JSON request body.
///
/// Returns the hex digest and the parsed body. An empty body hashes the
/// empty string and parses to an empty JSON object.
pub fn canonical_body_hash(body: &[u8]) -> Result<(String, serde_json::Value), CryptoError> {
    if body.is_empty() {
        let digest = Sha256::digest(b"");
        return Ok((hex::encode(digest), serde_json::json!({})));
    }
    // serde_json::Value maps are BTreeMap-backed, so re-serialization yields
    // sorted keys with minimal separators.
    let parsed: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| CryptoError::MalformedBody)?;
    let canonical = serde_json::to_string(&parsed).map_err(|_| CryptoError::MalformedBody)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok((hex::encode(digest), parsed))
}

/// Reconstruct the signed message for the given request parts.
pub fn signing_message(method: &str, path: &str, timestamp: &str, body_hash: &str) -> String {
    format!("{method}{path}{timestamp}{body_hash}")
}

/// An agent wallet holding an Ed25519 identity.
///
/// Wallets created with [`AgentWallet::from_did`] are view-only: they can
/// verify but not sign.
pub struct AgentWallet {
    signing_key: Option<SigningKey>,
    did: AgentDid,
}

impl AgentWallet {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let did = AgentDid::from_key(signing_key.verifying_key());
        Self {
            signing_key: Some(signing_key),
            did,
        }
    }

    /// Wallet from an existing secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let did = AgentDid::from_key(signing_key.verifying_key());
        Self {
            signing_key: Some(signing_key),
            did,
        }
    }

    /// View-only wallet from a DID (verification only).
    pub fn from_did(did: &str) -> Result<Self, CryptoError> {
        Ok(Self {
            signing_key: None,
            did: AgentDid::parse(did)?,
        })
    }

    /// The wallet's DID.
    pub fn did(&self) -> &AgentDid {
        &self.did
    }

    /// Sign a request, producing the three auth headers.
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        timestamp: u64,
        body: &[u8],
    ) -> Result<SignedHeaders, CryptoError> {
        let signing_key = self.signing_key.as_ref().ok_or(CryptoError::ViewOnly)?;
        let (body_hash, _) = canonical_body_hash(body)?;
        let timestamp = timestamp.to_string();
        let message = signing_message(method, path, &timestamp, &body_hash);
        let signature = signing_key.sign(message.as_bytes());
        Ok(SignedHeaders {
            agent_id: self.did.as_str().to_string(),
            timestamp,
            signature: hex::encode(signature.to_bytes()),
        })
    }

    /// Verify a hex signature over a message against this wallet's key.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        self.did.verify(message, signature_hex).is_ok()
    }
}

impl Drop for AgentWallet {
    fn drop(&mut self) {
        if let Some(key) = self.signing_key.take() {
            // Zeroize secret key material.
            let _bytes = Zeroizing::new(key.to_bytes());
        }
    }
}

impl std::fmt::Debug for AgentWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("AgentWallet")
            .field("did", &self.did.as_str())
            .field("view_only", &self.signing_key.is_none())
            .finish()
    }
}
