//! # Inbound Security
//!
//! Cryptographic signature verification for incoming requests. Every
//! authenticated endpoint calls [`verify_signature`] before touching the
//! body; on success the handler receives the parsed body and the verified
//! DID, and MUST use that DID rather than anything client-supplied.
//!
//! Verification order (each step gates the next):
//!
//! 1. all three headers present
//! 2. DID format valid and hex-decodes to an Ed25519 public key
//! 3. timestamp within the replay window
//! 4. body canonicalizes (sorted keys, minimal separators) and hashes
//! 5. Ed25519 signature over `METHOD ‖ PATH ‖ TS ‖ BODY_HASH` verifies

use aura_crypto::{canonical_body_hash, signing_message, AgentDid, CryptoError};
use axum::http::HeaderMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::error::AuthError;

/// Outcome of a successful verification.
#[derive(Clone, Debug)]
pub struct VerifiedRequest {
    /// The DID whose key signed the request.
    pub agent_did: String,
    /// The parsed request body (empty object for empty bodies).
    pub body: serde_json::Value,
}

/// Server clock in Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Verify the three signature headers against the raw request.
pub fn verify_signature(
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &[u8],
    tolerance_seconds: u64,
    now: u64,
) -> Result<VerifiedRequest, AuthError> {
    // 1. Header presence, reported together.
    let agent_id = header_str(headers, "x-agent-id");
    let timestamp = header_str(headers, "x-timestamp");
    let signature = header_str(headers, "x-signature");

    let mut missing = Vec::new();
    if agent_id.is_none() {
        missing.push("X-Agent-ID");
    }
    if timestamp.is_none() {
        missing.push("X-Timestamp");
    }
    if signature.is_none() {
        missing.push("X-Signature");
    }
    if !missing.is_empty() {
        return Err(AuthError::MissingHeaders(missing));
    }
    let (agent_id, timestamp, signature) =
        (agent_id.unwrap_or_default(), timestamp.unwrap_or_default(), signature.unwrap_or_default());

    // 2. DID format.
    let did = AgentDid::parse(&agent_id).map_err(|e| match e {
        CryptoError::InvalidDid(_) | CryptoError::InvalidPublicKey => {
            AuthError::InvalidDid(agent_id.clone())
        }
        _ => AuthError::InvalidDid(agent_id.clone()),
    })?;

    // 3. Replay window.
    let request_time: u64 = timestamp
        .parse()
        .map_err(|_| AuthError::InvalidTimestamp(timestamp.clone()))?;
    let diff = now.abs_diff(request_time);
    if diff > tolerance_seconds {
        warn!(
            event = "replay_window_rejected",
            diff,
            max = tolerance_seconds,
            "stale or future timestamp"
        );
        return Err(AuthError::ReplayWindow {
            current: now,
            request: request_time,
            diff,
            max: tolerance_seconds,
        });
    }

    // 4. Canonical body hash.
    let (body_hash, parsed_body) = canonical_body_hash(body).map_err(|e| match e {
        CryptoError::MalformedBody => AuthError::MalformedBody,
        _ => AuthError::MalformedBody,
    })?;

    // 5. Signature over the reconstructed message.
    let message = signing_message(method, path, &timestamp, &body_hash);
    did.verify(message.as_bytes(), &signature)
        .map_err(|e| match e {
            CryptoError::SignatureFormat => AuthError::SignatureFormat,
            _ => {
                warn!(event = "signature_rejected", agent = %agent_id, "verification failed");
                AuthError::InvalidSignature
            }
        })?;

    Ok(VerifiedRequest {
        agent_did: agent_id,
        body: parsed_body,
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}
