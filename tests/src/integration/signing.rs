//! # Signature-Layer Scenarios
//!
//! Exercises the gateway's verification against wallets produced by the
//! same signing scheme buyer agents use.

#[cfg(test)]
mod tests {
    use aura_crypto::{canonical_body_hash, signing_message, AgentWallet};
    use aura_gateway::error::AuthError;
    use aura_gateway::security::verify_signature;
    use axum::http::{HeaderMap, HeaderValue};

    const NOW: u64 = 1_700_000_000;
    const TOLERANCE: u64 = 60;
    const PATH: &str = "/v1/negotiate";

    fn body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "item_id": "hotel_alpha",
            "bid_amount": 850.0,
            "currency": "USD",
            "agent_did": "will-be-ignored",
        }))
        .unwrap()
    }

    fn headers_for(wallet: &AgentWallet, ts: u64, body: &[u8]) -> HeaderMap {
        let signed = wallet.sign_request("POST", PATH, ts, body).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-agent-id", HeaderValue::from_str(&signed.agent_id).unwrap());
        headers.insert("x-timestamp", HeaderValue::from_str(&signed.timestamp).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&signed.signature).unwrap());
        headers
    }

    /// Scenario 7: valid signature on an unchanged body is admitted, and
    /// the verified DID (not the body's) is what the handler receives.
    #[test]
    fn test_valid_signature_admitted() {
        let wallet = AgentWallet::generate();
        let headers = headers_for(&wallet, NOW, &body());
        let verified = verify_signature(&headers, "POST", PATH, &body(), TOLERANCE, NOW).unwrap();
        assert_eq!(verified.agent_did, wallet.did().as_str());
        assert_ne!(verified.agent_did, "will-be-ignored");
    }

    /// Scenario 8: swapping one byte in the body invalidates the signature.
    #[test]
    fn test_one_byte_swap_rejected() {
        let wallet = AgentWallet::generate();
        let headers = headers_for(&wallet, NOW, &body());
        let mut tampered = body();
        // 850.0 -> 950.0
        let idx = tampered.windows(3).position(|w| w == b"850").unwrap();
        tampered[idx] = b'9';
        let err =
            verify_signature(&headers, "POST", PATH, &tampered, TOLERANCE, NOW).unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    /// Scenario 9: a timestamp 120 s in the past is outside the window.
    #[test]
    fn test_stale_timestamp_rejected() {
        let wallet = AgentWallet::generate();
        let headers = headers_for(&wallet, NOW - 120, &body());
        let err = verify_signature(&headers, "POST", PATH, &body(), TOLERANCE, NOW).unwrap_err();
        match err {
            AuthError::ReplayWindow { diff, .. } => assert_eq!(diff, 120),
            other => panic!("expected replay rejection, got {other:?}"),
        }
    }

    /// Scenario 10: omitting X-Signature lists the missing header.
    #[test]
    fn test_missing_signature_listed() {
        let wallet = AgentWallet::generate();
        let mut headers = headers_for(&wallet, NOW, &body());
        headers.remove("x-signature");
        let err = verify_signature(&headers, "POST", PATH, &body(), TOLERANCE, NOW).unwrap_err();
        assert_eq!(err, AuthError::MissingHeaders(vec!["X-Signature"]));
    }

    /// Two agents, same body: each signature verifies only against its own
    /// DID.
    #[test]
    fn test_signatures_are_not_transferable() {
        let alice = AgentWallet::generate();
        let mallory = AgentWallet::generate();
        let mut headers = headers_for(&alice, NOW, &body());
        // Mallory claims Alice's signature as their own.
        headers.insert(
            "x-agent-id",
            HeaderValue::from_str(mallory.did().as_str()).unwrap(),
        );
        let err = verify_signature(&headers, "POST", PATH, &body(), TOLERANCE, NOW).unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    /// The documented reconstruction (`METHOD ‖ PATH ‖ TS ‖ SHA-256(canonical
    /// body)`) is exactly what the wallet signs.
    #[test]
    fn test_wire_scheme_matches_documentation() {
        let wallet = AgentWallet::generate();
        let signed = wallet.sign_request("POST", PATH, NOW, &body()).unwrap();
        let (body_hash, _) = canonical_body_hash(&body()).unwrap();
        let message = signing_message("POST", PATH, &signed.timestamp, &body_hash);
        assert!(wallet.verify(message.as_bytes(), &signed.signature));
    }
}
