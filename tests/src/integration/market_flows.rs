//! # Crypto Lock Round-Trips
//!
//! The full pay-to-reveal cycle: accept locks a deal, the deal stays
//! PENDING with stable instructions until a finalized payment appears,
//! then flips PAID exactly once and stays there.

#[cfg(test)]
mod tests {
    use crate::support::{crypto_pipeline, signal};
    use aura_core::market::DealResolution;
    use aura_proto::negotiation as pb;
    use aura_types::PaymentProof;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn proof(tx: &str) -> PaymentProof {
        PaymentProof {
            tx_hash: tx.into(),
            block: "4242".into(),
            from_address: "BuyerWallet1".into(),
            confirmed_at: Utc::now(),
        }
    }

    /// Scenario: accept at 900 with SOL at $100 → 9.0 SOL due; PENDING
    /// before payment with identical instructions; PAID after a finalized
    /// transfer with matching memo; further calls identical.
    #[tokio::test]
    async fn test_crypto_lock_round_trip() {
        let (pipeline, market, provider) = crypto_pipeline().await;

        // 1. Accept locks the deal.
        let response = pipeline.execute(signal(900.0, "hotel_alpha")).await.unwrap();
        let payment = match response.result.unwrap() {
            pb::negotiate_response::Result::Accepted(accepted) => {
                assert!(accepted.reservation_code.is_empty());
                accepted.crypto_payment.unwrap()
            }
            other => panic!("expected accepted, got {other:?}"),
        };
        assert_eq!(payment.amount, 9.0);
        assert_eq!(payment.currency, "SOL");
        let deal_id: Uuid = payment.deal_id.parse().unwrap();

        // 2. Before payment: PENDING with the same instructions.
        match market.check_status(deal_id).await.unwrap() {
            DealResolution::Pending { instructions } => {
                assert_eq!(instructions.memo, payment.memo);
                assert_eq!(instructions.amount, payment.amount);
                assert_eq!(instructions.wallet_address, payment.wallet_address);
            }
            other => panic!("expected pending, got {other:?}"),
        }

        // 3. Finalized transfer of 9.0 SOL with the memo lands.
        provider.settle(&payment.memo, 9.0, proof("5Nf111sig"));
        let (secret, first_proof) = match market.check_status(deal_id).await.unwrap() {
            DealResolution::Paid { secret, proof } => (secret, proof),
            other => panic!("expected paid, got {other:?}"),
        };
        assert!(secret.reservation_code.starts_with("HIVE-"));
        assert_eq!(first_proof.tx_hash, "5Nf111sig");

        // 4. Idempotent thereafter, even if the chain goes dark.
        provider.set_failing(true);
        match market.check_status(deal_id).await.unwrap() {
            DealResolution::Paid { secret: again, proof } => {
                assert_eq!(again, secret);
                assert_eq!(proof.tx_hash, first_proof.tx_hash);
                assert_eq!(proof.from_address, first_proof.from_address);
            }
            other => panic!("expected paid, got {other:?}"),
        }
    }

    /// A transfer with the wrong amount never settles the deal.
    #[tokio::test]
    async fn test_wrong_amount_stays_pending() {
        let (pipeline, market, provider) = crypto_pipeline().await;
        let response = pipeline.execute(signal(900.0, "hotel_alpha")).await.unwrap();
        let payment = match response.result.unwrap() {
            pb::negotiate_response::Result::Accepted(a) => a.crypto_payment.unwrap(),
            other => panic!("expected accepted, got {other:?}"),
        };
        let deal_id: Uuid = payment.deal_id.parse().unwrap();

        provider.settle(&payment.memo, 8.5, proof("shortpay"));
        assert!(matches!(
            market.check_status(deal_id).await.unwrap(),
            DealResolution::Pending { .. }
        ));
    }

    /// Concurrent resolvers on a fresh payment: one finalizer, identical
    /// observations everywhere.
    #[tokio::test]
    async fn test_concurrent_resolution_is_serialized() {
        let (pipeline, market, provider) = crypto_pipeline().await;
        let response = pipeline.execute(signal(900.0, "hotel_alpha")).await.unwrap();
        let payment = match response.result.unwrap() {
            pb::negotiate_response::Result::Accepted(a) => a.crypto_payment.unwrap(),
            other => panic!("expected accepted, got {other:?}"),
        };
        let deal_id: Uuid = payment.deal_id.parse().unwrap();
        provider.settle(&payment.memo, 9.0, proof("racewinner"));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let market = Arc::clone(&market);
            handles.push(tokio::spawn(async move {
                market.check_status(deal_id).await.unwrap()
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                DealResolution::Paid { secret, proof } => {
                    assert_eq!(proof.tx_hash, "racewinner");
                    codes.push(secret.reservation_code);
                }
                other => panic!("expected paid, got {other:?}"),
            }
        }
        codes.dedup();
        assert_eq!(codes.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_deal_is_not_found() {
        let (_, market, _) = crypto_pipeline().await;
        assert!(matches!(
            market.check_status(Uuid::new_v4()).await.unwrap(),
            DealResolution::NotFound
        ));
    }
}
