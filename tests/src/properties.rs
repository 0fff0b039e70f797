//! # Property Tests
//!
//! The universal economic invariants, checked over generated bids, prices,
//! and messages rather than hand-picked cases.

#[cfg(test)]
mod tests {
    use aura_core::config::LogicSettings;
    use aura_core::hive::Membrane;
    use aura_crypto::{canonical_body_hash, signing_message, AgentWallet};
    use aura_types::{
        HealthStatus, HiveContext, Intent, IntentAction, ItemSnapshot, NegotiationOffer,
        SystemHealth,
    };
    use proptest::prelude::*;

    const MIN_MARGIN: f64 = 0.10;

    fn context(base: f64, floor: f64, cost: Option<f64>, bid: f64) -> HiveContext {
        HiveContext {
            item_id: "hotel_alpha".into(),
            offer: NegotiationOffer {
                bid_amount: bid,
                agent_did: "did:key:ab".into(),
                reputation: 1.0,
            },
            item: Some(ItemSnapshot {
                name: "Grand Hotel Alpha".into(),
                base_price: base,
                floor_price: floor,
                internal_cost: cost,
                occupancy: None,
                value_adds: Vec::new(),
            }),
            system_health: SystemHealth {
                status: HealthStatus::Ok,
                cpu_usage_percent: 10.0,
                memory_usage_mb: 128.0,
                timestamp: "t".into(),
                cached: false,
                warnings: Vec::new(),
            },
            request_id: "prop".into(),
            metadata: Default::default(),
        }
    }

    fn membrane() -> Membrane {
        Membrane::new(&LogicSettings::default())
    }

    proptest! {
        /// Post-membrane, a priced intent never lands under the floor:
        /// `price == 0 ∨ price >= floor_price`.
        #[test]
        fn prop_final_price_respects_floor(
            bid in 1.0f64..5000.0,
            proposed in 0.0f64..5000.0,
            accept in any::<bool>(),
        ) {
            let ctx = context(1000.0, 800.0, Some(600.0), bid);
            let intent = if accept {
                Intent::accept(proposed, "offer", "")
            } else {
                Intent::counter(proposed, "offer", "", "X")
            };
            let out = membrane().inspect_outbound(intent, &ctx);
            prop_assert!(out.price == 0.0 || out.price >= 800.0,
                "price {} under floor", out.price);
        }

        /// Every surviving accept keeps the margin on revenue:
        /// `(price - internal_cost)/price >= min_margin` when cost > 0.
        #[test]
        fn prop_accepts_keep_min_margin(
            bid in 1.0f64..5000.0,
            proposed in 1.0f64..5000.0,
            cost in 1.0f64..900.0,
        ) {
            let ctx = context(1000.0, 800.0, Some(cost), bid);
            let out = membrane().inspect_outbound(Intent::accept(proposed, "offer", ""), &ctx);
            if out.action == IntentAction::Accept {
                let margin = (out.price - cost) / out.price;
                prop_assert!(margin >= MIN_MARGIN - 1e-9,
                    "margin {} below {} at price {}", margin, MIN_MARGIN, out.price);
            }
        }

        /// The literal "floor_price" never survives into a human-visible
        /// message, whatever the reasoner wrote.
        #[test]
        fn prop_no_floor_price_leak(
            prefix in "[a-zA-Z ]{0,24}",
            suffix in "[a-zA-Z ]{0,24}",
            spelling in prop::sample::select(vec![
                "floor_price", "FLOOR_PRICE", "Floor_Price", "fLoOr_PrIcE",
            ]),
            price in 800.0f64..1000.0,
        ) {
            let ctx = context(1000.0, 800.0, Some(600.0), 900.0);
            let message = format!("{prefix}{spelling}{suffix}");
            let out = membrane().inspect_outbound(Intent::accept(price, message, ""), &ctx);
            prop_assert!(!out.message.to_lowercase().contains("floor_price"));
        }

        /// Discounts never exceed the configured cap for surviving priced
        /// intents.
        #[test]
        fn prop_discount_capped(
            proposed in 1.0f64..1000.0,
        ) {
            let ctx = context(1000.0, 500.0, None, 600.0);
            let out = membrane().inspect_outbound(Intent::accept(proposed, "offer", ""), &ctx);
            if out.action.is_priced() {
                let discount = (1000.0 - out.price) / 1000.0;
                prop_assert!(discount <= 0.30 + 1e-9, "discount {} over cap", discount);
            }
        }

        /// Signing is deterministic, and any single-bit flip in the message
        /// parts invalidates the signature.
        #[test]
        fn prop_signature_deterministic_and_fragile(
            bid in 0.01f64..10000.0,
            ts in 1_600_000_000u64..1_900_000_000,
        ) {
            let wallet = AgentWallet::from_seed([42u8; 32]);
            let body = serde_json::to_vec(&serde_json::json!({
                "item_id": "hotel_alpha", "bid_amount": bid,
            })).unwrap();

            let a = wallet.sign_request("POST", "/v1/negotiate", ts, &body).unwrap();
            let b = wallet.sign_request("POST", "/v1/negotiate", ts, &body).unwrap();
            prop_assert_eq!(&a, &b);

            let (hash, _) = canonical_body_hash(&body).unwrap();
            let good = signing_message("POST", "/v1/negotiate", &a.timestamp, &hash);
            prop_assert!(wallet.verify(good.as_bytes(), &a.signature));

            let bad_ts = signing_message("POST", "/v1/negotiate", &(ts + 1).to_string(), &hash);
            prop_assert!(!wallet.verify(bad_ts.as_bytes(), &a.signature));

            let bad_path = signing_message("POST", "/v1/negotiatf", &a.timestamp, &hash);
            prop_assert!(!wallet.verify(bad_path.as_bytes(), &a.signature));
        }
    }

    /// Deal idempotence over arbitrary proof inputs: once PAID, the stored
    /// fields never change.
    proptest! {
        #[test]
        fn prop_paid_deal_is_immutable(
            first_tx in "[a-f0-9]{16}",
            second_tx in "[a-f0-9]{16}",
        ) {
            use aura_types::{CryptoCurrency, LockedDeal, LockedDealParams, PaymentProof};
            use chrono::{Duration, Utc};

            let now = Utc::now();
            let mut deal = LockedDeal::new(LockedDealParams {
                item_id: "i".into(),
                item_name: "n".into(),
                final_price: 900.0,
                currency: CryptoCurrency::Sol,
                crypto_amount: 9.0,
                payment_memo: "memo1234".into(),
                secret_ciphertext: "c".into(),
                buyer_did: None,
                created_at: now,
                expires_at: now + Duration::seconds(60),
            });

            let make_proof = |tx: &str| PaymentProof {
                tx_hash: tx.into(),
                block: "1".into(),
                from_address: "p".into(),
                confirmed_at: now,
            };

            prop_assert!(deal.mark_paid(&make_proof(&first_tx), now));
            let settled = deal.clone();
            prop_assert!(!deal.mark_paid(&make_proof(&second_tx), now));
            prop_assert!(!deal.mark_expired(now + Duration::seconds(3600)));
            prop_assert_eq!(deal, settled);
        }
    }
}
