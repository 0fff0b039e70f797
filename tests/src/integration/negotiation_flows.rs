//! # End-to-End Negotiation Flows
//!
//! Drives the assembled pipeline — inbound membrane, aggregator, reasoner,
//! outbound membrane, connector, emitter — against the demo catalog item
//! (`base_price=1000`, `floor_price=800`, `internal_cost=600`,
//! `min_margin=0.10`, `max_discount_percent=0.30`).

#[cfg(test)]
mod tests {
    use crate::support::{crypto_pipeline, rule_pipeline, scripted_pipeline, signal};
    use aura_proto::negotiation as pb;
    use serde_json::json;

    fn result(response: pb::NegotiateResponse) -> pb::negotiate_response::Result {
        response.result.expect("oneof result set")
    }

    /// A reasoner happy to accept below floor gets rewritten to a counter
    /// at floor × 1.05.
    #[tokio::test]
    async fn test_below_floor_bid_countered_at_guardrail() {
        let pipeline = scripted_pipeline(json!({
            "thought": "thin but take it",
            "action": "accept",
            "price": 500.0,
            "message": "Deal at 500."
        }))
        .await;

        let response = pipeline.execute(signal(500.0, "hotel_alpha")).await.unwrap();
        match result(response) {
            pb::negotiate_response::Result::Countered(countered) => {
                assert_eq!(countered.proposed_price, 840.00);
                assert_eq!(countered.reason_code, "FLOOR_PRICE_VIOLATION");
                assert!(!countered
                    .human_message
                    .to_lowercase()
                    .contains("floor_price"));
            }
            other => panic!("expected countered, got {other:?}"),
        }
    }

    /// At the floor the margin requirement (600/0.9 = 666.67) is already
    /// satisfied, so an accept at 800 survives the membrane.
    #[tokio::test]
    async fn test_at_floor_accept_survives_guardrails() {
        let pipeline = scripted_pipeline(json!({
            "thought": "floor exactly",
            "action": "accept",
            "price": 800.0,
            "message": "Happy to close at 800."
        }))
        .await;

        let response = pipeline.execute(signal(800.0, "hotel_alpha")).await.unwrap();
        match result(response) {
            pb::negotiate_response::Result::Accepted(accepted) => {
                assert_eq!(accepted.final_price, 800.0);
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    /// Rule reasoner, same bid: rule (b) does not fire at the floor, the
    /// bid is accepted as-is.
    #[tokio::test]
    async fn test_rule_reasoner_accepts_at_floor() {
        let response = rule_pipeline()
            .await
            .execute(signal(800.0, "hotel_alpha"))
            .await
            .unwrap();
        match result(response) {
            pb::negotiate_response::Result::Accepted(accepted) => {
                assert_eq!(accepted.final_price, 800.0)
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_in_range_bid_accepted() {
        let response = rule_pipeline()
            .await
            .execute(signal(900.0, "hotel_alpha"))
            .await
            .unwrap();
        match result(response) {
            pb::negotiate_response::Result::Accepted(accepted) => {
                assert_eq!(accepted.final_price, 900.0);
                assert!(accepted.reservation_code.len() >= 12);
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rule_reasoner_counters_below_floor() {
        let response = rule_pipeline()
            .await
            .execute(signal(500.0, "hotel_alpha"))
            .await
            .unwrap();
        match result(response) {
            pb::negotiate_response::Result::Countered(countered) => {
                assert_eq!(countered.proposed_price, 800.0);
                assert_eq!(countered.reason_code, "BELOW_FLOOR");
                assert_eq!(countered.human_message, "We cannot accept less than $800.");
            }
            other => panic!("expected countered, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_high_value_bid_escalates() {
        let response = rule_pipeline()
            .await
            .execute(signal(1200.0, "hotel_alpha"))
            .await
            .unwrap();
        match result(response) {
            pb::negotiate_response::Result::UiRequired(ui) => {
                assert_eq!(ui.template_id, "high_value_confirm");
                assert!(ui.context_data.contains_key("reason"));
            }
            other => panic!("expected ui_required, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_item_rejected() {
        let response = rule_pipeline()
            .await
            .execute(signal(500.0, "nope"))
            .await
            .unwrap();
        match result(response) {
            pb::negotiate_response::Result::Rejected(rejected) => {
                assert_eq!(rejected.reason_code, "ITEM_NOT_FOUND");
            }
            other => panic!("expected rejected, got {other:?}"),
        }
    }

    /// A dead LLM endpoint produces a failure intent; the membrane turns it
    /// into a safe counter instead of an error.
    #[tokio::test]
    async fn test_reasoner_failure_yields_safe_counter() {
        // The stub returns a non-object completion, which fails decision
        // parsing -> FailureIntent -> FAILURE_RECOVERY counter.
        let pipeline = scripted_pipeline(json!("not a decision object")).await;
        let response = pipeline.execute(signal(700.0, "hotel_alpha")).await.unwrap();
        match result(response) {
            pb::negotiate_response::Result::Countered(countered) => {
                assert_eq!(countered.reason_code, "FAILURE_RECOVERY");
                assert_eq!(countered.proposed_price, 840.0);
            }
            other => panic!("expected countered, got {other:?}"),
        }
    }

    /// The membrane's DLP rule scrubs internal pricing vocabulary from a
    /// model-written message before it reaches the wire.
    #[tokio::test]
    async fn test_floor_price_leak_scrubbed() {
        let pipeline = scripted_pipeline(json!({
            "thought": "oops",
            "action": "accept",
            "price": 900.0,
            "message": "Our floor_price is 800 so 900 works."
        }))
        .await;

        let response = pipeline.execute(signal(900.0, "hotel_alpha")).await.unwrap();
        // Accept survives (900 clears every rule); only the message changes.
        match result(response) {
            pb::negotiate_response::Result::Accepted(accepted) => {
                assert_eq!(accepted.final_price, 900.0);
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    /// Crypto mode: an accept swaps the reservation code for payment
    /// instructions (scenario continues in `market_flows`).
    #[tokio::test]
    async fn test_crypto_accept_returns_payment_instructions() {
        let (pipeline, _market, _provider) = crypto_pipeline().await;
        let response = pipeline.execute(signal(900.0, "hotel_alpha")).await.unwrap();
        match result(response) {
            pb::negotiate_response::Result::Accepted(accepted) => {
                assert!(accepted.reservation_code.is_empty());
                let payment = accepted.crypto_payment.expect("instructions");
                assert_eq!(payment.amount, 9.0);
                assert_eq!(payment.currency, "SOL");
                assert_eq!(payment.memo.len(), 8);
                assert_eq!(payment.wallet_address, "Wallet111");
                assert_eq!(payment.network, "devnet");
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }
}
