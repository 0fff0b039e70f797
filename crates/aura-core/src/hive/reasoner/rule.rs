//! # Rule Reasoner
//!
//! Deterministic pricing ladder; requires no model and no network. Also
//! serves as the per-request fallback for the self-tuned strategy.

use aura_types::{reason, HiveContext, Intent};
use std::collections::BTreeMap;
use tracing::info;

/// UI template used for high-value escalations.
pub const HIGH_VALUE_TEMPLATE: &str = "high_value_confirm";

/// Rule-based strategy.
///
/// Rules, in priority order:
/// 1. `bid > trigger_price` → escalate for human confirmation
/// 2. `bid < floor_price` → counter at the floor
/// 3. otherwise → accept at the bid
pub struct RuleReasoner {
    trigger_price: f64,
}

impl RuleReasoner {
    /// Build with the configured escalation trigger.
    pub fn new(trigger_price: f64) -> Self {
        Self { trigger_price }
    }

    /// Apply the ladder. The caller guarantees `ctx.item` is present.
    pub fn think(&self, ctx: &HiveContext) -> Intent {
        let bid = ctx.offer.bid_amount;
        let Some(item) = &ctx.item else {
            return Intent::reject(reason::ITEM_NOT_FOUND, "No item snapshot.");
        };

        if bid > self.trigger_price {
            info!(
                event = "ui_required_high_value",
                bid,
                trigger = self.trigger_price,
                "escalating"
            );
            let mut context_data = BTreeMap::new();
            context_data.insert(
                "reason".to_string(),
                format!("Bid of ${bid} exceeds security threshold"),
            );
            return Intent::escalate(
                HIGH_VALUE_TEMPLATE,
                context_data,
                format!("Bid {bid} above trigger {}; policy requires a human.", self.trigger_price),
            );
        }

        if bid < item.floor_price {
            info!(event = "counter_offer", bid, "bid under floor");
            return Intent::counter(
                item.floor_price,
                format!("We cannot accept less than ${}.", item.floor_price),
                format!("Bid {bid} under floor; countering at the minimum."),
                reason::BELOW_FLOOR,
            );
        }

        info!(event = "offer_accepted", bid, "bid within range");
        Intent::accept(bid, "", format!("Bid {bid} clears the floor; accepting."))
    }
}
