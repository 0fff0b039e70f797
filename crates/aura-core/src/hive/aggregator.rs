//! # Aggregator (A)
//!
//! Consolidates the inbound signal with item data and system health into a
//! [`HiveContext`]. A missing item is not fatal here; the reasoner decides
//! what that means. The aggregator never performs an LLM call.

use aura_types::{HiveContext, ItemSnapshot, NegotiationOffer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};

use super::telemetry_cache::TelemetryCache;
use super::NegotiateSignal;
use crate::store::ItemStore;

/// A — consolidates database and system health signals.
pub struct HiveAggregator {
    items: Arc<dyn ItemStore>,
    telemetry: Arc<TelemetryCache>,
}

impl HiveAggregator {
    /// Wire the aggregator against its stores.
    pub fn new(items: Arc<dyn ItemStore>, telemetry: Arc<TelemetryCache>) -> Self {
        Self { items, telemetry }
    }

    /// Build the per-request context.
    #[tracing::instrument(
        name = "aggregator_perceive",
        skip_all,
        fields(item_id = %signal.item_id, request_id = %signal.request_id)
    )]
    pub async fn perceive(&self, signal: &NegotiateSignal) -> HiveContext {
        // 1. Item lookup; a store failure degrades to "no item" rather than
        //    failing the request.
        let item = match self.items.get(&signal.item_id).await {
            Ok(Some(item)) if item.active => Some(ItemSnapshot::from(&item)),
            Ok(Some(_)) => {
                warn!(event = "item_inactive", item_id = %signal.item_id, "inactive item treated as missing");
                None
            }
            Ok(None) => {
                warn!(event = "item_not_found", item_id = %signal.item_id, "item lookup returned nothing");
                None
            }
            Err(e) => {
                error!(event = "aggregator_db_error", error = %e, "item lookup failed");
                None
            }
        };

        // 2. System health from the 30s cache (self-healing on provider loss).
        let system_health = self.telemetry.system_health().await;

        // 3. Assemble.
        HiveContext {
            item_id: signal.item_id.clone(),
            offer: NegotiationOffer {
                bid_amount: signal.bid_amount,
                agent_did: signal.agent_did.clone(),
                reputation: signal.reputation,
            },
            item,
            system_health,
            request_id: signal.request_id.clone(),
            metadata: BTreeMap::new(),
        }
    }
}
