//! # Request Context and Intents
//!
//! Everything a single negotiation carries through the pipeline:
//! the inbound offer, the consolidated [`HiveContext`], the reasoner's
//! [`Intent`], and the observation/event types the emitter publishes.

use crate::item::ItemSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Internal representation of an incoming bid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationOffer {
    /// Bid amount in USD; the inbound membrane rejects non-positive values.
    pub bid_amount: f64,
    /// Verified agent DID (`did:key:<hex>`), never a client-supplied field.
    pub agent_did: String,
    /// Reputation score in `[0, 1]`.
    pub reputation: f64,
}

/// Telemetry snapshot quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Both metrics fetched.
    Ok,
    /// One metric missing; warnings carry the detail.
    Partial,
    /// Provider unreachable and no cached snapshot.
    Unknown,
}

impl HealthStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Partial => "partial",
            HealthStatus::Unknown => "unknown",
        }
    }
}

/// Cluster health as observed by the aggregator.
///
/// Staleness is preferred over unavailability: a request never fails because
/// the metrics provider is down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Snapshot quality.
    pub status: HealthStatus,
    /// Average CPU usage, percent, rounded to 2 decimals.
    pub cpu_usage_percent: f64,
    /// Average working-set memory in MiB, rounded to 2 decimals.
    pub memory_usage_mb: f64,
    /// ISO 8601 timestamp of the snapshot.
    pub timestamp: String,
    /// True when served from the cache instead of a fresh fetch.
    pub cached: bool,
    /// Per-metric warnings (`cpu_unavailable`, `stale_data`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SystemHealth {
    /// Sentinel returned when the provider is down and nothing is cached.
    pub fn unknown(timestamp: String) -> Self {
        Self {
            status: HealthStatus::Unknown,
            cpu_usage_percent: 0.0,
            memory_usage_mb: 0.0,
            timestamp,
            cached: false,
            warnings: Vec::new(),
        }
    }
}

/// Consolidated context for one negotiation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HiveContext {
    /// Item the offer targets.
    pub item_id: String,
    /// The inbound offer.
    pub offer: NegotiationOffer,
    /// Selected item fields; `None` when the item does not exist.
    pub item: Option<ItemSnapshot>,
    /// Cluster health at perceive time.
    pub system_health: SystemHealth,
    /// Request id propagated from the gateway.
    pub request_id: String,
    /// Free-form pipeline annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// The action the reasoner chose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    /// Close the deal at `price`.
    Accept,
    /// Propose `price` back to the buyer.
    Counter,
    /// Decline without a price.
    Reject,
    /// Hand off to a human-facing UI template.
    Escalate,
    /// The reasoner errored; the membrane substitutes a safe counter.
    /// Never survives past the membrane.
    Failure,
}

impl IntentAction {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentAction::Accept => "accept",
            IntentAction::Counter => "counter",
            IntentAction::Reject => "reject",
            IntentAction::Escalate => "escalate",
            IntentAction::Failure => "failure",
        }
    }

    /// Accept and counter carry a price the guardrails must validate.
    pub fn is_priced(&self) -> bool {
        matches!(self, IntentAction::Accept | IntentAction::Counter)
    }
}

/// Audit trail attached to an intent by the membrane.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentMetadata {
    /// Action before a membrane rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_action: Option<IntentAction>,
    /// Price before a membrane rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    /// Why the membrane rewrote the intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
    /// Reasoner error text when `action == Failure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// The post-reasoning, pre-serialization decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Chosen action.
    pub action: IntentAction,
    /// Price in USD; `0.0` for reject/escalate.
    pub price: f64,
    /// Human-readable message for the counterparty, at most 1 KiB.
    pub message: String,
    /// Internal rationale; never surfaced to the counterparty.
    pub thought: String,
    /// Reason code for counter/reject responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    /// UI template for escalations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Template context for escalations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context_data: BTreeMap<String, String>,
    /// Audit trail.
    #[serde(default)]
    pub metadata: IntentMetadata,
}

/// Hard cap on the counterparty-visible message.
pub const MAX_MESSAGE_BYTES: usize = 1024;

impl Intent {
    /// Accept at the given price.
    pub fn accept(price: f64, message: impl Into<String>, thought: impl Into<String>) -> Self {
        Self::base(IntentAction::Accept, price, message, thought)
    }

    /// Counter at the given price with a reason code.
    pub fn counter(
        price: f64,
        message: impl Into<String>,
        thought: impl Into<String>,
        reason_code: &str,
    ) -> Self {
        let mut intent = Self::base(IntentAction::Counter, price, message, thought);
        intent.reason_code = Some(reason_code.to_string());
        intent
    }

    /// Reject with a reason code.
    pub fn reject(reason_code: &str, thought: impl Into<String>) -> Self {
        let mut intent = Self::base(IntentAction::Reject, 0.0, "", thought);
        intent.reason_code = Some(reason_code.to_string());
        intent
    }

    /// Escalate to a UI template.
    pub fn escalate(
        template_id: &str,
        context_data: BTreeMap<String, String>,
        thought: impl Into<String>,
    ) -> Self {
        let mut intent = Self::base(IntentAction::Escalate, 0.0, "", thought);
        intent.template_id = Some(template_id.to_string());
        intent.context_data = context_data;
        intent
    }

    /// Tagged failure intent: the reasoner errored and the membrane must
    /// substitute a safe response. This replaces out-of-band exceptions.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        let mut intent = Self::base(
            IntentAction::Failure,
            0.0,
            "Internal processing error. Defaulting to safe state.",
            format!("Reasoner failure: {error}"),
        );
        intent.metadata.failure = Some(error);
        intent
    }

    fn base(
        action: IntentAction,
        price: f64,
        message: impl Into<String>,
        thought: impl Into<String>,
    ) -> Self {
        let mut message = message.into();
        if message.len() > MAX_MESSAGE_BYTES {
            let mut cut = MAX_MESSAGE_BYTES;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Self {
            action,
            price,
            message,
            thought: thought.into(),
            reason_code: None,
            template_id: None,
            context_data: BTreeMap::new(),
            metadata: IntentMetadata::default(),
        }
    }

    /// True for the tagged failure variant.
    pub fn is_failure(&self) -> bool {
        self.action == IntentAction::Failure
    }
}

/// Result of acting on an intent; input to the emitter.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Whether the connector produced a response.
    pub success: bool,
    /// Event slug, e.g. `negotiation_accept`.
    pub event_type: String,
    /// Session token echoed in the response, when present.
    pub session_token: Option<String>,
}

/// An event published to the hive's blood stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HiveEvent {
    /// Topic, e.g. `aura.hive.events.negotiation_accept`.
    pub topic: String,
    /// JSON payload.
    pub payload: serde_json::Value,
    /// Unix seconds at publish time.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_intent_is_tagged() {
        let intent = Intent::failure("llm timeout");
        assert!(intent.is_failure());
        assert_eq!(intent.metadata.failure.as_deref(), Some("llm timeout"));
        assert_eq!(intent.price, 0.0);
    }

    #[test]
    fn test_message_truncated_to_cap() {
        let long = "x".repeat(4 * MAX_MESSAGE_BYTES);
        let intent = Intent::accept(100.0, long, "");
        assert_eq!(intent.message.len(), MAX_MESSAGE_BYTES);
    }

    #[test]
    fn test_message_truncation_respects_char_boundaries() {
        // é is two bytes; an odd cap position must not split it.
        let long = "é".repeat(MAX_MESSAGE_BYTES);
        let intent = Intent::accept(100.0, long, "");
        assert!(intent.message.len() <= MAX_MESSAGE_BYTES);
        assert!(intent.message.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_priced_actions() {
        assert!(IntentAction::Accept.is_priced());
        assert!(IntentAction::Counter.is_priced());
        assert!(!IntentAction::Reject.is_priced());
        assert!(!IntentAction::Escalate.is_priced());
    }

    #[test]
    fn test_action_serializes_snake_case() {
        let json = serde_json::to_string(&IntentAction::Escalate).unwrap();
        assert_eq!(json, "\"escalate\"");
    }
}
