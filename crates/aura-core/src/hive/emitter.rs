//! # Emitter (G)
//!
//! Publishes the per-request audit event and a service heartbeat to the
//! event bus. Best-effort by contract: a publish failure is logged, never
//! surfaced to the caller.

use aura_bus::{event_topic, EventPublisher, HEARTBEAT_TOPIC};
use aura_telemetry::EVENTS_PUBLISHED;
use aura_types::{HiveEvent, Observation};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Service name stamped on heartbeats.
pub const SERVICE_NAME: &str = "aura-core";

/// G — emits heartbeats and negotiation events to the hive blood stream.
pub struct HiveEmitter {
    bus: Arc<dyn EventPublisher>,
}

impl HiveEmitter {
    /// Wire the emitter onto a bus.
    pub fn new(bus: Arc<dyn EventPublisher>) -> Self {
        Self { bus }
    }

    /// Generate and publish events for a completed request.
    ///
    /// Returns the events for observability in tests.
    pub async fn pulse(&self, observation: &Observation) -> Vec<HiveEvent> {
        let now = unix_now_f64();
        let mut events = Vec::with_capacity(2);

        if !observation.event_type.is_empty() {
            let mut payload = serde_json::json!({
                "success": observation.success,
                "event_type": observation.event_type,
                "timestamp": now,
            });
            if let Some(token) = &observation.session_token {
                payload["session_token"] = serde_json::Value::String(token.clone());
            }
            events.push(HiveEvent {
                topic: event_topic(&observation.event_type),
                payload,
                timestamp: now,
            });
        }

        events.push(HiveEvent {
            topic: HEARTBEAT_TOPIC.to_string(),
            payload: serde_json::json!({
                "status": "active",
                "timestamp": now,
                "service": SERVICE_NAME,
            }),
            timestamp: now,
        });

        for event in &events {
            let kind = if event.topic == HEARTBEAT_TOPIC {
                "heartbeat"
            } else {
                "negotiation"
            };
            EVENTS_PUBLISHED.with_label_values(&[kind]).inc();
            let receivers = self.bus.publish(event.clone()).await;
            debug!(topic = %event.topic, receivers, event = "emitter_pulse", "event published");
        }

        events
    }
}

fn unix_now_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
