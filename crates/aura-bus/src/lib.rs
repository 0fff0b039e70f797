//! # Aura Bus — Event Bus for Hive Audit Events
//!
//! The emitter publishes audit events and heartbeats through this bus.
//! Publication is best-effort and non-blocking: a failed or unobserved
//! publish never fails the request that produced it, and a slow consumer
//! loses the oldest events rather than exerting backpressure on the
//! pipeline.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Emitter    │    publish()       │  Consumers   │
//! │  (pipeline)  │ ──────┐            │ (audit, ...) │
//! └──────────────┘       ▼            └──────────────┘
//!                  ┌──────────────┐          ↑
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod publisher;
pub mod subscriber;

pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventFilter, Subscription};

/// Maximum events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Topic prefix for negotiation audit events.
pub const EVENTS_TOPIC_PREFIX: &str = "aura.hive.events.";

/// Heartbeat topic.
pub const HEARTBEAT_TOPIC: &str = "aura.hive.heartbeat";

/// Build the audit topic for an event type, e.g. `negotiation_accept`.
pub fn event_topic(event_type: &str) -> String {
    format!("{EVENTS_TOPIC_PREFIX}{event_type}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic() {
        assert_eq!(
            event_topic("negotiation_accept"),
            "aura.hive.events.negotiation_accept"
        );
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
