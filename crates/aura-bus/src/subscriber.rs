//! # Event Subscriber
//!
//! Receiving side of the event bus.

use aura_types::HiveEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Topic filter for a subscription.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    topics: Option<Vec<String>>,
}

impl EventFilter {
    /// Receive every event.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: None }
    }

    /// Receive only the given topics (exact match).
    #[must_use]
    pub fn topics(topics: Vec<String>) -> Self {
        Self {
            topics: Some(topics),
        }
    }

    /// Whether an event passes the filter.
    pub fn matches(&self, event: &HiveEvent) -> bool {
        match &self.topics {
            None => true,
            Some(topics) => topics.iter().any(|t| t == &event.topic),
        }
    }
}

/// Handle for receiving filtered events.
pub struct Subscription {
    receiver: broadcast::Receiver<HiveEvent>,
    filter: EventFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<HiveEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event.
    ///
    /// Returns `None` when the bus is gone. Lagged receivers skip the lost
    /// events and continue; the drop is logged, not fatal.
    pub async fn recv(&mut self) -> Option<HiveEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "subscriber_lagged_events_dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
