//! # The Hive Pipeline
//!
//! One bid flows through six fixed stages:
//!
//! ```text
//! Signal -> Membrane(In) -> Aggregator -> Reasoner -> Membrane(Out)
//!        -> Connector -> Emitter
//! ```
//!
//! Stages are wired once at startup and run strictly in order per request;
//! concurrency exists only across requests.

pub mod aggregator;
pub mod connector;
pub mod emitter;
pub mod membrane;
pub mod metabolism;
pub mod reasoner;
pub mod telemetry_cache;

pub use aggregator::HiveAggregator;
pub use connector::HiveConnector;
pub use emitter::HiveEmitter;
pub use membrane::Membrane;
pub use metabolism::MetabolicLoop;
pub use reasoner::Reasoner;
pub use telemetry_cache::TelemetryCache;

/// A validated inbound negotiation signal.
///
/// Built by the RPC layer from the request plus verified metadata; the
/// inbound membrane may still rewrite suspect fields before the aggregator
/// sees it.
#[derive(Clone, Debug)]
pub struct NegotiateSignal {
    /// Target item id (may be replaced with a sentinel by the membrane).
    pub item_id: String,
    /// Bid amount in USD.
    pub bid_amount: f64,
    /// Verified buyer DID.
    pub agent_did: String,
    /// Reputation score in `[0, 1]`.
    pub reputation: f64,
    /// Request id bound to the logging context.
    pub request_id: String,
}
