//! Prometheus metrics for the negotiation pipeline.
//!
//! Naming convention: `aura_<component>_<metric>_<unit>`.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Negotiations by final action (accept/counter/reject/escalate).
    pub static ref NEGOTIATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("aura_hive_negotiations_total", "Negotiations processed by final action"),
        &["action"]
    ).expect("metric creation failed");

    /// Membrane rewrites by rule.
    pub static ref MEMBRANE_OVERRIDES: CounterVec = CounterVec::new(
        Opts::new("aura_membrane_overrides_total", "Intent rewrites by guardrail rule"),
        &["reason"]
    ).expect("metric creation failed");

    /// Locked deals created, by currency.
    pub static ref DEALS_CREATED: CounterVec = CounterVec::new(
        Opts::new("aura_market_deals_created_total", "Locked deals created"),
        &["currency"]
    ).expect("metric creation failed");

    /// On-chain payments verified, by currency.
    pub static ref PAYMENTS_VERIFIED: CounterVec = CounterVec::new(
        Opts::new("aura_market_payments_verified_total", "Payments verified on-chain"),
        &["currency"]
    ).expect("metric creation failed");

    /// Events handed to the bus, by topic kind.
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("aura_emitter_events_published_total", "Audit events published"),
        &["kind"]
    ).expect("metric creation failed");

    /// Pipeline stage durations.
    pub static ref STAGE_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "aura_hive_stage_duration_seconds",
            "Time spent per pipeline stage"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("bucket layout")),
        &["stage"]
    ).expect("metric creation failed");
}

/// Handle proving metrics were registered.
pub struct MetricsHandle {
    _registered: bool,
}

/// Register the Aura metric set with the global registry.
///
/// Idempotent: re-registration errors from repeated initialization are
/// ignored so tests can call this freely.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(NEGOTIATIONS_TOTAL.clone()),
        Box::new(MEMBRANE_OVERRIDES.clone()),
        Box::new(DEALS_CREATED.clone()),
        Box::new(PAYMENTS_VERIFIED.clone()),
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(STAGE_DURATION.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) => {}
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _registered: true })
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_counters_increment() {
        register_metrics().unwrap();
        let before = NEGOTIATIONS_TOTAL.with_label_values(&["accept"]).get();
        NEGOTIATIONS_TOTAL.with_label_values(&["accept"]).inc();
        let after = NEGOTIATIONS_TOTAL.with_label_values(&["accept"]).get();
        assert!(after > before);
    }

    #[test]
    fn test_gather_renders_text() {
        register_metrics().unwrap();
        NEGOTIATIONS_TOTAL.with_label_values(&["counter"]).inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("aura_hive_negotiations_total"));
    }
}
