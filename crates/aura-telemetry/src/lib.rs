//! # Aura Telemetry
//!
//! Observability for the hive services: structured tracing with optional
//! OTLP export, and a Prometheus metric set for the negotiation pipeline.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aura_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await.expect("telemetry init");
//!     // Traces and metrics are now being collected.
//! }
//! ```
//!
//! Every request binds a `request_id` to a span via [`request_span`]; logs
//! inside the span automatically carry it.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_metrics, register_metrics, MetricsHandle, DEALS_CREATED, EVENTS_PUBLISHED,
    MEMBRANE_OVERRIDES, NEGOTIATIONS_TOTAL, PAYMENTS_VERIFIED, STAGE_DURATION,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// OTLP tracer pipeline failed to start.
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    /// Prometheus registration failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize tracing and metrics.
///
/// Returns a guard that must be held for the lifetime of the process; on
/// drop it flushes pending traces.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

/// Create the per-request span that carries the bound `request_id`.
///
/// All pipeline stage spans nest under this one, so every log line emitted
/// while serving the request is grep-able by id.
pub fn request_span(request_id: &str) -> tracing::Span {
    tracing::info_span!("request", request_id = %request_id)
}
