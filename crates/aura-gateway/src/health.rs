//! # Health Endpoints
//!
//! Kubernetes-compatible probes:
//!
//! - `/healthz`: liveness — process up, always 200
//! - `/readyz`: readiness — verifies the core via gRPC Health; 503 until it
//!   reports SERVING
//! - `/health`: detailed status — always 200, per-component checks
//!
//! All checks are designed to stay fast; slow ones are logged.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use std::time::{Duration, Instant};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::HealthCheckRequest;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Outcome of one core health probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreHealth {
    /// SERVING within the deadline.
    Ok,
    /// Deadline elapsed.
    Timeout,
    /// RPC error or NOT_SERVING.
    Error,
}

impl CoreHealth {
    /// Wire representation for the dependency map.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreHealth::Ok => "ok",
            CoreHealth::Timeout => "timeout",
            CoreHealth::Error => "error",
        }
    }
}

/// Probe the core through the standard gRPC Health protocol
/// (`service = ""`, expect SERVING).
pub async fn check_core_service_health(state: &AppState, timeout: Duration) -> CoreHealth {
    let start = Instant::now();
    let mut client = state.health_client();
    let request = HealthCheckRequest {
        service: String::new(),
    };

    let result = tokio::time::timeout(timeout, client.check(request)).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Err(_) => {
            warn!(event = "core_service_health_check_timeout", latency_ms, "deadline elapsed");
            CoreHealth::Timeout
        }
        Ok(Err(status)) if status.code() == tonic::Code::DeadlineExceeded => {
            warn!(event = "core_service_health_check_timeout", latency_ms, source = "grpc", "deadline elapsed");
            CoreHealth::Timeout
        }
        Ok(Err(status)) => {
            warn!(
                event = "core_service_health_check_rpc_error",
                code = %status.code(),
                latency_ms,
                "probe failed"
            );
            CoreHealth::Error
        }
        Ok(Ok(response)) => {
            if response.into_inner().status == ServingStatus::Serving as i32 {
                debug!(event = "core_service_health_check_ok", latency_ms, "serving");
                CoreHealth::Ok
            } else {
                warn!(event = "core_service_health_check_not_serving", latency_ms, "not serving");
                CoreHealth::Error
            }
        }
    }
}

/// `GET /healthz` — liveness probe; always ok while the process responds.
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /readyz` — readiness probe; 503 until the core is reachable.
pub async fn readiness(State(state): State<AppState>) -> Response {
    let timeout = Duration::from_millis(state.settings.gateway.health_check_timeout_ms);
    let start = Instant::now();
    let core = check_core_service_health(&state, timeout).await;
    log_slow_check(&state, start, "readiness_check_slow");

    if core != CoreHealth::Ok {
        info!(
            event = "readiness_check_not_ready",
            core_service = core.as_str(),
            "removing from rotation"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "dependencies": { "core_service": core.as_str() },
            })),
        )
            .into_response();
    }

    Json(json!({
        "status": "ready",
        "dependencies": { "core_service": CoreHealth::Ok.as_str() },
    }))
    .into_response()
}

/// `GET /health` — detailed status; always 200, body carries the detail.
pub async fn detailed(State(state): State<AppState>) -> Json<serde_json::Value> {
    let timeout = Duration::from_millis(state.settings.gateway.health_check_timeout_ms);
    let start = Instant::now();
    let core = check_core_service_health(&state, timeout).await;
    log_slow_check(&state, start, "health_check_slow");

    let overall = if core == CoreHealth::Ok {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": overall,
        "timestamp": Utc::now().to_rfc3339(),
        "version": crate::VERSION,
        "checks": {
            "api_gateway": "ok",
            "core_service": core.as_str(),
        },
    }))
}

fn log_slow_check(state: &AppState, start: Instant, event: &'static str) {
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    let threshold = state.settings.gateway.health_check_slow_threshold_ms as f64;
    if duration_ms > threshold {
        warn!(event, duration_ms, threshold_ms = threshold, "slow health check");
    }
}
