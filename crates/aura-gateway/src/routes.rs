//! # Routes
//!
//! The three authenticated endpoints map 1:1 onto core RPCs; health
//! endpoints live in `health`. Every request gets a request id bound to a
//! span by the middleware and propagated to the core as `x-request-id`
//! metadata.

use aura_proto::negotiation as pb;
use aura_proto::REQUEST_ID_METADATA_KEY;
use aura_telemetry::request_span;
use axum::body::Bytes;
use axum::extract::{Extension, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::error::{grpc_status_to_http, AuthError};
use crate::health;
use crate::security::{unix_now, verify_signature, VerifiedRequest};
use crate::state::AppState;

/// Request id assigned by the middleware.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Deadline forwarded to the core on every RPC (grpc-timeout metadata).
const CORE_RPC_DEADLINE: Duration = Duration::from_secs(30);

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/negotiate", post(negotiate))
        .route("/v1/search", post(search))
        .route("/v1/system/status", get(system_status))
        .route("/healthz", get(health::liveness))
        .route("/readyz", get(health::readiness))
        .route("/health", get(health::detailed))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Generate and bind a request id for every HTTP request.
///
/// The id lives in a span covering the whole handler, so the logging
/// context is released on all exits when the span closes.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let span = request_span(&request_id);
    async move {
        info!(event = "request_started", %method, path = %path, "inbound");
        let response = next.run(request).await;
        info!(
            event = "request_completed",
            %method,
            path = %path,
            status_code = response.status().as_u16(),
            "outbound"
        );
        response
    }
    .instrument(span)
    .await
}

fn authed(
    state: &AppState,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<VerifiedRequest, AuthError> {
    verify_signature(
        headers,
        method,
        path,
        body,
        state.settings.security.timestamp_tolerance_seconds,
        unix_now(),
    )
}

fn grpc_error(status: tonic::Status) -> Response {
    let (code, detail) = grpc_status_to_http(&status);
    tracing::error!(
        event = "grpc_call_failed",
        code = %status.code(),
        error = %status.message(),
        "core call failed"
    );
    (code, Json(json!({ "detail": detail }))).into_response()
}

#[derive(Deserialize)]
struct NegotiationRequestHttp {
    item_id: String,
    bid_amount: f64,
    #[serde(default = "default_currency")]
    #[allow(dead_code)]
    currency: String,
    // Accepted for wire compatibility; the verified DID always wins.
    #[serde(default)]
    #[allow(dead_code)]
    agent_did: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

async fn negotiate(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let verified = match authed(&state, &headers, "POST", "/v1/negotiate", &body) {
        Ok(verified) => verified,
        Err(e) => return e.into_response(),
    };

    let payload: NegotiationRequestHttp = match serde_json::from_value(verified.body.clone()) {
        Ok(payload) => payload,
        Err(_) => return AuthError::MalformedBody.into_response(),
    };

    info!(
        event = "negotiate_request_received",
        item_id = %payload.item_id,
        bid_amount = payload.bid_amount,
        agent_did = %verified.agent_did,
        "forwarding to core"
    );

    let mut grpc_request = tonic::Request::new(pb::NegotiateRequest {
        request_id: request_id.clone(),
        item_id: payload.item_id,
        bid_amount: payload.bid_amount,
        currency_code: payload.currency,
        agent: Some(pb::AgentIdentity {
            // The verified DID from the signature headers, never the body.
            did: verified.agent_did,
            reputation_score: 1.0,
        }),
    });
    attach_request_id(&mut grpc_request, &request_id);

    let span = request_span(&request_id);
    let result = async {
        state.negotiation_client().negotiate(grpc_request).await
    }
    .instrument(span)
    .await;

    let response = match result {
        Ok(response) => response.into_inner(),
        Err(status) => return grpc_error(status),
    };

    let mut output = json!({
        "session_token": response.session_token,
        "valid_until": response.valid_until_timestamp,
    });

    match response.result {
        Some(pb::negotiate_response::Result::Accepted(accepted)) => {
            output["status"] = json!("accepted");
            let mut data = json!({ "final_price": accepted.final_price });
            if let Some(instructions) = accepted.crypto_payment {
                data["crypto_payment_instructions"] = json!({
                    "deal_id": instructions.deal_id,
                    "wallet_address": instructions.wallet_address,
                    "amount": instructions.amount,
                    "currency": instructions.currency,
                    "memo": instructions.memo,
                    "network": instructions.network,
                    "expires_at": instructions.expires_at,
                });
            } else {
                data["reservation_code"] = json!(accepted.reservation_code);
            }
            output["data"] = data;
            info!(event = "negotiation_accepted", final_price = accepted.final_price, "done");
        }
        Some(pb::negotiate_response::Result::Countered(countered)) => {
            output["status"] = json!("countered");
            output["data"] = json!({
                "proposed_price": countered.proposed_price,
                "message": countered.human_message,
                "reason_code": countered.reason_code,
            });
            info!(event = "negotiation_countered", proposed_price = countered.proposed_price, "done");
        }
        Some(pb::negotiate_response::Result::Rejected(rejected)) => {
            output["status"] = json!("rejected");
            output["data"] = json!({ "reason_code": rejected.reason_code });
            info!(event = "negotiation_rejected", "done");
        }
        Some(pb::negotiate_response::Result::UiRequired(ui)) => {
            output["status"] = json!("ui_required");
            output["action_required"] = json!({
                "template": ui.template_id,
                "context": ui.context_data,
            });
            info!(event = "negotiation_ui_required", template_id = %ui.template_id, "done");
        }
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "Core service error" })),
            )
                .into_response();
        }
    }

    Json(output).into_response()
}

#[derive(Deserialize)]
struct SearchRequestHttp {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: u32,
}

fn default_search_limit() -> u32 {
    3
}

async fn search(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let verified = match authed(&state, &headers, "POST", "/v1/search", &body) {
        Ok(verified) => verified,
        Err(e) => return e.into_response(),
    };
    let payload: SearchRequestHttp = match serde_json::from_value(verified.body.clone()) {
        Ok(payload) => payload,
        Err(_) => return AuthError::MalformedBody.into_response(),
    };

    info!(
        event = "search_request_received",
        query = %payload.query,
        limit = payload.limit,
        "forwarding to core"
    );

    let mut grpc_request = tonic::Request::new(pb::SearchRequest {
        query: payload.query,
        limit: payload.limit,
        min_similarity: 0.0,
    });
    attach_request_id(&mut grpc_request, &request_id);

    match state.negotiation_client().search(grpc_request).await {
        Ok(response) => {
            let results: Vec<serde_json::Value> = response
                .into_inner()
                .results
                .into_iter()
                .map(|r| {
                    json!({
                        "id": r.item_id,
                        "name": r.name,
                        "price": r.base_price,
                        "score": (r.similarity_score * 10_000.0).round() / 10_000.0,
                        "details": r.description_snippet,
                    })
                })
                .collect();
            info!(event = "search_completed", result_count = results.len(), "done");
            Json(json!({ "results": results })).into_response()
        }
        Err(status) => grpc_error(status),
    }
}

async fn system_status(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = authed(&state, &headers, "GET", "/v1/system/status", b"") {
        return e.into_response();
    }

    let mut grpc_request = tonic::Request::new(pb::SystemStatusRequest {});
    attach_request_id(&mut grpc_request, &request_id);

    match state.negotiation_client().get_system_status(grpc_request).await {
        Ok(response) => {
            let status = response.into_inner();
            Json(json!({
                "status": status.status,
                "cpu_usage_percent": status.cpu_usage_percent,
                "memory_usage_mb": status.memory_usage_mb,
                "timestamp": status.timestamp,
                "cached": status.cached,
            }))
            .into_response()
        }
        Err(status) => grpc_error(status),
    }
}

fn attach_request_id<T>(request: &mut tonic::Request<T>, request_id: &str) {
    if let Ok(value) = request_id.parse() {
        request
            .metadata_mut()
            .insert(REQUEST_ID_METADATA_KEY, value);
    }
    request.set_timeout(CORE_RPC_DEADLINE);
}
