//! # Gateway Errors
//!
//! HTTP-facing error taxonomy. Auth failures render as 401 with a reason
//! string; malformed bodies as 400; upstream gRPC statuses map onto the
//! HTTP codes the API contract promises. Nothing here ever echoes key
//! material, floor prices, or secrets.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Operational gateway errors (startup and upstream plumbing).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream channel could not be built.
    #[error("core endpoint invalid: {0}")]
    Endpoint(String),
}

/// Signature-layer rejections (all 401 except malformed bodies).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// One or more of the three auth headers is absent.
    #[error("Missing required security headers: {}", .0.join(", "))]
    MissingHeaders(Vec<&'static str>),

    /// DID malformed or key bytes invalid.
    #[error("Invalid DID format: {0}. Expected format: did:key:public_key_hex")]
    InvalidDid(String),

    /// Timestamp not a decimal Unix-seconds string.
    #[error("Invalid timestamp format: {0}. Expected Unix timestamp")]
    InvalidTimestamp(String),

    /// Timestamp outside the replay window.
    #[error(
        "Request timestamp too old or in future. Current: {current}, Request: {request}, \
         Difference: {diff}s (max {max} allowed)"
    )]
    ReplayWindow {
        /// Server clock at verification time.
        current: u64,
        /// Client-claimed timestamp.
        request: u64,
        /// Absolute skew.
        diff: u64,
        /// Configured tolerance.
        max: u64,
    },

    /// Signature is not a hex-encoded Ed25519 signature.
    #[error("Invalid signature format. Expected a hex-encoded string.")]
    SignatureFormat,

    /// Signature did not verify.
    #[error("Invalid signature - request may have been tampered with")]
    InvalidSignature,

    /// Body is not valid JSON.
    #[error("Invalid JSON body")]
    MalformedBody,
}

impl AuthError {
    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Map an upstream gRPC status onto the documented HTTP semantics.
pub fn grpc_status_to_http(status: &tonic::Status) -> (StatusCode, String) {
    let code = match status.code() {
        tonic::Code::InvalidArgument => StatusCode::BAD_REQUEST,
        tonic::Code::NotFound => StatusCode::NOT_FOUND,
        tonic::Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        tonic::Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let detail = match code {
        StatusCode::INTERNAL_SERVER_ERROR => "Core service error".to_string(),
        _ => status.message().to_string(),
    };
    (code, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_headers_lists_them() {
        let err = AuthError::MissingHeaders(vec!["X-Agent-ID", "X-Signature"]);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        let message = err.to_string();
        assert!(message.contains("X-Agent-ID"));
        assert!(message.contains("X-Signature"));
    }

    #[test]
    fn test_replay_window_includes_diff() {
        let err = AuthError::ReplayWindow {
            current: 1_700_000_120,
            request: 1_700_000_000,
            diff: 120,
            max: 60,
        };
        assert!(err.to_string().contains("120s"));
        assert!(err.to_string().contains("max 60"));
    }

    #[test]
    fn test_malformed_body_is_400() {
        assert_eq!(AuthError::MalformedBody.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_grpc_mapping() {
        let (code, _) = grpc_status_to_http(&tonic::Status::unavailable("init"));
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        let (code, _) = grpc_status_to_http(&tonic::Status::invalid_argument("bad"));
        assert_eq!(code, StatusCode::BAD_REQUEST);
        let (code, detail) = grpc_status_to_http(&tonic::Status::internal("boom"));
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail, "Core service error");
    }
}
