//! # Aura Gateway
//!
//! Signed HTTP ingress for the negotiation core.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    AURA GATEWAY (HTTP)                   │
//! ├──────────────────────────────────────────────────────────┤
//! │  request-id middleware → signature verification (Ed25519)│
//! │        → 1:1 mapping onto the core's gRPC surface        │
//! ├──────────────────────────────────────────────────────────┤
//! │  /v1/negotiate  /v1/search  /v1/system/status  (signed)  │
//! │  /healthz  /readyz  /health                   (open)     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers only ever use the verified DID from the signature headers;
//! a client-supplied `agent_did` body field is never trusted.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod routes;
pub mod security;
pub mod state;

pub use config::GatewaySettings;
pub use error::GatewayError;
pub use state::AppState;

/// Crate version, reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
