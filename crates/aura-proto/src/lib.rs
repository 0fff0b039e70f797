//! # Aura Proto
//!
//! Generated gRPC contract for the negotiation service. The `.proto` source
//! under `proto/` is the wire-level source of truth; this crate only
//! re-exports what `tonic-build` generates.

/// Generated types for `aura.negotiation.v1`.
pub mod negotiation {
    #![allow(missing_docs)]
    #![allow(clippy::all)]
    tonic::include_proto!("aura.negotiation.v1");
}

/// gRPC metadata key carrying the request id across the boundary.
pub const REQUEST_ID_METADATA_KEY: &str = "x-request-id";
