//! # RPC Surface
//!
//! The core's gRPC services: `NegotiationService` and the standard gRPC
//! Health v1 protocol. All handlers bind the inbound `x-request-id`
//! metadata to the logging context and release it on every exit path
//! (span-guard semantics).

pub mod health;
pub mod negotiation;

pub use health::DbHealth;
pub use negotiation::NegotiationRpc;

use aura_proto::negotiation::negotiation_service_server::NegotiationServiceServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic_health::pb::health_server::HealthServer;

use crate::context::AppContext;

/// Serve both services until shutdown.
pub async fn serve(ctx: Arc<AppContext>, addr: SocketAddr) -> Result<(), tonic::transport::Error> {
    tracing::info!(
        event = "server_started",
        %addr,
        services = "NegotiationService,Health",
        "gRPC server listening"
    );
    tonic::transport::Server::builder()
        .add_service(HealthServer::new(DbHealth::new(Arc::clone(&ctx))))
        .add_service(NegotiationServiceServer::new(NegotiationRpc::new(ctx)))
        .serve(addr)
        .await
}
