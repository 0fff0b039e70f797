//! # Gateway State
//!
//! Shared state for the handlers: configuration plus a lazily-connected
//! gRPC channel to the core. Clients are cheap per-request views over the
//! shared channel.

use aura_proto::negotiation::negotiation_service_client::NegotiationServiceClient;
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_client::HealthClient;

use crate::config::GatewaySettings;
use crate::error::GatewayError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded settings.
    pub settings: Arc<GatewaySettings>,
    channel: Channel,
}

impl AppState {
    /// Build the state with a lazy channel: the gateway starts even while
    /// the core is down, and `/readyz` reports the truth.
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let channel = Endpoint::from_shared(settings.gateway.core_endpoint.clone())
            .map_err(|e| GatewayError::Endpoint(e.to_string()))?
            .connect_lazy();
        Ok(Self {
            settings: Arc::new(settings),
            channel,
        })
    }

    /// Negotiation client view.
    pub fn negotiation_client(&self) -> NegotiationServiceClient<Channel> {
        NegotiationServiceClient::new(self.channel.clone())
    }

    /// gRPC health client view.
    pub fn health_client(&self) -> HealthClient<Channel> {
        HealthClient::new(self.channel.clone())
    }
}
