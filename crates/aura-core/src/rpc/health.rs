//! # gRPC Health Service
//!
//! Standard `grpc.health.v1.Health` implementation. `Check` verifies the
//! primary store with `SELECT 1` on every call and reports NOT_SERVING
//! until the metabolism is installed; `Watch` is unimplemented (clients
//! poll).

use futures::stream::BoxStream;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::Health;
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};
use tracing::{debug, error};

use crate::context::AppContext;
use crate::store::postgres;

/// Health service backed by a database probe.
pub struct DbHealth {
    ctx: Arc<AppContext>,
}

impl DbHealth {
    /// Wrap the application context.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    async fn serving(&self) -> ServingStatus {
        if !self.ctx.is_ready() {
            return ServingStatus::NotServing;
        }
        match self.ctx.pool() {
            None => ServingStatus::Serving,
            Some(pool) => match postgres::select_one(pool).await {
                Ok(()) => {
                    debug!(event = "health_check_passed", component = "database", "SELECT 1 ok");
                    ServingStatus::Serving
                }
                Err(e) => {
                    error!(event = "health_check_failed", error = %e, "database unreachable");
                    ServingStatus::NotServing
                }
            },
        }
    }
}

#[tonic::async_trait]
impl Health for DbHealth {
    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let status = self.serving().await;
        Ok(Response::new(HealthCheckResponse {
            status: status as i32,
        }))
    }

    type WatchStream = BoxStream<'static, Result<HealthCheckResponse, Status>>;

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented("health status streaming not implemented"))
    }
}
