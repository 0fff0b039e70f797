//! # Negotiation Service
//!
//! gRPC entry points into the metabolism, search, system status, and deal
//! resolution. Error policy: no unhandled error crosses this boundary, and
//! no response ever carries floor prices, internal costs, or sealed
//! secrets that have not been paid for.

use aura_proto::negotiation as pb;
use aura_proto::negotiation::negotiation_service_server::NegotiationService;
use aura_proto::REQUEST_ID_METADATA_KEY;
use aura_telemetry::request_span;
use aura_types::StoreError;
use std::str::FromStr;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::CoreError;
use crate::hive::NegotiateSignal;
use crate::market::{DealResolution, MarketError};

/// Message returned while the reasoner is still loading.
pub const INITIALIZING_MESSAGE: &str = "Metabolism is still initializing";

/// Default search result count when the request leaves it unset.
const DEFAULT_SEARCH_LIMIT: u32 = 5;

/// The core's `NegotiationService` implementation.
pub struct NegotiationRpc {
    ctx: Arc<AppContext>,
}

impl NegotiationRpc {
    /// Wrap the application context.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    fn request_id<T>(request: &Request<T>, fallback: &str) -> String {
        if let Some(value) = request
            .metadata()
            .get(REQUEST_ID_METADATA_KEY)
            .and_then(|v| v.to_str().ok())
        {
            if !value.is_empty() {
                return value.to_string();
            }
        }
        if !fallback.is_empty() {
            return fallback.to_string();
        }
        Uuid::new_v4().to_string()
    }
}

fn core_error_to_status(err: CoreError) -> Status {
    match err {
        CoreError::InvalidBid(msg) => Status::invalid_argument(msg),
        CoreError::Store(StoreError::NotFound(msg)) => Status::not_found(msg),
        CoreError::Store(e) => {
            error!(event = "db_error", error = %e, "storage failure");
            Status::internal("storage unavailable")
        }
        CoreError::Market(e) => {
            error!(event = "market_error", error = %e, "market failure");
            Status::internal("market unavailable")
        }
        CoreError::Embeddings(msg) => {
            error!(event = "embedding_generation_failed", error = %msg, "embeddings failure");
            Status::internal("Failed to generate embeddings")
        }
        CoreError::Config(msg) => {
            error!(event = "config_error", error = %msg, "configuration failure");
            Status::internal("configuration error")
        }
    }
}

#[tonic::async_trait]
impl NegotiationService for NegotiationRpc {
    async fn negotiate(
        &self,
        request: Request<pb::NegotiateRequest>,
    ) -> Result<Response<pb::NegotiateResponse>, Status> {
        let inner_id = request.get_ref().request_id.clone();
        let request_id = Self::request_id(&request, &inner_id);
        let span = request_span(&request_id);

        async {
            let _permit = self
                .ctx
                .try_acquire_worker()
                .map_err(|_| Status::unavailable("worker budget exhausted"))?;

            let Some(metabolism) = self.ctx.metabolism() else {
                return Err(Status::unavailable(INITIALIZING_MESSAGE));
            };

            let req = request.into_inner();
            info!(
                event = "negotiate_request_received",
                item_id = %req.item_id,
                bid_amount = req.bid_amount,
                "request admitted"
            );

            let agent = req.agent.unwrap_or_default();
            let signal = NegotiateSignal {
                item_id: req.item_id,
                bid_amount: req.bid_amount,
                agent_did: agent.did,
                reputation: agent.reputation_score,
                request_id: request_id.clone(),
            };

            let response = metabolism
                .execute(signal)
                .await
                .map_err(core_error_to_status)?;

            info!(
                event = "negotiate_response_sent",
                session_token = %response.session_token,
                "response ready"
            );
            Ok(Response::new(response))
        }
        .instrument(span)
        .await
    }

    async fn search(
        &self,
        request: Request<pb::SearchRequest>,
    ) -> Result<Response<pb::SearchResponse>, Status> {
        let request_id = Self::request_id(&request, "");
        let span = request_span(&request_id);

        async {
            let req = request.into_inner();
            info!(event = "search_started", query = %req.query, limit = req.limit, "searching");

            let query_vector = self
                .ctx
                .embeddings()
                .embed(&req.query)
                .await
                .map_err(|e| core_error_to_status(CoreError::Embeddings(e.to_string())))?;

            let limit = if req.limit == 0 {
                DEFAULT_SEARCH_LIMIT
            } else {
                req.limit
            } as usize;
            let min_similarity = (req.min_similarity > 0.0).then_some(req.min_similarity);

            let hits = self
                .ctx
                .items()
                .search(&query_vector, limit, min_similarity)
                .await
                .map_err(|e| core_error_to_status(CoreError::Store(e)))?;

            let results: Vec<pb::SearchResultItem> = hits
                .into_iter()
                .map(|hit| pb::SearchResultItem {
                    item_id: hit.item_id,
                    name: hit.name,
                    base_price: hit.base_price,
                    similarity_score: hit.similarity,
                    description_snippet: hit.snippet,
                })
                .collect();

            info!(event = "search_completed", result_count = results.len(), "done");
            Ok(Response::new(pb::SearchResponse { results }))
        }
        .instrument(span)
        .await
    }

    async fn get_system_status(
        &self,
        _request: Request<pb::SystemStatusRequest>,
    ) -> Result<Response<pb::SystemStatusResponse>, Status> {
        let health = self.ctx.telemetry().system_health().await;
        Ok(Response::new(pb::SystemStatusResponse {
            status: health.status.as_str().to_string(),
            cpu_usage_percent: health.cpu_usage_percent,
            memory_usage_mb: health.memory_usage_mb,
            timestamp: health.timestamp,
            cached: health.cached,
        }))
    }

    async fn check_deal_status(
        &self,
        request: Request<pb::CheckDealStatusRequest>,
    ) -> Result<Response<pb::CheckDealStatusResponse>, Status> {
        let request_id = Self::request_id(&request, "");
        let span = request_span(&request_id);

        async {
            let Some(market) = self.ctx.market() else {
                return Err(Status::unimplemented("crypto payments are disabled"));
            };

            let req = request.into_inner();
            let deal_id = Uuid::from_str(&req.deal_id)
                .map_err(|_| Status::invalid_argument("deal_id must be a UUID"))?;

            let resolution = market.check_status(deal_id).await.map_err(|e| match e {
                MarketError::Store(StoreError::Unavailable(msg)) => {
                    error!(event = "db_error", error = %msg, "deal store unavailable");
                    Status::internal("storage unavailable")
                }
                other => {
                    error!(event = "market_error", error = %other, "deal resolution failed");
                    Status::internal("deal resolution failed")
                }
            })?;

            let response = match resolution {
                DealResolution::NotFound => pb::CheckDealStatusResponse {
                    status: "NOT_FOUND".to_string(),
                    ..Default::default()
                },
                DealResolution::Expired => pb::CheckDealStatusResponse {
                    status: "EXPIRED".to_string(),
                    ..Default::default()
                },
                DealResolution::Pending { instructions } => pb::CheckDealStatusResponse {
                    status: "PENDING".to_string(),
                    payment_instructions: Some(pb::CryptoPaymentInstructions {
                        deal_id: instructions.deal_id.to_string(),
                        wallet_address: instructions.wallet_address,
                        amount: instructions.amount,
                        currency: instructions.currency.as_str().to_string(),
                        memo: instructions.memo,
                        network: instructions.network,
                        expires_at: instructions.expires_at,
                    }),
                    ..Default::default()
                },
                DealResolution::Paid { secret, proof } => pb::CheckDealStatusResponse {
                    status: "PAID".to_string(),
                    secret: Some(pb::DealSecret {
                        reservation_code: secret.reservation_code,
                        item_name: secret.item_name,
                        final_price: secret.final_price,
                        paid_at: secret.paid_at,
                    }),
                    proof: Some(pb::PaymentProof {
                        transaction_hash: proof.tx_hash,
                        block_number: proof.block,
                        from_address: proof.from_address,
                        confirmed_at: proof.confirmed_at.timestamp(),
                    }),
                    ..Default::default()
                },
            };
            Ok(Response::new(response))
        }
        .instrument(span)
        .await
    }
}
