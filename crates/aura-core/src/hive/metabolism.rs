//! # Metabolic Loop
//!
//! Orchestrates the fixed stage order for one request:
//!
//! ```text
//! Signal -> Membrane(In) -> Aggregator(A) -> Reasoner(T)
//!        -> Membrane(Out) -> Connector(C) -> Emitter(G)
//! ```
//!
//! The emitter runs fire-and-forget relative to the RPC response; every
//! other stage is awaited in order. Cancellation propagates naturally: a
//! dropped future short-circuits the remaining stages at the next await.

use aura_proto::negotiation as pb;
use aura_telemetry::{NEGOTIATIONS_TOTAL, STAGE_DURATION};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{
    HiveAggregator, HiveConnector, HiveEmitter, Membrane, NegotiateSignal, Reasoner,
};
use crate::error::CoreError;

/// The pipeline orchestrator.
pub struct MetabolicLoop {
    aggregator: HiveAggregator,
    reasoner: Reasoner,
    membrane: Membrane,
    connector: HiveConnector,
    emitter: Arc<HiveEmitter>,
}

impl MetabolicLoop {
    /// Wire the five stages. Construction-time wiring only; stages hold no
    /// references back into the loop.
    pub fn new(
        aggregator: HiveAggregator,
        reasoner: Reasoner,
        membrane: Membrane,
        connector: HiveConnector,
        emitter: Arc<HiveEmitter>,
    ) -> Self {
        Self {
            aggregator,
            reasoner,
            membrane,
            connector,
            emitter,
        }
    }

    /// Execute one full metabolic cycle.
    #[tracing::instrument(name = "hive_metabolism", skip_all, fields(request_id = %signal.request_id))]
    pub async fn execute(&self, mut signal: NegotiateSignal) -> Result<pb::NegotiateResponse, CoreError> {
        info!(event = "metabolism_cycle_started", item_id = %signal.item_id, "cycle begin");

        // 1. Membrane (inbound): filter and sanitize.
        self.membrane
            .inspect_inbound(&mut signal)
            .map_err(|v| CoreError::InvalidBid(v.to_string()))?;

        // 2. Aggregator: perceive.
        let timer = Instant::now();
        let ctx = self.aggregator.perceive(&signal).await;
        observe_stage("aggregator", timer);

        // 3. Reasoner: think.
        let timer = Instant::now();
        let intent = self.reasoner.think(&ctx).await;
        observe_stage("reasoner", timer);

        // 4. Membrane (outbound): guard.
        let timer = Instant::now();
        let safe = self.membrane.inspect_outbound(intent.clone(), &ctx);
        observe_stage("membrane", timer);
        if safe != intent {
            info!(
                event = "membrane_override_applied",
                original_price = intent.price,
                safe_price = safe.price,
                "intent rewritten"
            );
        }

        // 5. Connector: act.
        let timer = Instant::now();
        let (response, observation) = self.connector.act(&safe, &ctx).await;
        observe_stage("connector", timer);

        // 6. Emitter: pulse, decoupled from the response path. The bus is
        //    bounded, so the spawned task cannot linger unboundedly.
        let emitter = Arc::clone(&self.emitter);
        tokio::spawn(async move {
            emitter.pulse(&observation).await;
        });

        NEGOTIATIONS_TOTAL
            .with_label_values(&[safe.action.as_str()])
            .inc();
        info!(
            event = "metabolism_cycle_completed",
            action = %safe.action.as_str(),
            price = safe.price,
            "cycle end"
        );
        Ok(response)
    }
}

fn observe_stage(stage: &str, start: Instant) {
    STAGE_DURATION
        .with_label_values(&[stage])
        .observe(start.elapsed().as_secs_f64());
}
