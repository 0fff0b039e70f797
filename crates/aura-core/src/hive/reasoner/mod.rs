//! # Reasoner (T)
//!
//! Pluggable `think(HiveContext) -> Intent`. Selection is a closed enum
//! driven by `llm.model` — no dynamic loading:
//!
//! - `"rule"` → [`RuleReasoner`], fully deterministic
//! - `"dspy"` → [`SelfTunedReasoner`], compiled prompt artifact + CoT
//! - anything else → [`StructuredReasoner`] against that model id
//!
//! Failures never escape as errors: a broken reasoner yields a tagged
//! failure intent which the membrane rewrites into a safe counter.

pub mod llm;
pub mod rule;
pub mod self_tuned;
pub mod structured;

pub use llm::{LlmClient, LlmDecision};
pub use rule::RuleReasoner;
pub use self_tuned::SelfTunedReasoner;
pub use structured::StructuredReasoner;

use aura_types::{reason, HiveContext, Intent};
use tracing::{info, warn};

use crate::config::{LlmSettings, LogicSettings};

/// CPU percentage beyond which the reasoner self-downgrades for the request.
pub const HIGH_LOAD_CPU_PERCENT: f64 = 80.0;

/// Constraint line surfaced to the model while the cluster runs hot.
pub const HIGH_LOAD_CONSTRAINT: &str =
    "SYSTEM_LOAD_HIGH: Be extremely concise and prioritize finishing the deal quickly.";

/// Sampling temperature used under high load.
pub const HIGH_LOAD_TEMPERATURE: f64 = 0.1;

/// The closed set of reasoning strategies.
pub enum Reasoner {
    /// Deterministic rule ladder.
    Rule(RuleReasoner),
    /// Structured LLM output.
    Structured(StructuredReasoner),
    /// Compiled self-optimizing module with rule fallback.
    SelfTuned(SelfTunedReasoner),
}

impl Reasoner {
    /// Build the reasoner selected by configuration.
    ///
    /// The self-tuned variant loads its compiled artifact from disk here,
    /// which is why construction is async (and why the server defers
    /// readiness until this completes).
    pub async fn from_settings(llm: &LlmSettings, logic: &LogicSettings) -> Self {
        match llm.model.as_str() {
            "rule" => {
                info!(event = "strategy_selected", kind = "rule", "reasoner ready");
                Reasoner::Rule(RuleReasoner::new(logic.trigger_price))
            }
            "dspy" => {
                info!(event = "strategy_selected", kind = "self_tuned", "loading compiled program");
                Reasoner::SelfTuned(
                    SelfTunedReasoner::load(llm, RuleReasoner::new(logic.trigger_price)).await,
                )
            }
            model => {
                info!(event = "strategy_selected", kind = "structured", model, "reasoner ready");
                Reasoner::Structured(StructuredReasoner::new(llm))
            }
        }
    }

    /// Pick an intent for the context. Never errors.
    #[tracing::instrument(
        name = "reasoner_think",
        skip_all,
        fields(item_id = %ctx.item_id, request_id = %ctx.request_id)
    )]
    pub async fn think(&self, ctx: &HiveContext) -> Intent {
        // A missing item means the same thing to every strategy.
        if ctx.item.is_none() {
            warn!(event = "reasoner_item_missing", item_id = %ctx.item_id, "rejecting unknown item");
            return Intent::reject(
                reason::ITEM_NOT_FOUND,
                format!("No catalog entry for '{}'.", ctx.item_id),
            );
        }

        match self {
            Reasoner::Rule(inner) => inner.think(ctx),
            Reasoner::Structured(inner) => inner.think(ctx).await,
            Reasoner::SelfTuned(inner) => inner.think(ctx).await,
        }
    }
}

/// Self-reflective tuning shared by the LLM-backed strategies: under high
/// CPU load, downgrade to the cheaper model, drop the temperature, and tell
/// the model to be brief.
pub(crate) fn reflective_tuning(
    llm: &LlmSettings,
    model: &str,
    ctx: &HiveContext,
) -> (String, f64, Vec<String>) {
    let cpu = ctx.system_health.cpu_usage_percent;
    if cpu > HIGH_LOAD_CPU_PERCENT {
        warn!(event = "high_cpu_reflection", cpu_load = cpu, "downgrading model for this request");
        (
            llm.fallback_model.clone(),
            HIGH_LOAD_TEMPERATURE,
            vec![HIGH_LOAD_CONSTRAINT.to_string()],
        )
    } else {
        (model.to_string(), llm.temperature, Vec::new())
    }
}
