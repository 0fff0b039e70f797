//! # Structured Reasoner
//!
//! Calls an external model and constrains the reply to the intent schema.
//! Any transport or decode failure becomes a tagged failure intent; the
//! membrane turns it into a safe counter.

use aura_types::{HiveContext, Intent};
use std::collections::BTreeMap;
use tracing::{error, info};

use super::llm::{economic_context, parse_decision, LlmClient, LlmDecision};
use super::reflective_tuning;
use crate::config::LlmSettings;

const SYSTEM_PROMPT: &str = "You are Aura, an autonomous sales negotiator for a travel \
marketplace. Decide how to answer the buyer's bid using the economic context. Protect \
margin, trade perks instead of price where it helps, and stay professional. Respond with \
a single JSON object: {\"thought\": string (internal analysis, never shown to the buyer), \
\"action\": \"accept\"|\"counter\"|\"reject\"|\"escalate\", \"price\": number, \
\"message\": string (what the buyer reads)}. Obey every entry in system_constraints.";

/// LLM-backed strategy with schema-constrained output.
pub struct StructuredReasoner {
    client: LlmClient,
    settings: LlmSettings,
}

impl StructuredReasoner {
    /// Build against the configured provider.
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: LlmClient::new(&settings.api_base, &settings.api_key),
            settings: settings.clone(),
        }
    }

    /// Ask the model for a decision.
    pub async fn think(&self, ctx: &HiveContext) -> Intent {
        let (model, temperature, constraints) =
            reflective_tuning(&self.settings, &self.settings.model, ctx);
        let user = economic_context(ctx, &constraints).to_string();

        let content = match self.client.chat(&model, temperature, SYSTEM_PROMPT, &user).await {
            Ok(content) => content,
            Err(e) => {
                error!(event = "transformer_error", error = %e, "llm call failed");
                return Intent::failure(e.to_string());
            }
        };

        match parse_decision(&content) {
            Ok(decision) => {
                info!(
                    event = "transformer_thought_complete",
                    action = %decision.action,
                    price = decision.price,
                    "decision parsed"
                );
                decision_to_intent(decision)
            }
            Err(e) => {
                error!(event = "transformer_parse_error", error = %e, "unusable completion");
                Intent::failure(e.to_string())
            }
        }
    }
}

/// Map a parsed decision to an intent; unknown actions are failures.
pub(crate) fn decision_to_intent(decision: LlmDecision) -> Intent {
    match decision.action.as_str() {
        "accept" => Intent::accept(decision.price, decision.message, decision.thought),
        "counter" => Intent::counter(
            decision.price,
            decision.message,
            decision.thought,
            aura_types::reason::NEGOTIATION_ONGOING,
        ),
        "reject" => {
            let mut intent =
                Intent::reject(aura_types::reason::OFFER_TOO_LOW, decision.thought);
            intent.message = decision.message;
            intent
        }
        "escalate" | "ui_required" => Intent::escalate(
            super::rule::HIGH_VALUE_TEMPLATE,
            BTreeMap::from([("reason".to_string(), decision.message)]),
            decision.thought,
        ),
        other => Intent::failure(format!("unknown action '{other}'")),
    }
}
