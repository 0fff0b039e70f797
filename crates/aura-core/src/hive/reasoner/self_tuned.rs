//! # Self-Tuned Reasoner
//!
//! Wraps a compiled prompting module: instructions plus worked examples
//! produced by an offline optimization run, stored as a JSON artifact. Its
//! schema is a superset of the structured reasoner's, with an auxiliary
//! chain-of-thought `thought` field the demos exercise explicitly.
//!
//! Parse failures fall back to the rule reasoner for that request only;
//! transport failures surface as tagged failure intents like the
//! structured strategy.

use aura_types::{HiveContext, Intent};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::llm::{economic_context, parse_decision, LlmClient};
use super::rule::RuleReasoner;
use super::structured::decision_to_intent;
use super::reflective_tuning;
use crate::config::LlmSettings;

/// Model serving the compiled module; `llm.model` holds the strategy
/// selector (`"dspy"`) in this mode, not a model id.
const TUNED_BASE_MODEL: &str = "mistral/mistral-large-latest";

const UNTRAINED_INSTRUCTIONS: &str = "You are Aura, an autonomous sales negotiator. Work \
through the economics step by step in the `thought` field before deciding, then act. \
Respond with a single JSON object: {\"thought\": string, \"action\": \
\"accept\"|\"counter\"|\"reject\"|\"escalate\", \"price\": number, \"message\": string}. \
Obey every entry in system_constraints.";

/// One worked example from the compiled artifact.
#[derive(Clone, Debug, Deserialize)]
pub struct Demo {
    /// Example economic context.
    pub context: serde_json::Value,
    /// The chain-of-thought the optimizer kept.
    pub thought: String,
    /// The decision JSON the optimizer kept.
    pub decision: serde_json::Value,
}

/// The compiled prompting module.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompiledProgram {
    /// Tuned instruction text.
    #[serde(default)]
    pub instructions: String,
    /// Few-shot demos.
    #[serde(default)]
    pub demos: Vec<Demo>,
}

/// Self-optimizing strategy with rule fallback.
pub struct SelfTunedReasoner {
    client: LlmClient,
    settings: LlmSettings,
    program: CompiledProgram,
    fallback: RuleReasoner,
}

impl SelfTunedReasoner {
    /// Load the compiled artifact; a missing or corrupt file degrades to the
    /// untrained instructions rather than failing startup.
    pub async fn load(settings: &LlmSettings, fallback: RuleReasoner) -> Self {
        let program = match tokio::fs::read(&settings.compiled_program_path).await {
            Ok(bytes) => match serde_json::from_slice::<CompiledProgram>(&bytes) {
                Ok(program) => {
                    info!(
                        event = "compiled_program_loaded",
                        path = %settings.compiled_program_path,
                        demos = program.demos.len(),
                        "self-tuned module ready"
                    );
                    program
                }
                Err(e) => {
                    error!(
                        event = "compiled_program_corrupt",
                        path = %settings.compiled_program_path,
                        error = %e,
                        "using untrained module"
                    );
                    CompiledProgram::default()
                }
            },
            Err(e) => {
                warn!(
                    event = "compiled_program_not_found",
                    path = %settings.compiled_program_path,
                    error = %e,
                    "using untrained module"
                );
                CompiledProgram::default()
            }
        };

        Self {
            client: LlmClient::new(&settings.api_base, &settings.api_key),
            settings: settings.clone(),
            program,
            fallback,
        }
    }

    /// Construct directly from an in-memory program (tests).
    pub fn with_program(
        settings: &LlmSettings,
        program: CompiledProgram,
        fallback: RuleReasoner,
    ) -> Self {
        Self {
            client: LlmClient::new(&settings.api_base, &settings.api_key),
            settings: settings.clone(),
            program,
            fallback,
        }
    }

    fn system_prompt(&self) -> String {
        let instructions = if self.program.instructions.is_empty() {
            UNTRAINED_INSTRUCTIONS
        } else {
            &self.program.instructions
        };
        let mut prompt = instructions.to_string();
        for demo in &self.program.demos {
            prompt.push_str("\n\n# Example\nContext: ");
            prompt.push_str(&demo.context.to_string());
            prompt.push_str("\nThought: ");
            prompt.push_str(&demo.thought);
            prompt.push_str("\nDecision: ");
            prompt.push_str(&demo.decision.to_string());
        }
        prompt
    }

    /// Ask the compiled module for a decision.
    pub async fn think(&self, ctx: &HiveContext) -> Intent {
        let (model, temperature, constraints) =
            reflective_tuning(&self.settings, TUNED_BASE_MODEL, ctx);
        let user = economic_context(ctx, &constraints).to_string();
        let system = self.system_prompt();

        let content = match self.client.chat(&model, temperature, &system, &user).await {
            Ok(content) => content,
            Err(e) => {
                error!(event = "self_tuned_transport_error", error = %e, "llm call failed");
                return Intent::failure(e.to_string());
            }
        };

        match parse_decision(&content) {
            Ok(decision) => decision_to_intent(decision),
            Err(e) => {
                warn!(
                    event = "self_tuned_parse_fallback",
                    error = %e,
                    "falling back to rule reasoner for this request"
                );
                self.fallback.think(ctx)
            }
        }
    }
}
