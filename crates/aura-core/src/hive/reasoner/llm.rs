//! # LLM Transport
//!
//! Thin chat-completions client shared by the structured and self-tuned
//! strategies, plus the prompt-context builder.
//!
//! The economic context handed to a model excludes infrastructure detail
//! except the short `system_constraints` list, and it never includes the
//! floor price: nothing a model can echo into `message` may leak it. The
//! membrane's DLP rule stays as the backstop.

use aura_types::HiveContext;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Deadline for a reasoner call.
pub const LLM_DEADLINE: Duration = Duration::from_secs(30);

/// Transport and decoding errors from the model endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP-level failure (connect, timeout, non-2xx).
    #[error("llm request failed: {0}")]
    Transport(String),

    /// Response did not contain a usable completion.
    #[error("llm response malformed: {0}")]
    Malformed(String),

    /// Completion content failed to parse into a decision.
    #[error("llm decision unparseable: {0}")]
    Unparseable(String),
}

/// The structured decision every LLM strategy must produce.
#[derive(Clone, Debug, Deserialize)]
pub struct LlmDecision {
    /// Internal strategic analysis; not shown to the buyer.
    #[serde(default, alias = "reasoning")]
    pub thought: String,
    /// One of accept/counter/reject/escalate.
    pub action: String,
    /// Price for priced actions.
    #[serde(default)]
    pub price: f64,
    /// Buyer-facing message.
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Chat-completions client.
pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl LlmClient {
    /// Build against an OpenAI-compatible API base.
    pub fn new(api_base: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(LLM_DEADLINE)
                .build()
                .unwrap_or_default(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// One system+user completion, JSON-object response format.
    pub async fn chat(
        &self,
        model: &str,
        temperature: f64,
        system: &str,
        user: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": strip_provider(model),
            "temperature": temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("empty choices".to_string()))
    }
}

/// Parse a completion into a decision, tolerating code-fence wrapping.
pub fn parse_decision(content: &str) -> Result<LlmDecision, LlmError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed).map_err(|e| LlmError::Unparseable(e.to_string()))
}

/// Build the economic context JSON a model is allowed to see.
pub fn economic_context(ctx: &HiveContext, constraints: &[String]) -> serde_json::Value {
    let item = ctx.item.as_ref();
    json!({
        "input_bid": ctx.offer.bid_amount,
        "base_price": item.map(|i| i.base_price).unwrap_or(0.0),
        "internal_cost": item.and_then(|i| i.internal_cost),
        "occupancy": item.and_then(|i| i.occupancy),
        "value_add_inventory": item
            .map(|i| i.value_adds.iter().map(|v| json!({
                "item": v.item,
                "perceived_value": v.perceived_value,
            })).collect::<Vec<_>>())
            .unwrap_or_default(),
        "buyer_reputation": ctx.offer.reputation,
        "system_constraints": constraints,
    })
}

/// `"mistral/mistral-large-latest"` → `"mistral-large-latest"`.
fn strip_provider(model: &str) -> &str {
    model.split_once('/').map_or(model, |(_, rest)| rest)
}
