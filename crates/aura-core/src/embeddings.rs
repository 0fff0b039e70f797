//! # Embedding Client
//!
//! Query vectors for Search come from an embeddings HTTP endpoint
//! (Mistral/OpenAI-compatible `POST /embeddings`). Negotiation never calls
//! this; embeddings exist only for the search path and seeding.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Embedding model used when none is configured.
pub const DEFAULT_EMBED_MODEL: &str = "mistral-embed";

/// Errors from the embeddings endpoint.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Transport-level failure.
    #[error("embeddings request failed: {0}")]
    Transport(String),

    /// The endpoint answered with an unexpected shape.
    #[error("embeddings response malformed: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// HTTP client for the embeddings endpoint.
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    /// Build a client against an API base like `https://api.mistral.ai/v1`.
    pub fn new(api_base: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: DEFAULT_EMBED_MODEL.to_string(),
        }
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.api_base);
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Malformed("empty data array".to_string()))
    }
}
