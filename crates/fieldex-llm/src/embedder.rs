//! OpenAI-compatible embeddings client

use crate::transport::{build_client, endpoint_url, post_json};
use crate::LlmError;
use fieldex_domain::EmbeddingModel;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default embedding model served by LM Studio
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-nomic-embed-text-v1.5";

/// Default timeout for embedding requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Blocking embeddings client for OpenAI-compatible `/embeddings` endpoints
///
/// Newlines in the input are replaced by spaces before sending, so a chunk
/// and a one-line question about the same content embed comparably.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Build a new embeddings client
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(LlmError::Other("missing embedding model name".to_string()));
        }
        Ok(Self {
            client: build_client(api_key, timeout)?,
            endpoint: endpoint_url(&base_url.into(), "embeddings"),
            model,
            max_retries: crate::openai::DEFAULT_MAX_RETRIES,
        })
    }

    /// Set the maximum number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Model used for embeddings
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full URL of the embeddings endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Flatten newlines into spaces
pub fn prepare_input(text: &str) -> String {
    text.replace('\n', " ")
}

impl EmbeddingModel for OpenAiEmbedder {
    type Error = LlmError;

    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let input = prepare_input(text);
        let body = EmbeddingRequest {
            model: &self.model,
            input: [&input],
        };
        let response: EmbeddingResponse =
            post_json(&self.client, &self.endpoint, &body, &self.model, self.max_retries)?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| {
                LlmError::InvalidResponse("Embedding response has no data".to_string())
            })?;

        if embedding.is_empty() {
            return Err(LlmError::InvalidResponse("Embedding vector is empty".to_string()));
        }
        Ok(embedding)
    }
}
