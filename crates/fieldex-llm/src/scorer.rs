//! Relevance scorers
//!
//! [`HttpScorer`] calls a cross-encoder served behind a `/rerank` endpoint.
//! Two wire formats are understood:
//!
//! | API | Request | Response |
//! |-----|---------|----------|
//! | `Standard` (Jina, Cohere, LocalAI) | `{model, query, documents}` | `{results: [{index, relevance_score}]}` |
//! | `Tei` (text-embeddings-inference) | `{query, texts}` | `[{index, score}]` |
//!
//! [`TermOverlapScorer`] needs no server and is used for tests and offline
//! runs.

use crate::transport::{build_client, endpoint_url, post_json};
use crate::LlmError;
use fieldex_domain::RelevanceScorer;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Default cross-encoder model
pub const DEFAULT_RERANK_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

/// Wire format of the rerank endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankApi {
    /// `{model, query, documents}` → `{results: [{index, relevance_score}]}`
    #[default]
    Standard,
    /// `{query, texts}` → `[{index, score}]`
    Tei,
}

/// Cross-encoder scorer over HTTP
pub struct HttpScorer {
    client: Client,
    endpoint: String,
    model: String,
    api: RerankApi,
    max_retries: u32,
}

impl HttpScorer {
    /// Create a new HTTP scorer
    ///
    /// `base_url` is the server root; `/rerank` is appended.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api: RerankApi,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client("", timeout)?,
            endpoint: endpoint_url(&base_url.into(), "rerank"),
            model: model.into(),
            api,
            max_retries: crate::openai::DEFAULT_MAX_RETRIES,
        })
    }

    /// Set the maximum number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Full URL of the rerank endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, query: &str, documents: &[String]) -> Value {
        match self.api {
            RerankApi::Standard => serde_json::json!({
                "model": self.model,
                "query": query,
                "documents": documents,
                "top_n": documents.len(),
            }),
            RerankApi::Tei => serde_json::json!({
                "query": query,
                "texts": documents,
            }),
        }
    }
}

/// Map a rerank answer back to one score per input document
fn parse_scores(response: &Value, expected: usize) -> Result<Vec<f32>, LlmError> {
    let results = response
        .get("results")
        .and_then(|r| r.as_array())
        .or_else(|| response.as_array())
        .ok_or_else(|| {
            LlmError::InvalidResponse("Missing results in rerank response".to_string())
        })?;

    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for result in results {
        let index = result
            .get("index")
            .and_then(|i| i.as_u64())
            .ok_or_else(|| LlmError::InvalidResponse("Missing index in rerank result".to_string()))?
            as usize;
        let score = result
            .get("relevance_score")
            .or_else(|| result.get("score"))
            .and_then(|s| s.as_f64())
            .ok_or_else(|| {
                LlmError::InvalidResponse("Missing relevance_score in rerank result".to_string())
            })?;

        match scores.get_mut(index) {
            Some(slot) => *slot = Some(score as f32),
            None => warn!("Rerank result index {} out of range", index),
        }
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(idx, score)| {
            score.ok_or_else(|| {
                LlmError::InvalidResponse(format!("No score returned for document {}", idx))
            })
        })
        .collect()
}

impl RelevanceScorer for HttpScorer {
    type Error = LlmError;

    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, LlmError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.build_request(query, documents);
        let response: Value =
            post_json(&self.client, &self.endpoint, &body, &self.model, self.max_retries)?;
        parse_scores(&response, documents.len())
    }
}

/// Offline scorer: fraction of query terms present in the document
///
/// ```text
/// Query Terms:  {capital, of, france}
/// Document:     "The capital of France is Paris"
/// Score = |query ∩ doc| / |query| = 3/3 = 1.0
/// ```
#[derive(Debug, Clone, Default)]
pub struct TermOverlapScorer;

impl TermOverlapScorer {
    /// Create a new term overlap scorer
    pub fn new() -> Self {
        Self
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl RelevanceScorer for TermOverlapScorer {
    type Error = LlmError;

    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, LlmError> {
        let query_terms = terms(query);
        let max_terms = query_terms.len().max(1);

        Ok(documents
            .iter()
            .map(|doc| {
                let doc_terms = terms(doc);
                let overlap = query_terms.intersection(&doc_terms).count();
                overlap as f32 / max_terms as f32
            })
            .collect())
    }
}
