//! Model clients built from the configuration.

use crate::config::{Config, RerankerKind};
use crate::error::Result;
use fieldex_domain::RelevanceScorer;
use fieldex_llm::{HttpScorer, LlmError, OpenAiEmbedder, OpenAiProvider, TermOverlapScorer};
use std::time::Duration;
use tracing::{info, warn};

/// Relevance scorer selected by `[reranker] kind`.
pub enum Scorer {
    /// Cross-encoder over HTTP
    Http(HttpScorer),
    /// Offline term overlap
    TermOverlap(TermOverlapScorer),
}

impl RelevanceScorer for Scorer {
    type Error = LlmError;

    fn score(&self, query: &str, documents: &[String]) -> std::result::Result<Vec<f32>, LlmError> {
        match self {
            Scorer::Http(scorer) => scorer.score(query, documents),
            Scorer::TermOverlap(scorer) => scorer.score(query, documents),
        }
    }
}

/// Chat client for `[llm]`.
pub fn provider(config: &Config) -> Result<OpenAiProvider> {
    let mut provider = OpenAiProvider::new(&config.llm.endpoint, &config.llm.model)?
        .with_timeout(Duration::from_secs(config.llm.timeout_secs))?;
    if let Some(api_key) = &config.llm.api_key {
        provider = provider.with_api_key(api_key)?;
    }
    info!("Chat model {} at {}", config.llm.model, provider.endpoint());
    Ok(provider)
}

/// Embeddings client for `[embedding]`.
pub fn embedder(config: &Config) -> Result<OpenAiEmbedder> {
    let embedder = OpenAiEmbedder::new(
        config.embedding_endpoint(),
        &config.embedding.model,
        config.embedding_api_key(),
        Duration::from_secs(config.embedding.timeout_secs),
    )?;
    info!("Embedding model {} at {}", embedder.model(), embedder.endpoint());
    Ok(embedder)
}

/// Relevance scorer for `[reranker]`.
pub fn scorer(config: &Config) -> Result<Scorer> {
    let settings = &config.reranker;
    match settings.kind {
        RerankerKind::Http => {
            let scorer = HttpScorer::new(
                &settings.endpoint,
                &settings.model,
                settings.api,
                Duration::from_secs(settings.timeout_secs),
            )?;
            info!("Reranker {} at {}", settings.model, scorer.endpoint());
            Ok(Scorer::Http(scorer))
        }
        RerankerKind::TermOverlap => {
            warn!("Reranker: offline term overlap, no cross-encoder");
            Ok(Scorer::TermOverlap(TermOverlapScorer::new()))
        }
    }
}
