//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the extraction pipeline and the
//! services it depends on. Implementations live in other crates.
//!
//! Every collaborator is synchronous: the pipeline is strictly sequential and
//! each call blocks until the external service answers.

use crate::ChunkId;

/// Trait for converting text into embedding vectors
///
/// Implemented by the infrastructure layer (fieldex-store, fieldex-llm)
pub trait EmbeddingModel {
    /// Error type for embedding operations
    type Error;

    /// Generate an embedding vector for the given text
    ///
    /// Implementations must be deterministic: the same text embeds to the
    /// same vector, otherwise retrieval is not reproducible across reruns.
    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error>;
}

/// Trait for a nearest-neighbour index over chunk embeddings
///
/// Implemented by the infrastructure layer (fieldex-store)
pub trait VectorStore {
    /// Error type for index operations
    type Error;

    /// Add documents with their identifiers and embeddings
    ///
    /// The three slices are parallel and must have the same length.
    fn add(
        &mut self,
        ids: &[ChunkId],
        documents: &[String],
        embeddings: &[Vec<f32>],
    ) -> Result<(), Self::Error>;

    /// Query the nearest documents for each query embedding
    ///
    /// Returns one group of documents per query embedding, each ordered by
    /// decreasing similarity and holding at most `n_results` entries.
    fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<Vec<String>>, Self::Error>;

    /// Number of documents stored
    fn len(&self) -> usize;

    /// Whether the store holds no documents
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait for cross-encoder style relevance scoring
///
/// Implemented by the infrastructure layer (fieldex-llm)
pub trait RelevanceScorer {
    /// Error type for scoring operations
    type Error;

    /// Score every `(query, document)` pair
    ///
    /// Returns exactly one score per document, in the order of `documents`.
    /// Higher is more relevant.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, Self::Error>;
}

/// A single chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,

    /// User message
    pub user: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum number of tokens the model may produce
    pub max_tokens: u32,
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (fieldex-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Run a chat completion and return the raw text of the first choice
    fn generate(&self, request: &CompletionRequest) -> Result<String, Self::Error>;

    /// Name of the model answering the requests
    fn model_name(&self) -> &str;
}

/// Trait for estimating the token length of a text
pub trait TokenCounter {
    /// Number of tokens the text occupies in the model's context
    fn count_tokens(&self, text: &str) -> usize;
}
