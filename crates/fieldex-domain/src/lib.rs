//! Fieldex Domain Layer
//!
//! Core vocabulary shared by every Fieldex crate: the [`Chunk`] produced at
//! index time and the trait boundaries behind which the external
//! collaborators (embedding gateway, vector index, cross-encoder, chat model,
//! tokenizer) live.
//!
//! ## Architecture
//!
//! - No serialization or I/O here
//! - Infrastructure implementations live in `fieldex-store` and `fieldex-llm`
//! - The pipeline itself lives in `fieldex-extractor`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod traits;

// Re-exports for convenience
pub use chunk::{Chunk, ChunkId};
pub use traits::{
    CompletionRequest, EmbeddingModel, LlmProvider, RelevanceScorer, TokenCounter, VectorStore,
};
