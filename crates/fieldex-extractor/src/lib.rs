//! Fieldex Extractor
//!
//! Answers a schema of questions from a single document using retrieval over
//! the document's own chunks and one language-model call per batch of
//! questions.
//!
//! # Architecture
//!
//! ```text
//! index time:  Document → TextChunker → EmbeddingModel → VectorIndex
//! per batch:   Retriever → Reranker → Context Packer → LLM → Decoder → Accumulator
//! ```
//!
//! # Key Features
//!
//! - **Boundary-aware chunking**: overlapping windows snapped to paragraph or sentence ends
//! - **Batch retrieval**: per-question top-K lookups merged without duplicates
//! - **Relevance ordering**: cross-encoder scores, falling back to retrieval order
//! - **Token budget**: context packed strictly under `context_window - safety_margin`
//! - **Failure isolation**: a failed batch yields placeholder records, never a missing field
//!
//! # Example Usage
//!
//! ```
//! use fieldex_extractor::{CharEstimate, Extractor, ExtractorConfig, Schema};
//! use fieldex_llm::{MockProvider, TermOverlapScorer};
//! use fieldex_store::MockEmbeddingModel;
//!
//! # fn example() -> Result<(), fieldex_extractor::ExtractorError> {
//! let llm = MockProvider::new(r#"{"fields": [{"id": "age", "value": "54", "source_quote": "54-year-old"}]}"#);
//! let extractor = Extractor::new(
//!     llm,
//!     MockEmbeddingModel::new(64),
//!     TermOverlapScorer::new(),
//!     ExtractorConfig::default(),
//! )?
//! .with_token_counter(CharEstimate);
//!
//! let schema = Schema::from_json(r#"{"fields": [{"id": "age", "question": "Patient age?"}]}"#)?;
//! let run = extractor.run("A 54-year-old woman presents with fatigue.", &schema)?;
//!
//! assert_eq!(run.output.fields.len(), 1);
//! assert_eq!(run.output.fields[0].value, "54");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod decode;
mod diagnostics;
mod error;
mod extractor;
mod indexing;
mod output;
mod packing;
mod prompt;
mod reconcile;
mod rerank;
mod retrieval;
mod types;

#[cfg(test)]
mod tests;

pub use chunking::{normalize, TextChunker};
pub use config::ExtractorConfig;
pub use decode::{collapse_newlines, decode, repair, strip_fences};
pub use diagnostics::{probe, ChunkHit, DiagnosticsConfig, ProbeReport, RetrievalCheck};
pub use error::{DecodeError, ExtractorError, RerankError};
pub use extractor::Extractor;
pub use indexing::{index_document, IndexedCorpus};
pub use output::Accumulator;
pub use packing::{pack, CharEstimate, TokenEstimator, CHUNK_SEPARATOR};
pub use prompt::PromptBuilder;
pub use reconcile::{
    placeholders, reconcile, StructureError, INVALID_STRUCTURE, MISSING_FROM_OUTPUT,
};
pub use rerank::{batch_query, rerank, unscored};
pub use retrieval::{retrieve, CandidateSet, Retrieval};
pub use types::{
    BatchReport, BatchStage, ExtractionRecord, ExtractionRun, FieldSpec, FinalOutput,
    PackedContext, RunMetadata, Schema, ScoredChunk,
};
