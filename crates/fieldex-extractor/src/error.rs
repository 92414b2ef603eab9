//! Error types for the Extractor
//!
//! Only [`ExtractorError`] ever reaches the caller, and only before the first
//! batch runs. Everything that goes wrong inside a batch is turned into
//! placeholder records instead.

use thiserror::Error;

/// Errors that abort a run before extraction starts
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Unreadable or missing input
    #[error("Input error: {0}")]
    Input(String),

    /// Question schema is not usable
    #[error("Schema error: {0}")]
    Schema(String),

    /// The document produced no chunks
    #[error("Document is empty after normalization")]
    EmptyDocument,

    /// Embedding failed while building the index
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index rejected the chunks
    #[error("Index error: {0}")]
    Index(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}

/// Model output that could not be turned into JSON
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Nothing left after removing code fences and whitespace
    #[error("empty model output")]
    Empty,

    /// Repair did not produce valid JSON
    #[error("unrepairable model output: {0}")]
    Unrepairable(String),
}

/// Relevance scoring failed for a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RerankError {
    /// The scorer itself failed
    #[error("scorer failed: {0}")]
    Scorer(String),

    /// The scorer returned the wrong number of scores
    #[error("scorer returned {actual} scores for {expected} candidates")]
    ScoreCountMismatch {
        /// Number of candidates sent
        expected: usize,
        /// Number of scores received
        actual: usize,
    },
}
