//! Embedding Model for Text Vectorization
//!
//! Real embeddings come from an OpenAI-compatible gateway (see
//! `fieldex-llm`). This module provides the offline stand-in: a mock model
//! that generates deterministic embeddings from text hashes, so the whole
//! pipeline can be exercised without a model server.
//!
//! # Examples
//!
//! ```rust
//! use fieldex_domain::EmbeddingModel;
//! use fieldex_store::embedding::MockEmbeddingModel;
//!
//! let model = MockEmbeddingModel::new(384);
//! let text = "The sky is blue";
//! let embedding = model.embed(text).unwrap();
//! assert_eq!(embedding.len(), 384);
//!
//! // Same text always produces same embedding
//! let embedding2 = model.embed(text).unwrap();
//! assert_eq!(embedding, embedding2);
//! ```

use fieldex_domain::EmbeddingModel;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur during embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Invalid input text
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model inference error
    #[error("Model inference failed: {0}")]
    InferenceFailed(String),
}

/// Mock embedding model
///
/// This model generates deterministic embeddings based on text content
/// using a hash-based approach. The embeddings are:
///
/// - **Deterministic**: Same text always produces same embedding
/// - **Normalized**: All vectors have unit length (for cosine similarity)
/// - **Diverse**: Different texts produce different embeddings
///
/// They carry no semantic signal: two paraphrases are as far apart as two
/// unrelated sentences.
#[derive(Debug, Clone)]
pub struct MockEmbeddingModel {
    dimension: usize,
}

impl MockEmbeddingModel {
    /// Create a new mock embedding model
    ///
    /// # Parameters
    ///
    /// - `dimension`: The embedding dimension (e.g., 768 for nomic-embed-text)
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Get the dimension of embeddings produced by this model
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Hash text with a seed to get a deterministic f32 value
    fn hash_with_seed(text: &str, seed: u64) -> f32 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        seed.hash(&mut hasher);
        let hash_value = hasher.finish();

        // Convert hash to float in range [-1, 1]
        let normalized = (hash_value as f64 / u64::MAX as f64) * 2.0 - 1.0;
        normalized as f32
    }
}

impl EmbeddingModel for MockEmbeddingModel {
    type Error = EmbeddingError;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Empty text cannot be embedded".to_string(),
            ));
        }
        if self.dimension == 0 {
            return Err(EmbeddingError::InferenceFailed(
                "Embedding dimension is zero".to_string(),
            ));
        }

        let mut embedding: Vec<f32> = (0..self.dimension)
            .map(|i| Self::hash_with_seed(text, i as u64))
            .collect();

        // Normalize to unit length for cosine similarity
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        Ok(embedding)
    }
}

/// Calculate cosine similarity between two embedding vectors
///
/// Returns a value in `[-1, 1]`, or `0.0` when either vector has zero
/// magnitude.
///
/// # Panics
///
/// Panics if vectors have different lengths
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vectors must have same length");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
