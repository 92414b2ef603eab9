//! Per-question retrieval with batch-level deduplication

use crate::types::FieldSpec;
use fieldex_domain::{EmbeddingModel, VectorStore};
use std::collections::HashSet;
use std::fmt::Display;
use tracing::{debug, warn};

/// Distinct chunk texts in first-seen order
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl CandidateSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk, returning false if it was already present
    pub fn insert(&mut self, text: String) -> bool {
        if self.seen.contains(&text) {
            return false;
        }
        self.seen.insert(text.clone());
        self.ordered.push(text);
        true
    }

    /// Whether the chunk is present
    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    /// Number of distinct chunks
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether no chunk was retrieved
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Chunks in first-seen order
    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    /// Consume the set, keeping first-seen order
    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

/// Candidates for a batch and the fields whose lookup failed
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Union of every field's nearest chunks
    pub candidates: CandidateSet,

    /// Ids of fields that contributed nothing because embedding or search failed
    pub failed_fields: Vec<String>,
}

/// Retrieve the `top_k` nearest chunks for every field in the batch
///
/// A field whose question cannot be embedded or searched is logged and
/// skipped; the rest of the batch still contributes candidates.
pub fn retrieve<E, S>(batch: &[FieldSpec], embedder: &E, index: &S, top_k: usize) -> Retrieval
where
    E: EmbeddingModel,
    E::Error: Display,
    S: VectorStore,
    S::Error: Display,
{
    let mut retrieval = Retrieval::default();

    for field in batch {
        if field.question.trim().is_empty() {
            warn!("Field {} has a blank question, nothing to retrieve", field.id);
            retrieval.failed_fields.push(field.id.clone());
            continue;
        }

        let embedding = match embedder.embed(&field.question) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Failed to embed question for field {}: {}", field.id, e);
                retrieval.failed_fields.push(field.id.clone());
                continue;
            }
        };

        let groups = match index.query(&[embedding], top_k) {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Vector search failed for field {}: {}", field.id, e);
                retrieval.failed_fields.push(field.id.clone());
                continue;
            }
        };

        let mut added = 0;
        for text in groups.into_iter().next().unwrap_or_default() {
            if retrieval.candidates.insert(text) {
                added += 1;
            }
        }
        debug!("Field {} added {} new candidate chunks", field.id, added);
    }

    retrieval
}
