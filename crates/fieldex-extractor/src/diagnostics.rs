//! Retrieval diagnostics
//!
//! Answers "why didn't the model see X?" by checking, for a known term, each
//! place it can get lost: chunking, retrieval, and context packing. Nothing
//! here changes extraction output.

use fieldex_domain::{Chunk, EmbeddingModel, VectorStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use tracing::info;

const PREVIEW_CHARS: usize = 100;

/// What to look for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Text that should be findable in the document
    pub term: String,

    /// Retrieval question expected to surface the term
    #[serde(default)]
    pub question: Option<String>,

    /// Field whose packed context is checked for the term
    #[serde(default)]
    pub watch_field: Option<String>,
}

impl DiagnosticsConfig {
    /// Create a config for a term
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }
}

/// First chunk holding the term
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkHit {
    /// Position of the chunk in document order
    pub index: usize,
    /// Chunk length in characters
    pub length: usize,
    /// Leading characters of the chunk
    pub preview: String,
}

/// Result of querying the index with the probe question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalCheck {
    /// Question sent
    pub question: String,
    /// Whether any returned chunk holds the term
    pub found: bool,
    /// Previews of what came back
    pub returned: Vec<String>,
    /// Why the query could not be run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    /// Term searched for
    pub term: String,
    /// First chunk holding the term, if any
    pub chunk_hit: Option<ChunkHit>,
    /// Retrieval check, run only when the term is in some chunk and a question is given
    pub retrieval: Option<RetrievalCheck>,
}

impl ProbeReport {
    /// Whether the term survived chunking and, if checked, retrieval
    pub fn is_healthy(&self) -> bool {
        self.chunk_hit.is_some() && self.retrieval.as_ref().map_or(true, |r| r.found)
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chunk_hit {
            Some(hit) => {
                writeln!(
                    f,
                    "'{}' found in chunk #{} ({} chars)",
                    self.term, hit.index, hit.length
                )?;
                writeln!(f, "  preview: {}...", hit.preview)?;
            }
            None => {
                return writeln!(
                    f,
                    "'{}' is not in any chunk; check the source document",
                    self.term
                );
            }
        }

        if let Some(check) = &self.retrieval {
            if let Some(error) = &check.error {
                return writeln!(f, "retrieval for '{}' failed: {}", check.question, error);
            }
            if check.found {
                writeln!(f, "retrieval for '{}' returns the term", check.question)?;
            } else {
                writeln!(
                    f,
                    "retrieval for '{}' misses the term; it returned:",
                    check.question
                )?;
                for preview in &check.returned {
                    writeln!(f, "  - {}...", preview)?;
                }
            }
        }
        Ok(())
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Check whether `term` survives chunking and retrieval
pub fn probe<E, S>(
    term: &str,
    question: Option<&str>,
    chunks: &[Chunk],
    embedder: &E,
    index: &S,
    top_k: usize,
) -> ProbeReport
where
    E: EmbeddingModel,
    E::Error: Display,
    S: VectorStore,
    S::Error: Display,
{
    let chunk_hit = chunks
        .iter()
        .find(|c| c.text.contains(term))
        .map(|c| ChunkHit {
            index: c.source_order,
            length: c.char_len(),
            preview: preview(&c.text),
        });

    let retrieval = match (&chunk_hit, question) {
        (Some(_), Some(question)) => Some(check_retrieval(term, question, embedder, index, top_k)),
        _ => None,
    };

    ProbeReport {
        term: term.to_string(),
        chunk_hit,
        retrieval,
    }
}

fn check_retrieval<E, S>(
    term: &str,
    question: &str,
    embedder: &E,
    index: &S,
    top_k: usize,
) -> RetrievalCheck
where
    E: EmbeddingModel,
    E::Error: Display,
    S: VectorStore,
    S::Error: Display,
{
    let mut check = RetrievalCheck {
        question: question.to_string(),
        found: false,
        returned: Vec::new(),
        error: None,
    };

    let results = embedder
        .embed(question)
        .map_err(|e| e.to_string())
        .and_then(|embedding| index.query(&[embedding], top_k).map_err(|e| e.to_string()));

    match results {
        Ok(groups) => {
            let docs = groups.into_iter().next().unwrap_or_default();
            check.found = docs.iter().any(|d| d.contains(term));
            check.returned = docs.iter().map(|d| preview(d)).collect();
        }
        Err(e) => check.error = Some(e),
    }
    check
}

/// Log whether the watched field's packed context holds the term
///
/// Returns `None` when the batch does not contain the watched field.
pub fn check_context(
    config: &DiagnosticsConfig,
    field_ids: &[String],
    context: &str,
) -> Option<bool> {
    let watched = config.watch_field.as_deref()?;
    if !field_ids.iter().any(|id| id == watched) {
        return None;
    }
    let present = context.contains(&config.term);
    info!(
        "Checkpoint {}: '{}' present in packed context: {}",
        watched,
        config.term,
        if present { "yes" } else { "no" }
    );
    Some(present)
}
