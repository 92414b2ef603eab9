//! Relevance ordering of a batch's candidates

use crate::error::RerankError;
use crate::types::{FieldSpec, ScoredChunk};
use fieldex_domain::RelevanceScorer;
use std::cmp::Ordering;
use std::fmt::Display;

/// The query a batch's candidates are scored against: all questions joined by spaces
pub fn batch_query(batch: &[FieldSpec]) -> String {
    batch
        .iter()
        .map(|f| f.question.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Score candidates against the query and order them by decreasing relevance
///
/// The sort is stable: candidates with equal scores keep their retrieval
/// order.
pub fn rerank<R>(
    query: &str,
    candidates: Vec<String>,
    scorer: &R,
) -> Result<Vec<ScoredChunk>, RerankError>
where
    R: RelevanceScorer,
    R::Error: Display,
{
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let scores = scorer
        .score(query, &candidates)
        .map_err(|e| RerankError::Scorer(e.to_string()))?;

    if scores.len() != candidates.len() {
        return Err(RerankError::ScoreCountMismatch {
            expected: candidates.len(),
            actual: scores.len(),
        });
    }

    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .zip(scores)
        .map(|(text, score)| ScoredChunk { text, score })
        .collect();

    scored.sort_by(|a, b| by_score_desc(a.score, b.score));
    Ok(scored)
}

/// Descending total order on scores; `NaN` ranks last
fn by_score_desc(a: f32, b: f32) -> Ordering {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    key(b).total_cmp(&key(a))
}

/// Candidates in retrieval order with zero scores, used when scoring fails
pub fn unscored(candidates: Vec<String>) -> Vec<ScoredChunk> {
    candidates
        .into_iter()
        .map(|text| ScoredChunk { text, score: 0.0 })
        .collect()
}
