//! Token-budgeted context packing

use crate::types::{PackedContext, ScoredChunk};
use fieldex_domain::TokenCounter;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::{debug, warn};

/// Separator placed between packed chunks
pub const CHUNK_SEPARATOR: &str = "\n---\n";

/// Token counter backed by the cl100k_base BPE
///
/// Falls back to [`CharEstimate`] if the encoder cannot be loaded.
pub struct TokenEstimator {
    encoder: Option<CoreBPE>,
}

impl TokenEstimator {
    /// Load the cl100k_base encoder
    pub fn new() -> Self {
        let encoder = match cl100k_base() {
            Ok(encoder) => Some(encoder),
            Err(e) => {
                warn!("Tokenizer unavailable, estimating 4 characters per token: {}", e);
                None
            }
        };
        Self { encoder }
    }

    /// Whether counts come from the real tokenizer
    pub fn is_exact(&self) -> bool {
        self.encoder.is_some()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("exact", &self.is_exact())
            .finish()
    }
}

impl TokenCounter for TokenEstimator {
    fn count_tokens(&self, text: &str) -> usize {
        match &self.encoder {
            Some(encoder) => encoder.encode_with_special_tokens(text).len(),
            None => CharEstimate.count_tokens(text),
        }
    }
}

/// Four characters per token
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimate;

impl TokenCounter for CharEstimate {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count() / 4
    }
}

/// Accept chunks in order while the running token total stays strictly under `limit`
///
/// Each chunk is counted on its own; separators are not counted. Packing
/// stops at the first chunk that would break the budget, so later, smaller
/// chunks are not tried. A chunk that alone exceeds the budget is never
/// truncated to fit.
pub fn pack<T>(chunks: &[ScoredChunk], counter: &T, limit: usize) -> PackedContext
where
    T: TokenCounter + ?Sized,
{
    let mut accepted: Vec<&str> = Vec::new();
    let mut running_total = 0;

    for (position, chunk) in chunks.iter().enumerate() {
        let tokens = counter.count_tokens(&chunk.text);
        if running_total + tokens >= limit {
            debug!(
                "Context budget reached at chunk {} ({} + {} >= {})",
                position, running_total, tokens, limit
            );
            break;
        }
        accepted.push(&chunk.text);
        running_total += tokens;
    }

    PackedContext {
        text: accepted.join(CHUNK_SEPARATOR),
        chunk_count: accepted.len(),
        token_count: running_total,
        dropped: chunks.len() - accepted.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_char_estimate() {
        assert_eq!(CharEstimate.count_tokens(""), 0);
        assert_eq!(CharEstimate.count_tokens("abcdefgh"), 2);
        assert_eq!(CharEstimate.count_tokens("ééééé"), 1);
    }

    #[test]
    fn test_token_estimator_counts() {
        let estimator = TokenEstimator::new();
        assert_eq!(estimator.count_tokens(""), 0);
        assert!(estimator.count_tokens("The patient takes metformin daily.") > 0);
    }

    #[test]
    fn test_pack_joins_with_separator() {
        let chunks = vec![chunk(&"a".repeat(40), 0.9), chunk(&"b".repeat(40), 0.5)];
        let packed = pack(&chunks, &CharEstimate, 1000);
        assert_eq!(packed.chunk_count, 2);
        assert_eq!(packed.dropped, 0);
        assert_eq!(
            packed.text,
            format!("{}\n---\n{}", "a".repeat(40), "b".repeat(40))
        );
        assert_eq!(packed.token_count, 20);
    }

    #[test]
    fn test_pack_stops_at_first_overflow() {
        // 400 chars = 100 tokens each
        let chunks = vec![
            chunk(&"a".repeat(400), 0.9),
            chunk(&"b".repeat(400), 0.8),
            chunk("tiny", 0.1),
        ];
        let packed = pack(&chunks, &CharEstimate, 150);
        assert_eq!(packed.chunk_count, 1);
        assert_eq!(packed.dropped, 2);
        assert!(!packed.text.contains("tiny"));
    }

    #[test]
    fn test_pack_limit_is_strict() {
        let chunks = vec![chunk(&"a".repeat(400), 0.9)];
        assert!(pack(&chunks, &CharEstimate, 100).is_empty());
        assert_eq!(pack(&chunks, &CharEstimate, 101).chunk_count, 1);
    }

    #[test]
    fn test_oversized_first_chunk_yields_empty_context() {
        let chunks = vec![chunk(&"a".repeat(10_000), 0.9), chunk("small", 0.5)];
        let packed = pack(&chunks, &CharEstimate, 100);
        assert!(packed.is_empty());
        assert_eq!(packed.text, "");
        assert_eq!(packed.dropped, 2);
    }

    #[test]
    fn test_pack_never_exceeds_budget() {
        let estimator = TokenEstimator::new();
        let chunks: Vec<ScoredChunk> = (0..50)
            .map(|i| chunk(&format!("Paragraph {} about dosage and follow-up visits.", i), 0.0))
            .collect();
        let packed = pack(&chunks, &estimator, 120);
        assert!(packed.chunk_count > 0);
        assert!(packed.token_count < 120);

        let sum: usize = chunks[..packed.chunk_count]
            .iter()
            .map(|c| estimator.count_tokens(&c.text))
            .sum();
        assert_eq!(sum, packed.token_count);
    }

    #[test]
    fn test_pack_is_idempotent() {
        let chunks = vec![chunk("alpha beta", 0.7), chunk("gamma", 0.2)];
        assert_eq!(
            pack(&chunks, &CharEstimate, 50),
            pack(&chunks, &CharEstimate, 50)
        );
    }

    #[test]
    fn test_pack_empty_input() {
        let packed = pack(&[], &CharEstimate, 100);
        assert!(packed.is_empty());
        assert_eq!(packed.dropped, 0);
    }
}
