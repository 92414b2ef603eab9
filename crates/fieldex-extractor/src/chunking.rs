//! Overlapping fixed-size chunking with boundary snapping
//!
//! The document is cut into windows of `chunk_size` characters. Before each
//! cut, the last `boundary_lookback` characters of the window are searched for
//! a paragraph break (`\n\n`), then for a sentence end (`.`, `?` or `!`
//! followed by whitespace), and the window is shortened to end just after it.
//! The next window starts `chunk_overlap` characters before the cut.
//!
//! All positions are counted in characters, never bytes.

use crate::config::ExtractorConfig;

/// Chunks text into overlapping windows
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    lookback: usize,
}

impl TextChunker {
    /// Create a new text chunker
    ///
    /// `overlap` must be smaller than `chunk_size`; a larger value is
    /// clamped so that every window still advances.
    pub fn new(chunk_size: usize, overlap: usize, lookback: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            lookback,
        }
    }

    /// Create a chunker from extractor settings
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(
            config.chunk_size,
            config.chunk_overlap,
            config.boundary_lookback,
        )
    }

    /// Chunk the given text
    ///
    /// Returns trimmed, non-empty chunks in document order.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = normalize(text).chars().collect();
        self.spans(&chars)
            .into_iter()
            .map(|(start, end)| chars[start..end].iter().collect::<String>())
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    /// Window boundaries `(start, end)` over already-normalized characters
    pub fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let len = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < len {
            let raw_end = start + self.chunk_size;
            if raw_end >= len {
                spans.push((start, len));
                break;
            }

            let zone_start = raw_end.saturating_sub(self.lookback).max(start);
            let zone = &chars[zone_start..raw_end];
            let end = last_paragraph_break(zone)
                .or_else(|| last_sentence_end(zone))
                .map(|offset| zone_start + offset)
                .unwrap_or(raw_end);

            spans.push((start, end));

            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        spans
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ExtractorConfig::default())
    }
}

/// Collapse runs of three or more newlines into exactly two
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Offset just after the last `\n\n` in the zone
fn last_paragraph_break(zone: &[char]) -> Option<usize> {
    (0..zone.len().saturating_sub(1))
        .rev()
        .find(|&i| zone[i] == '\n' && zone[i + 1] == '\n')
        .map(|i| i + 2)
}

/// Offset just after the last sentence terminator and its whitespace
fn last_sentence_end(zone: &[char]) -> Option<usize> {
    (1..zone.len())
        .rev()
        .find(|&i| zone[i].is_whitespace() && matches!(zone[i - 1], '.' | '?' | '!'))
        .map(|i| i + 1)
}
