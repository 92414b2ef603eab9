//! Chunk module - the unit of retrieval

use std::fmt;

/// Opaque identifier for an indexed chunk, backed by a random UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(u128);

impl ChunkId {
    /// Generate a fresh random ChunkId
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldex_domain::ChunkId;
    ///
    /// assert_ne!(ChunkId::new(), ChunkId::new());
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().as_u128())
    }

    /// Create a ChunkId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// A bounded, contiguous slice of the source document
///
/// Chunks are immutable once created. `source_order` is the position of the
/// chunk in the chunker's output, which is also its position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Unique identifier
    pub id: ChunkId,

    /// Chunk text, already trimmed
    pub text: String,

    /// Position in the chunker's output sequence
    pub source_order: usize,
}

impl Chunk {
    /// Create a chunk with a fresh identifier
    pub fn new(text: impl Into<String>, source_order: usize) -> Self {
        Self {
            id: ChunkId::new(),
            text: text.into(),
            source_order,
        }
    }

    /// Length of the chunk in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_display_is_uuid() {
        let id = ChunkId::new();
        let id_str = id.to_string();
        assert_eq!(id_str.len(), 36);
        assert_eq!(id_str.matches('-').count(), 4);
    }

    #[test]
    fn test_chunk_id_from_value() {
        let id = ChunkId::from_value(42);
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn test_chunk_char_len_counts_characters() {
        let chunk = Chunk::new("Médication", 0);
        assert_eq!(chunk.char_len(), 10);
        assert!(chunk.text.len() > 10);
    }

    #[test]
    fn test_chunks_get_distinct_ids() {
        let a = Chunk::new("same text", 0);
        let b = Chunk::new("same text", 0);
        assert_ne!(a.id, b.id);
    }
}
