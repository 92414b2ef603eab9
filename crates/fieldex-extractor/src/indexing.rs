//! Index-time half of the pipeline: chunk, embed, store

use crate::chunking::TextChunker;
use crate::error::ExtractorError;
use fieldex_domain::{Chunk, ChunkId, EmbeddingModel, VectorStore};
use fieldex_store::{collection_name, VectorIndex};
use std::fmt::Display;
use tracing::{debug, info};

/// A document's chunks and the per-run index built over them
pub struct IndexedCorpus {
    /// Chunks in document order
    pub chunks: Vec<Chunk>,

    /// Nearest-neighbour index holding every chunk
    pub index: VectorIndex,
}

impl IndexedCorpus {
    /// Name of the vector collection
    pub fn collection(&self) -> &str {
        self.index.name()
    }

    /// Number of chunks indexed
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus holds no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Chunk a document, embed every chunk and load a fresh index
///
/// Any embedding failure aborts: a partial index would silently starve
/// every batch of evidence.
pub fn index_document<E>(
    text: &str,
    chunker: &TextChunker,
    embedder: &E,
    prefix: &str,
) -> Result<IndexedCorpus, ExtractorError>
where
    E: EmbeddingModel,
    E::Error: Display,
{
    let chunks: Vec<Chunk> = chunker
        .chunk(text)
        .into_iter()
        .enumerate()
        .map(|(order, text)| Chunk::new(text, order))
        .collect();

    if chunks.is_empty() {
        return Err(ExtractorError::EmptyDocument);
    }
    info!("Document split into {} chunks", chunks.len());

    let mut embeddings = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let embedding = embedder.embed(&chunk.text).map_err(|e| {
            ExtractorError::Embedding(format!("chunk {}: {}", chunk.source_order, e))
        })?;
        debug!(
            "Embedded chunk {} ({} chars)",
            chunk.source_order,
            chunk.char_len()
        );
        embeddings.push(embedding);
    }

    let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
    let mut index = VectorIndex::with_name(collection_name(prefix), dimension);

    let ids: Vec<ChunkId> = chunks.iter().map(|c| c.id).collect();
    let documents: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    index
        .add(&ids, &documents, &embeddings)
        .map_err(|e| ExtractorError::Index(e.to_string()))?;

    info!(
        "Indexed {} chunks into collection '{}'",
        index.len(),
        index.name()
    );

    Ok(IndexedCorpus { chunks, index })
}
