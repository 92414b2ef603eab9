//! HNSW Vector Index for Chunk Retrieval
//!
//! This module wraps the HNSW algorithm for nearest-neighbour search over
//! chunk embeddings and keeps the chunk texts next to the graph, so a query
//! answers with documents rather than internal identifiers.
//!
//! # Architecture
//!
//! - In-memory only, one collection per run
//! - Written once at index time, then only read
//! - Collections are named `<prefix>_<8 hex chars>` with a random suffix
//!
//! # HNSW Parameters
//!
//! - **M**: Number of bi-directional links per node (default: 16)
//! - **efConstruction**: Size of dynamic candidate list during construction (default: 200)
//! - **efSearch**: Size of dynamic candidate list during search (at least 64)

use fieldex_domain::{ChunkId, VectorStore};
use hnsw_rs::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Default HNSW parameters
const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_EF_SEARCH: usize = 64;
const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Errors that can occur during vector index operations
#[derive(Error, Debug)]
pub enum VectorIndexError {
    /// Invalid embedding dimension
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        actual: usize,
    },

    /// Parallel input slices of different lengths
    #[error("Mismatched batch: {ids} ids, {documents} documents, {embeddings} embeddings")]
    BatchMismatch {
        /// Number of ids
        ids: usize,
        /// Number of documents
        documents: usize,
        /// Number of embeddings
        embeddings: usize,
    },
}

/// Build a fresh collection name from a prefix and a random suffix
///
/// # Examples
///
/// ```
/// use fieldex_store::collection_name;
///
/// let name = collection_name("documents");
/// assert!(name.starts_with("documents_"));
/// assert_eq!(name.len(), "documents_".len() + 8);
/// ```
pub fn collection_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &suffix[..8])
}

/// A wrapper around HNSW for chunk similarity search
///
/// The index stores `(chunk_id, text, embedding)` triples. Internal HNSW ids
/// are positions in `documents`.
///
/// # Examples
///
/// ```no_run
/// use fieldex_domain::{ChunkId, VectorStore};
/// use fieldex_store::VectorIndex;
///
/// let mut index = VectorIndex::new(768);
/// let embedding = vec![0.1; 768];
/// index
///     .add(&[ChunkId::new()], &["some chunk".to_string()], &[embedding.clone()])
///     .unwrap();
///
/// let results = index.search(&embedding, 4).unwrap();
/// ```
pub struct VectorIndex {
    /// Collection name, unique per run
    name: String,

    /// Expected embedding dimension
    dimension: usize,

    /// HNSW graph (hnsw_rs owns the data)
    hnsw: Hnsw<'static, f32, DistCosine>,

    /// Chunk ids, indexed by internal HNSW id
    ids: Vec<ChunkId>,

    /// Chunk texts, indexed by internal HNSW id
    documents: Vec<String>,
}

impl VectorIndex {
    /// Create a new vector index with the specified dimension
    ///
    /// The collection gets a fresh name with the `documents` prefix.
    pub fn new(dimension: usize) -> Self {
        Self::with_name(collection_name("documents"), dimension)
    }

    /// Create a new vector index with an explicit collection name
    pub fn with_name(name: impl Into<String>, dimension: usize) -> Self {
        // Calculate number of layers based on expected data size
        let nb_layer = 16.min((DEFAULT_MAX_ELEMENTS as f32).ln().trunc() as usize);

        let hnsw = Hnsw::<'static, f32, DistCosine>::new(
            DEFAULT_M,
            DEFAULT_MAX_ELEMENTS,
            nb_layer,
            DEFAULT_EF_CONSTRUCTION,
            DistCosine {},
        );

        Self {
            name: name.into(),
            dimension,
            hnsw,
            ids: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expected embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Look up the chunk id stored for a document text
    pub fn id_of(&self, document: &str) -> Option<ChunkId> {
        self.documents
            .iter()
            .position(|d| d == document)
            .map(|pos| self.ids[pos])
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), VectorIndexError> {
        if embedding.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Search for the k nearest documents to the given embedding
    ///
    /// Returns `(document, similarity)` pairs sorted by similarity
    /// (descending).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>, VectorIndexError> {
        self.check_dimension(query)?;

        if self.documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let ef_search = DEFAULT_EF_SEARCH.max(k);
        let neighbours = self.hnsw.search(query, k, ef_search);

        let mut results: Vec<(String, f32)> = neighbours
            .into_iter()
            .filter_map(|neighbour| {
                self.documents.get(neighbour.d_id).map(|doc| {
                    // HNSW returns cosine distance, we want similarity
                    (doc.clone(), 1.0 - neighbour.distance)
                })
            })
            .collect();

        // NaN similarities rank last
        let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
        results.sort_by(|a, b| key(b.1).total_cmp(&key(a.1)));
        results.truncate(k);

        Ok(results)
    }
}

impl VectorStore for VectorIndex {
    type Error = VectorIndexError;

    fn add(
        &mut self,
        ids: &[ChunkId],
        documents: &[String],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorIndexError> {
        if ids.len() != documents.len() || documents.len() != embeddings.len() {
            return Err(VectorIndexError::BatchMismatch {
                ids: ids.len(),
                documents: documents.len(),
                embeddings: embeddings.len(),
            });
        }
        for embedding in embeddings {
            self.check_dimension(embedding)?;
        }

        for ((id, document), embedding) in ids.iter().zip(documents).zip(embeddings) {
            let internal_id = self.documents.len();
            self.hnsw.insert((embedding, internal_id));
            self.ids.push(*id);
            self.documents.push(document.clone());
        }

        debug!(
            "Collection '{}' now holds {} documents",
            self.name,
            self.documents.len()
        );

        Ok(())
    }

    fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<Vec<String>>, VectorIndexError> {
        query_embeddings
            .iter()
            .map(|query| {
                self.search(query, n_results)
                    .map(|hits| hits.into_iter().map(|(doc, _)| doc).collect())
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}
