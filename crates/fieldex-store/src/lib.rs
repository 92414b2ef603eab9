//! Fieldex Storage Layer
//!
//! In-memory retrieval infrastructure for a single extraction run.
//!
//! # Architecture
//!
//! - [`VectorIndex`]: HNSW nearest-neighbour index holding chunk texts,
//!   implements [`fieldex_domain::VectorStore`]
//! - [`MockEmbeddingModel`]: deterministic hash-based embeddings for tests and
//!   offline runs, implements [`fieldex_domain::EmbeddingModel`]
//!
//! Nothing here is persisted: every run builds a fresh collection with a
//! random name and drops it when the run ends.
//!
//! # Examples
//!
//! ```
//! use fieldex_domain::{ChunkId, EmbeddingModel, VectorStore};
//! use fieldex_store::{MockEmbeddingModel, VectorIndex};
//!
//! let model = MockEmbeddingModel::new(64);
//! let mut index = VectorIndex::new(64);
//!
//! let docs = vec!["Patient is 54 years old.".to_string()];
//! let embeddings = vec![model.embed(&docs[0]).unwrap()];
//! index.add(&[ChunkId::new()], &docs, &embeddings).unwrap();
//!
//! let hits = index.query(&embeddings, 4).unwrap();
//! assert_eq!(hits[0], docs);
//! ```

#![warn(missing_docs)]

pub mod embedding;
pub mod vector_index;

pub use embedding::{cosine_similarity, EmbeddingError, MockEmbeddingModel};
pub use vector_index::{collection_name, VectorIndex, VectorIndexError};
