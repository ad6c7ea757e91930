/// Read-only corpus access
///
/// Architecture:
/// - Corpus trait: vector query, keyword query, fetch-by-id
/// - IndexedCorpus: HNSW vector index + tantivy keyword index + chunk map
/// - Every query is filterable by document and language
mod indexed;
mod keyword_index;
mod vector_index;

pub use indexed::IndexedCorpus;
pub use keyword_index::{KeywordIndex, KeywordIndexError, KeywordSearchResult, KeywordSearcher};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub type ChunkId = u64;

/// Immutable unit of retrievable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    /// Owning document
    pub document_id: String,
    /// Position within the document
    pub ordinal: u32,
    pub text: String,
    /// Language tag, e.g. "en"
    pub language: String,
    /// Unit-normalized embedding
    pub embedding: Vec<f32>,
}

/// Restricts a corpus query to one document and/or one language
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusFilter {
    pub document_id: Option<String>,
    pub language: Option<String>,
}

impl CorpusFilter {
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            language: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.language.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.document_id
            .as_deref()
            .map_or(true, |d| d == chunk.document_id)
            && self.language.as_deref().map_or(true, |l| l == chunk.language)
    }
}

/// A scored chunk reference returned by a corpus query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusHit {
    pub chunk_id: ChunkId,
    pub score: f32,
}

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    #[error("Keyword index error: {0}")]
    KeywordIndex(#[from] KeywordIndexError),

    #[error("Invalid chunk {id}: {message}")]
    InvalidChunk { id: ChunkId, message: String },

    #[error("Corpus unavailable: {0}")]
    Unavailable(String),
}

impl From<CorpusError> for RetrievalError {
    fn from(err: CorpusError) -> Self {
        RetrievalError::CorpusUnavailable(err.to_string())
    }
}

/// Read-only corpus interface consumed by the recall stages
///
/// Implementations must tolerate concurrent readers; the corpus is assumed
/// immutable for the lifetime of a request.
#[async_trait]
pub trait Corpus: Send + Sync {
    /// Nearest neighbours by cosine similarity, descending
    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<CorpusHit>, CorpusError>;

    /// Full-text matches by keyword relevance, descending
    async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<CorpusHit>, CorpusError>;

    /// Fetch chunks by id; unknown ids are skipped
    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Arc<Chunk>>, CorpusError>;

    /// Number of chunks
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension shared by every chunk
    fn dimension(&self) -> usize;
}

/// Index construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub vector_dim: usize,
    /// Max connections per HNSW layer
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub max_elements: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            max_elements: 100_000,
        }
    }
}
