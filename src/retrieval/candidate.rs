//! Per-request candidate wrapper around a chunk

use crate::corpus::{Chunk, ChunkId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which recall stage(s) produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Vector,
    Lexical,
    Both,
}

impl RetrievalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Lexical => "lexical",
            Self::Both => "both",
        }
    }

    fn merge(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::Both
        }
    }
}

/// Breakdown of the fused score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedScore {
    /// Vector similarity clamped to [0, 1]
    pub normalized_vector: f32,
    /// Lexical score rescaled by the batch maximum
    pub normalized_lexical: f32,
    /// Weighted combination before the language bonus
    pub base: f32,
    pub language_bonus: f32,
    /// `base + language_bonus`
    pub total: f32,
}

/// A chunk plus the scores accumulated by each stage.
///
/// Stages extend a candidate with `with_*` and never clear earlier signals,
/// so the fused score and language bonus survive reranking and the MMR score
/// reaches the caller.
#[derive(Debug, Clone)]
pub struct Candidate {
    chunk: Arc<Chunk>,
    source: RetrievalSource,
    vector_score: Option<f32>,
    lexical_score: Option<f32>,
    fused: Option<FusedScore>,
    rerank_score: Option<f32>,
    mmr_score: Option<f32>,
}

impl Candidate {
    fn new(chunk: Arc<Chunk>, source: RetrievalSource) -> Self {
        Self {
            chunk,
            source,
            vector_score: None,
            lexical_score: None,
            fused: None,
            rerank_score: None,
            mmr_score: None,
        }
    }

    pub fn from_vector(chunk: Arc<Chunk>, similarity: f32) -> Self {
        Self {
            vector_score: Some(similarity),
            ..Self::new(chunk, RetrievalSource::Vector)
        }
    }

    pub fn from_lexical(chunk: Arc<Chunk>, score: f32) -> Self {
        Self {
            lexical_score: Some(score),
            ..Self::new(chunk, RetrievalSource::Lexical)
        }
    }

    /// Union of two candidates for the same chunk; per-source scores keep
    /// the higher value when both sides carry one.
    pub fn merge(self, other: Candidate) -> Self {
        debug_assert_eq!(self.chunk.id, other.chunk.id);
        Self {
            source: self.source.merge(other.source),
            vector_score: max_option(self.vector_score, other.vector_score),
            lexical_score: max_option(self.lexical_score, other.lexical_score),
            ..self
        }
    }

    pub fn with_fused(self, fused: FusedScore) -> Self {
        Self {
            fused: Some(fused),
            ..self
        }
    }

    pub fn with_rerank(self, score: f32) -> Self {
        Self {
            rerank_score: Some(score),
            ..self
        }
    }

    pub fn with_mmr(self, score: f32) -> Self {
        Self {
            mmr_score: Some(score),
            ..self
        }
    }

    pub fn chunk(&self) -> &Arc<Chunk> {
        &self.chunk
    }

    pub fn chunk_id(&self) -> ChunkId {
        self.chunk.id
    }

    pub fn document_id(&self) -> &str {
        &self.chunk.document_id
    }

    pub fn source(&self) -> RetrievalSource {
        self.source
    }

    pub fn vector_score(&self) -> Option<f32> {
        self.vector_score
    }

    pub fn lexical_score(&self) -> Option<f32> {
        self.lexical_score
    }

    pub fn fused(&self) -> Option<&FusedScore> {
        self.fused.as_ref()
    }

    /// Fused total, 0.0 before fusion
    pub fn fused_score(&self) -> f32 {
        self.fused.map_or(0.0, |f| f.total)
    }

    pub fn rerank_score(&self) -> Option<f32> {
        self.rerank_score
    }

    pub fn mmr_score(&self) -> Option<f32> {
        self.mmr_score
    }

    /// Primary ranking key: rerank score when present, otherwise fused score
    pub fn relevance(&self) -> f32 {
        self.rerank_score.unwrap_or_else(|| self.fused_score())
    }
}

fn max_option(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u64) -> Arc<Chunk> {
        Arc::new(Chunk {
            id,
            document_id: "doc".to_string(),
            ordinal: 0,
            text: "text".to_string(),
            language: "en".to_string(),
            embedding: vec![1.0, 0.0],
        })
    }

    #[test]
    fn test_merge_sets_both() {
        let c = chunk(1);
        let merged =
            Candidate::from_vector(Arc::clone(&c), 0.8).merge(Candidate::from_lexical(c, 3.5));
        assert_eq!(merged.source(), RetrievalSource::Both);
        assert_eq!(merged.vector_score(), Some(0.8));
        assert_eq!(merged.lexical_score(), Some(3.5));
    }

    #[test]
    fn test_merge_same_source_keeps_max() {
        let c = chunk(1);
        let merged =
            Candidate::from_vector(Arc::clone(&c), 0.4).merge(Candidate::from_vector(c, 0.6));
        assert_eq!(merged.source(), RetrievalSource::Vector);
        assert_eq!(merged.vector_score(), Some(0.6));
    }

    #[test]
    fn test_stages_extend_without_erasing() {
        let fused = FusedScore {
            normalized_vector: 0.5,
            normalized_lexical: 0.0,
            base: 0.35,
            language_bonus: 0.05,
            total: 0.4,
        };
        let candidate = Candidate::from_vector(chunk(1), 0.5).with_fused(fused);
        assert_eq!(candidate.relevance(), 0.4);

        let candidate = candidate.with_rerank(0.9).with_mmr(0.6);
        assert_eq!(candidate.relevance(), 0.9);
        assert_eq!(candidate.fused().map(|f| f.language_bonus), Some(0.05));
        assert_eq!(candidate.mmr_score(), Some(0.6));
    }
}
