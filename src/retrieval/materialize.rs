//! Caller-facing result assembly

use super::candidate::{Candidate, RetrievalSource};
use crate::corpus::ChunkId;
use crate::strategy::Scenario;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One passage of the final result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPassage {
    pub chunk_id: ChunkId,
    pub document_id: String,
    pub ordinal: u32,
    pub text: String,
    pub language: String,
    /// Composite score: rerank score, or fused score when reranking was skipped
    pub score: f32,
    pub fused_score: f32,
    pub rerank_score: Option<f32>,
    pub mmr_score: Option<f32>,
    pub source: RetrievalSource,
}

impl From<Candidate> for RankedPassage {
    fn from(candidate: Candidate) -> Self {
        let chunk = candidate.chunk();
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id.clone(),
            ordinal: chunk.ordinal,
            text: chunk.text.clone(),
            language: chunk.language.clone(),
            score: candidate.relevance(),
            fused_score: candidate.fused_score(),
            rerank_score: candidate.rerank_score(),
            mmr_score: candidate.mmr_score(),
            source: candidate.source(),
        }
    }
}

/// What each stage did for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub request_id: Uuid,
    pub scenario: Scenario,
    /// False when the strategy passed the base configuration through
    pub adaptive: bool,
    pub effective_top_k: usize,
    pub query_language: Option<String>,
    pub vector_candidates: usize,
    pub lexical_candidates: usize,
    pub fused_candidates: usize,
    pub reranked_candidates: usize,
    /// Lexical recall failed; vector candidates only
    pub lexical_degraded: bool,
    /// Reranker failed; fused order used
    pub rerank_degraded: bool,
    /// Some returned passage scored below the rerank threshold: hard mode
    /// rejected everything, or soft mode filled slots from its reserve
    pub rerank_fallback: bool,
    pub elapsed_ms: u64,
}

impl Diagnostics {
    pub fn new(request_id: Uuid, scenario: Scenario) -> Self {
        Self {
            request_id,
            scenario,
            adaptive: false,
            effective_top_k: 0,
            query_language: None,
            vector_candidates: 0,
            lexical_candidates: 0,
            fused_candidates: 0,
            reranked_candidates: 0,
            lexical_degraded: false,
            rerank_degraded: false,
            rerank_fallback: false,
            elapsed_ms: 0,
        }
    }
}

/// Ordered passages with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub passages: Vec<RankedPassage>,
    pub diagnostics: Diagnostics,
}

impl RankedResult {
    pub fn empty(diagnostics: Diagnostics) -> Self {
        Self {
            passages: Vec::new(),
            diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.passages.iter().map(|p| p.chunk_id).collect()
    }
}

/// Map selected candidates to passages, keeping selection order
///
/// `top_k` is an upper bound only; selection order is never re-sorted.
pub fn materialize(selected: Vec<Candidate>, top_k: usize, diagnostics: Diagnostics) -> RankedResult {
    RankedResult {
        passages: selected
            .into_iter()
            .take(top_k)
            .map(RankedPassage::from)
            .collect(),
        diagnostics,
    }
}
