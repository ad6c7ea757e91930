//! Weighted score fusion for combining vector and lexical candidates

use super::candidate::{Candidate, FusedScore};
use crate::corpus::ChunkId;
use crate::strategy::{RetrievalParams, MAX_LANGUAGE_BONUS};
use ahash::AHashMap;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be non-negative with a positive sum")]
    InvalidWeights,
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Weight for vector similarity, normalized against `lexical_weight`
    pub vector_weight: f32,

    /// Weight for the normalized lexical score
    pub lexical_weight: f32,

    /// Bonus for chunks in the query language, capped at [`MAX_LANGUAGE_BONUS`]
    pub language_bonus: f32,

    /// Candidates whose fused total falls below this are dropped
    pub min_similarity: f32,

    /// Maximum number of fused candidates handed to the reranker
    pub candidate_ceiling: usize,

    /// Declared or detected query language
    pub query_language: Option<String>,
}

impl FusionConfig {
    pub fn new(
        params: &RetrievalParams,
        query_language: Option<String>,
    ) -> Result<Self, FusionError> {
        let (vw, lw) = (params.vector_weight, params.lexical_weight);
        if !(vw >= 0.0 && lw >= 0.0 && vw + lw > 0.0) {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            vector_weight: vw / (vw + lw),
            lexical_weight: lw / (vw + lw),
            language_bonus: params.language_bonus.clamp(0.0, MAX_LANGUAGE_BONUS),
            min_similarity: params.min_similarity,
            candidate_ceiling: params.fusion_candidates,
            query_language,
        })
    }
}

/// Merge vector and lexical candidates into one fused, truncated list
///
/// 1. Union by chunk id (tag `both` when present in both sets)
/// 2. Rescale lexical scores by the batch maximum
/// 3. `base = vector_weight * similarity + lexical_weight * lexical`
/// 4. Add the language bonus when chunk and query languages match
/// 5. Drop totals below `min_similarity`
/// 6. Truncate to `candidate_ceiling`
///
/// # Returns
/// Candidates sorted by fused total descending, ties broken by chunk id
pub fn fuse(
    vector_candidates: Vec<Candidate>,
    lexical_candidates: Vec<Candidate>,
    config: &FusionConfig,
) -> Vec<Candidate> {
    let mut merged: AHashMap<ChunkId, Candidate> =
        AHashMap::with_capacity(vector_candidates.len() + lexical_candidates.len());

    for candidate in vector_candidates.into_iter().chain(lexical_candidates) {
        let id = candidate.chunk_id();
        let entry = match merged.remove(&id) {
            Some(existing) => existing.merge(candidate),
            None => candidate,
        };
        merged.insert(id, entry);
    }

    let max_lexical = merged
        .values()
        .filter_map(|c| c.lexical_score())
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max);

    let mut fused: Vec<Candidate> = merged
        .into_values()
        .map(|candidate| {
            let score = fused_score(&candidate, max_lexical, config);
            candidate.with_fused(score)
        })
        .filter(|c| c.fused_score() >= config.min_similarity)
        .collect();

    fused.sort_by(compare_fused);
    fused.truncate(config.candidate_ceiling);
    fused
}

fn fused_score(candidate: &Candidate, max_lexical: f32, config: &FusionConfig) -> FusedScore {
    let normalized_vector = candidate
        .vector_score()
        .filter(|s| s.is_finite())
        .map_or(0.0, |s| s.clamp(0.0, 1.0));

    let normalized_lexical = match candidate.lexical_score() {
        Some(s) if s.is_finite() && max_lexical > 0.0 => (s / max_lexical).clamp(0.0, 1.0),
        _ => 0.0,
    };

    let base =
        config.vector_weight * normalized_vector + config.lexical_weight * normalized_lexical;

    let language_bonus = match &config.query_language {
        Some(lang) if lang.eq_ignore_ascii_case(&candidate.chunk().language) => {
            config.language_bonus
        }
        _ => 0.0,
    };

    FusedScore {
        normalized_vector,
        normalized_lexical,
        base,
        language_bonus,
        total: base + language_bonus,
    }
}

/// Fused total descending, then chunk id ascending
pub(crate) fn compare_fused(a: &Candidate, b: &Candidate) -> Ordering {
    b.fused_score()
        .partial_cmp(&a.fused_score())
        .unwrap_or(Ordering::Equal)
        .then(a.chunk_id().cmp(&b.chunk_id()))
}
