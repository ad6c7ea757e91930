//! Tunable retrieval parameters shared by every pipeline stage

use crate::error::{RetrievalError, Result, ValidationError};
use serde::{Deserialize, Serialize};

/// Upper bound for the size of a final result
pub const MAX_TOP_K: usize = 100;

/// Upper bound for any candidate ceiling
pub const MAX_CANDIDATES: usize = 1000;

/// Largest same-language bonus accepted; keeps the bonus from inverting a real relevance gap
pub const MAX_LANGUAGE_BONUS: f32 = 0.2;

/// How the reranker applies `min_rerank_score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RerankThresholdMode {
    /// Candidates below the threshold are dropped (with a non-empty fallback)
    #[default]
    Hard,
    /// Candidates below the threshold are kept but ordered after those above it
    Soft,
}

impl RerankThresholdMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
        }
    }
}

impl std::str::FromStr for RerankThresholdMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "soft" => Ok(Self::Soft),
            other => Err(format!("expected 'hard' or 'soft', got '{}'", other)),
        }
    }
}

/// Base (or resolved) parameter set for one retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalParams {
    /// Number of passages in the final result
    pub top_k: usize,
    /// Vector recall fetches `top_k * oversample_factor` candidates
    pub oversample_factor: usize,
    /// Ceiling for lexical recall
    pub lexical_candidates: usize,
    /// Ceiling applied by fusion before reranking
    pub fusion_candidates: usize,
    /// Number of fused candidates scored by the cross-encoder
    pub rerank_candidates: usize,
    /// Minimum fused score (language bonus included)
    pub min_similarity: f32,
    /// Minimum normalized cross-encoder score
    pub min_rerank_score: f32,
    pub rerank_threshold_mode: RerankThresholdMode,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 is pure novelty
    pub mmr_lambda: f32,
    /// Maximum chunks per source document in one result
    pub per_document_cap: usize,
    pub vector_weight: f32,
    pub lexical_weight: f32,
    /// Added to the fused score when chunk and query languages match
    pub language_bonus: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 8,
            oversample_factor: 4,
            lexical_candidates: 40,
            fusion_candidates: 40,
            rerank_candidates: 24,
            min_similarity: 0.1,
            min_rerank_score: 0.3,
            rerank_threshold_mode: RerankThresholdMode::Hard,
            mmr_lambda: 0.7,
            per_document_cap: 2,
            vector_weight: 0.7,
            lexical_weight: 0.3,
            language_bonus: 0.05,
        }
    }
}

impl RetrievalParams {
    /// Oversampled candidate count for vector recall
    pub fn vector_candidates(&self) -> usize {
        self.top_k.saturating_mul(self.oversample_factor)
    }

    /// Validate every invariant, failing with the first violation
    pub fn validate(&self) -> Result<()> {
        match self.violations("").into_iter().next() {
            None => Ok(()),
            Some(v) => Err(RetrievalError::InvalidConfiguration(format!(
                "{}: {}",
                v.path, v.message
            ))),
        }
    }

    /// Collect every invariant violation, with keys prefixed by `prefix`
    pub fn violations(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let key = |name: &str| format!("{}{}", prefix, name);

        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            errors.push(ValidationError::new(
                key("top_k"),
                format!("must be between 1 and {}, got {}", MAX_TOP_K, self.top_k),
            ));
        }

        if self.oversample_factor == 0 {
            errors.push(ValidationError::new(
                key("oversample_factor"),
                "must be at least 1",
            ));
        }

        if self.vector_candidates() > MAX_CANDIDATES {
            errors.push(ValidationError::new(
                key("oversample_factor"),
                format!(
                    "top_k * oversample_factor must not exceed {}, got {}",
                    MAX_CANDIDATES,
                    self.vector_candidates()
                ),
            ));
        }

        for (name, value) in [
            ("lexical_candidates", self.lexical_candidates),
            ("fusion_candidates", self.fusion_candidates),
            ("rerank_candidates", self.rerank_candidates),
        ] {
            if value == 0 || value > MAX_CANDIDATES {
                errors.push(ValidationError::new(
                    key(name),
                    format!("must be between 1 and {}, got {}", MAX_CANDIDATES, value),
                ));
            }
        }

        if self.fusion_candidates < self.top_k {
            errors.push(ValidationError::new(
                key("fusion_candidates"),
                format!(
                    "must be at least top_k ({}), got {}",
                    self.top_k, self.fusion_candidates
                ),
            ));
        }

        if self.rerank_candidates < self.top_k || self.rerank_candidates > self.fusion_candidates
        {
            errors.push(ValidationError::new(
                key("rerank_candidates"),
                format!(
                    "must be between top_k ({}) and fusion_candidates ({}), got {}",
                    self.top_k, self.fusion_candidates, self.rerank_candidates
                ),
            ));
        }

        for (name, value) in [
            ("min_similarity", self.min_similarity),
            ("min_rerank_score", self.min_rerank_score),
            ("mmr_lambda", self.mmr_lambda),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ValidationError::new(
                    key(name),
                    format!("must be within [0, 1], got {}", value),
                ));
            }
        }

        if self.per_document_cap == 0 {
            errors.push(ValidationError::new(
                key("per_document_cap"),
                "must be at least 1",
            ));
        }

        let weights_valid = self.vector_weight.is_finite()
            && self.lexical_weight.is_finite()
            && self.vector_weight >= 0.0
            && self.lexical_weight >= 0.0
            && self.vector_weight + self.lexical_weight > 0.0;
        if !weights_valid {
            errors.push(ValidationError::new(
                key("vector_weight"),
                format!(
                    "weights must be non-negative with a positive sum, got vector={} lexical={}",
                    self.vector_weight, self.lexical_weight
                ),
            ));
        }

        if !(0.0..=MAX_LANGUAGE_BONUS).contains(&self.language_bonus) {
            errors.push(ValidationError::new(
                key("language_bonus"),
                format!(
                    "must be within [0, {}], got {}",
                    MAX_LANGUAGE_BONUS, self.language_bonus
                ),
            ));
        }

        errors
    }
}
