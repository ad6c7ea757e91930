//! Closed set of query scenarios and their parameter overrides

use super::params::{RetrievalParams, MAX_CANDIDATES, MAX_TOP_K};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Discrete classification of query intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Default,
    /// Exploratory, overview or how-to questions
    Broad,
    /// Short factual lookups and exact identifiers
    Precise,
    /// Request scoped to a single target document
    DocumentFocused,
    Troubleshooting,
    /// Resolution failed and the base configuration was used unmodified
    Fallback,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Broad => "broad",
            Self::Precise => "precise",
            Self::DocumentFocused => "document_focused",
            Self::Troubleshooting => "troubleshooting",
            Self::Fallback => "fallback",
        }
    }

    /// Parameter adjustments for this scenario
    pub fn profile(&self) -> ScenarioProfile {
        match self {
            Self::Default | Self::Fallback => ScenarioProfile::NEUTRAL,
            Self::Broad => ScenarioProfile {
                top_k_delta: 3,
                oversample_delta: 1,
                candidate_scale: 1.5,
                min_similarity_delta: -0.05,
                min_rerank_delta: -0.1,
                mmr_lambda: Some(0.5),
                uncap_documents: false,
            },
            Self::Precise => ScenarioProfile {
                top_k_delta: -3,
                oversample_delta: 0,
                candidate_scale: 0.75,
                min_similarity_delta: 0.05,
                min_rerank_delta: 0.1,
                mmr_lambda: Some(0.85),
                uncap_documents: false,
            },
            Self::DocumentFocused => ScenarioProfile {
                top_k_delta: 2,
                oversample_delta: 1,
                candidate_scale: 1.0,
                min_similarity_delta: -0.05,
                min_rerank_delta: 0.0,
                mmr_lambda: Some(0.8),
                uncap_documents: true,
            },
            Self::Troubleshooting => ScenarioProfile {
                top_k_delta: 2,
                oversample_delta: 1,
                candidate_scale: 1.25,
                min_similarity_delta: -0.03,
                min_rerank_delta: -0.05,
                mmr_lambda: Some(0.6),
                uncap_documents: false,
            },
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic adjustments relative to a base parameter set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioProfile {
    pub top_k_delta: i32,
    pub oversample_delta: i32,
    /// Multiplier for lexical, fusion and rerank ceilings
    pub candidate_scale: f32,
    pub min_similarity_delta: f32,
    pub min_rerank_delta: f32,
    /// Absolute MMR lambda, when the scenario pins one
    pub mmr_lambda: Option<f32>,
    /// Let a single document fill the whole result
    pub uncap_documents: bool,
}

impl ScenarioProfile {
    pub const NEUTRAL: Self = Self {
        top_k_delta: 0,
        oversample_delta: 0,
        candidate_scale: 1.0,
        min_similarity_delta: 0.0,
        min_rerank_delta: 0.0,
        mmr_lambda: None,
        uncap_documents: false,
    };

    /// Apply the profile to `base`, clamping into the valid range.
    ///
    /// The returned set is validated; an invalid result is an error, never a value.
    pub fn apply(&self, base: &RetrievalParams) -> Result<RetrievalParams> {
        let mut params = base.clone();

        params.top_k = offset(base.top_k, self.top_k_delta).clamp(1, MAX_TOP_K);
        params.oversample_factor = offset(base.oversample_factor, self.oversample_delta)
            .clamp(1, (MAX_CANDIDATES / params.top_k).max(1));

        params.lexical_candidates = scale(base.lexical_candidates, self.candidate_scale);
        params.fusion_candidates =
            scale(base.fusion_candidates, self.candidate_scale).max(params.top_k);
        params.rerank_candidates = scale(base.rerank_candidates, self.candidate_scale)
            .clamp(params.top_k, params.fusion_candidates);

        params.min_similarity = (base.min_similarity + self.min_similarity_delta).clamp(0.0, 1.0);
        params.min_rerank_score =
            (base.min_rerank_score + self.min_rerank_delta).clamp(0.0, 1.0);

        if let Some(lambda) = self.mmr_lambda {
            params.mmr_lambda = lambda.clamp(0.0, 1.0);
        }
        if self.uncap_documents {
            params.per_document_cap = params.top_k;
        }

        params.validate()?;
        Ok(params)
    }
}

fn offset(value: usize, delta: i32) -> usize {
    if delta >= 0 {
        value.saturating_add(delta as usize)
    } else {
        value.saturating_sub(delta.unsigned_abs() as usize)
    }
}

fn scale(value: usize, factor: f32) -> usize {
    let scaled = (value as f32 * factor).round();
    if scaled.is_finite() {
        (scaled as usize).clamp(1, MAX_CANDIDATES)
    } else {
        value.clamp(1, MAX_CANDIDATES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Scenario; 6] = [
        Scenario::Default,
        Scenario::Broad,
        Scenario::Precise,
        Scenario::DocumentFocused,
        Scenario::Troubleshooting,
        Scenario::Fallback,
    ];

    #[test]
    fn test_neutral_profile_is_identity() {
        let base = RetrievalParams::default();
        let applied = Scenario::Default.profile().apply(&base).unwrap();
        assert_eq!(applied, base);
    }

    #[test]
    fn test_every_profile_yields_valid_params() {
        let base = RetrievalParams::default();
        for scenario in ALL {
            let params = scenario.profile().apply(&base).unwrap();
            assert!(params.validate().is_ok(), "{} produced invalid params", scenario);
        }
    }

    #[test]
    fn test_profiles_clamp_extreme_base() {
        let base = RetrievalParams {
            top_k: 1,
            oversample_factor: 1,
            lexical_candidates: 1,
            fusion_candidates: 1,
            rerank_candidates: 1,
            min_similarity: 0.0,
            min_rerank_score: 1.0,
            ..Default::default()
        };
        for scenario in ALL {
            let params = scenario.profile().apply(&base).unwrap();
            assert!(params.top_k >= 1);
            assert!((0.0..=1.0).contains(&params.min_similarity));
            assert!((0.0..=1.0).contains(&params.min_rerank_score));
        }
    }

    #[test]
    fn test_broad_widens_and_diversifies() {
        let base = RetrievalParams::default();
        let params = Scenario::Broad.profile().apply(&base).unwrap();
        assert!(params.top_k > base.top_k);
        assert!(params.fusion_candidates > base.fusion_candidates);
        assert!(params.mmr_lambda < base.mmr_lambda);
        assert!(params.min_rerank_score < base.min_rerank_score);
    }

    #[test]
    fn test_profiles_keep_threshold_mode() {
        use crate::strategy::RerankThresholdMode;

        for mode in [RerankThresholdMode::Hard, RerankThresholdMode::Soft] {
            let base = RetrievalParams {
                rerank_threshold_mode: mode,
                ..Default::default()
            };
            for scenario in ALL {
                let params = scenario.profile().apply(&base).unwrap();
                assert_eq!(params.rerank_threshold_mode, mode, "{} changed the mode", scenario);
            }
        }
    }

    #[test]
    fn test_precise_narrows() {
        let base = RetrievalParams::default();
        let params = Scenario::Precise.profile().apply(&base).unwrap();
        assert_eq!(params.top_k, 5);
        assert!(params.min_rerank_score > base.min_rerank_score);
    }

    #[test]
    fn test_document_focused_lifts_cap() {
        let base = RetrievalParams::default();
        let params = Scenario::DocumentFocused.profile().apply(&base).unwrap();
        assert_eq!(params.per_document_cap, params.top_k);
    }
}
