//! Cross-encoder reranking using FastEmbed

use super::candidate::Candidate;
use crate::embedding::{InferencePool, LazyModel};
use crate::strategy::{RerankThresholdMode, RetrievalParams};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Pairwise (query, passage) relevance model
///
/// Blocking and CPU-bound; [`Reranker`] runs it on the inference pool.
pub trait CrossEncoder: Send + Sync {
    /// Raw relevance logits, one per passage, in input order
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;
}

/// FastEmbed cross-encoder, loaded on first use
pub struct FastEmbedReranker {
    model: LazyModel<TextRerank>,
    model_name: String,
    batch_size: usize,
}

impl FastEmbedReranker {
    /// Create a reranker for the named model
    ///
    /// # Arguments
    /// * `model_name` - Model name (e.g., "bge-reranker-base")
    pub fn new(model_name: &str, batch_size: usize) -> Result<Self, RerankError> {
        let reranker_model = resolve_model(model_name)?;

        let name = model_name.to_string();
        let model = LazyModel::new(name.clone(), move || {
            let init_options =
                RerankInitOptions::new(reranker_model.clone()).with_show_download_progress(false);
            TextRerank::try_new(init_options)
        });

        Ok(Self {
            model,
            model_name: name,
            batch_size: batch_size.max(1),
        })
    }

    /// Create reranker with default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new("bge-reranker-base", 8)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }
}

impl CrossEncoder for FastEmbedReranker {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let model = self
            .model
            .get()
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        let documents: Vec<&str> = passages.iter().map(|s| s.as_str()).collect();
        let results = model
            .rerank(query, documents, false, Some(self.batch_size))
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // Results come back sorted by score; restore input order
        let mut scores = vec![f32::NAN; passages.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn resolve_model(model_name: &str) -> Result<RerankerModel, RerankError> {
    match model_name.to_ascii_lowercase().as_str() {
        "bge-reranker-base" | "baai/bge-reranker-base" => Ok(RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" | "baai/bge-reranker-v2-m3" => Ok(RerankerModel::BGERerankerV2M3),
        "jina-reranker-v1-turbo-en" => Ok(RerankerModel::JINARerankerV1TurboEn),
        _ => Err(RerankError::InitializationError(format!(
            "Unsupported reranker model: {}. Supported: bge-reranker-base, bge-reranker-v2-m3, jina-reranker-v1-turbo-en",
            model_name
        ))),
    }
}

/// Per-request reranking parameters
#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Number of top fused candidates scored; the rest are dropped
    pub candidates: usize,
    /// Threshold on the squashed score, in [0, 1]
    pub min_score: f32,
    pub mode: RerankThresholdMode,
    /// Passages per model call
    pub batch_size: usize,
    /// Passage length bound in characters; 0 disables bounding
    pub max_passage_chars: usize,
    /// Candidates kept when a hard threshold would reject everything
    pub fallback_count: usize,
}

impl RerankConfig {
    pub fn new(
        params: &RetrievalParams,
        batch_size: usize,
        max_passage_chars: usize,
        fallback_count: usize,
    ) -> Self {
        Self {
            candidates: params.rerank_candidates,
            min_score: params.min_rerank_score,
            mode: params.rerank_threshold_mode,
            batch_size: batch_size.max(1),
            max_passage_chars,
            fallback_count: fallback_count.max(1),
        }
    }
}

/// Reranked candidates plus what happened along the way
#[derive(Debug, Clone, Default)]
pub struct RerankOutcome {
    /// Candidates at or above the threshold, in rerank order
    pub candidates: Vec<Candidate>,
    /// Soft mode only: below-threshold candidates, eligible solely for
    /// slots `candidates` cannot fill
    pub reserve: Vec<Candidate>,
    /// Number of candidates sent to the model
    pub scored: usize,
    /// Model failed; candidates passed through in fused order
    pub degraded: bool,
    /// Hard threshold rejected everything; top `fallback_count` kept
    pub fallback_used: bool,
}

/// Reranking stage: bounded, batched cross-encoder scoring with a
/// threshold filter that never empties a non-empty input.
#[derive(Clone)]
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
    pool: InferencePool,
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, pool: InferencePool) -> Self {
        Self { encoder, pool }
    }

    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Rerank `candidates`, which must arrive in fused order
    ///
    /// Only the first `config.candidates` are scored. Candidates past that
    /// ceiling are dropped, not appended unscored, so this is a second
    /// truncation after fusion.
    ///
    /// Sets `rerank_score` (logistic-squashed into [0, 1]) on every scored
    /// candidate. Below-threshold candidates are removed in hard mode (unless
    /// nothing passes, see `fallback_count`) and moved to `reserve` in soft
    /// mode. On any model failure the full input is returned unchanged with
    /// `degraded` set.
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<Candidate>,
        config: &RerankConfig,
    ) -> RerankOutcome {
        if candidates.is_empty() || config.candidates == 0 {
            return RerankOutcome {
                candidates,
                ..RerankOutcome::default()
            };
        }

        let passages: Vec<String> = candidates
            .iter()
            .take(config.candidates)
            .map(|c| bound_passage(&c.chunk().text, config.max_passage_chars).to_string())
            .collect();
        let scored = passages.len();

        let raw = match self.score_batches(query, passages, config.batch_size).await {
            Ok(raw) => raw,
            Err(message) => {
                warn!(
                    "Reranker {} unavailable, using fused order: {}",
                    self.encoder.model_name(),
                    message
                );
                return RerankOutcome {
                    candidates,
                    degraded: true,
                    ..RerankOutcome::default()
                };
            }
        };

        candidates.truncate(scored);
        let mut reranked: Vec<Candidate> = candidates
            .into_iter()
            .zip(raw)
            .map(|(candidate, logit)| candidate.with_rerank(sigmoid(logit)))
            .collect();
        reranked.sort_by(compare_reranked);

        let outcome = apply_threshold(reranked, config);
        debug!(
            "Reranked {} candidates, {} kept, {} in reserve{}",
            scored,
            outcome.candidates.len(),
            outcome.reserve.len(),
            if outcome.fallback_used { " (fallback)" } else { "" }
        );

        RerankOutcome { scored, ..outcome }
    }

    /// Score all passages in `batch_size` chunks within one pool task
    async fn score_batches(
        &self,
        query: &str,
        passages: Vec<String>,
        batch_size: usize,
    ) -> Result<Vec<f32>, String> {
        let encoder = Arc::clone(&self.encoder);
        let query = query.to_string();
        let expected = passages.len();

        let raw = self
            .pool
            .run(move || -> Result<Vec<f32>, RerankError> {
                let mut scores = Vec::with_capacity(passages.len());
                for batch in passages.chunks(batch_size) {
                    let batch_scores = encoder.score(&query, batch)?;
                    if batch_scores.len() != batch.len() {
                        return Err(RerankError::RerankingError(format!(
                            "expected {} scores, got {}",
                            batch.len(),
                            batch_scores.len()
                        )));
                    }
                    scores.extend(batch_scores);
                }
                Ok(scores)
            })
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;

        if raw.len() != expected || raw.iter().any(|s| !s.is_finite()) {
            return Err("model returned missing or non-finite scores".to_string());
        }

        Ok(raw)
    }
}

fn apply_threshold(reranked: Vec<Candidate>, config: &RerankConfig) -> RerankOutcome {
    let passes = |c: &Candidate| c.rerank_score().unwrap_or(0.0) >= config.min_score;
    let (above, below): (Vec<_>, Vec<_>) = reranked.into_iter().partition(passes);

    match config.mode {
        RerankThresholdMode::Hard if above.is_empty() => {
            let mut fallback = below;
            fallback.truncate(config.fallback_count);
            RerankOutcome {
                candidates: fallback,
                fallback_used: true,
                ..RerankOutcome::default()
            }
        }
        RerankThresholdMode::Hard => RerankOutcome {
            candidates: above,
            ..RerankOutcome::default()
        },
        RerankThresholdMode::Soft => RerankOutcome {
            candidates: above,
            reserve: below,
            ..RerankOutcome::default()
        },
    }
}

/// Rerank score descending, then fused score, then chunk id
fn compare_reranked(a: &Candidate, b: &Candidate) -> Ordering {
    let rerank = |c: &Candidate| c.rerank_score().unwrap_or(f32::NEG_INFINITY);
    rerank(b)
        .partial_cmp(&rerank(a))
        .unwrap_or(Ordering::Equal)
        .then_with(|| super::fusion::compare_fused(a, b))
}

/// Logistic squashing of a raw cross-encoder logit into [0, 1]
pub fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

/// Bound `text` to at most `max_chars` characters, cutting at the last
/// paragraph break, sentence end or whitespace in the second half of the
/// window before resorting to a hard cut.
pub fn bound_passage(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return text;
    }

    let limit = match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => byte_index,
        None => return text,
    };
    let window = &text[..limit];
    let floor = window.len() / 2;

    if let Some(i) = window.rfind("\n\n").filter(|&i| i >= floor) {
        return window[..i].trim_end();
    }

    if let Some(i) = last_sentence_end(window).filter(|&i| i >= floor) {
        return &window[..i];
    }

    if let Some(i) = window.rfind(char::is_whitespace).filter(|&i| i >= floor) {
        return window[..i].trim_end();
    }

    window
}

/// Byte offset just past the last sentence terminator followed by whitespace
/// or the end of the window
fn last_sentence_end(window: &str) -> Option<usize> {
    window
        .char_indices()
        .filter(|&(_, c)| matches!(c, '.' | '!' | '?' | '。' | '！' | '？'))
        .map(|(i, c)| i + c.len_utf8())
        .filter(|&end| window[end..].chars().next().map_or(true, char::is_whitespace))
        .last()
}
