mod lazy;
/// Embedding provider and inference plumbing
///
/// Architecture:
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local bi-encoder embedding (all-MiniLM-L6-v2, 384-dim)
/// - LazyModel for single-initialization of model handles
/// - InferencePool to keep blocking inference off the async executor
mod pool;
mod provider;

pub use lazy::LazyModel;
pub use pool::InferencePool;
pub use provider::{
    finalize_embeddings, validate_inputs, EmbeddingError, EmbeddingProvider, FastEmbedProvider,
};

use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for embedding generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub model: String,
    /// Embedding dimension (384 for MiniLM); must match the corpus
    pub dimension: usize,
    /// Batch size for inference
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            batch_size: 32,
        }
    }
}

/// Embed a query on the inference pool.
///
/// Any provider failure is fatal for the request: there is no meaningful
/// retrieval without a query vector, and zero vectors are never substituted.
pub async fn embed_query(
    provider: &Arc<dyn EmbeddingProvider>,
    pool: &InferencePool,
    query: &str,
) -> Result<Vec<f32>> {
    let provider_for_task = Arc::clone(provider);
    let text = query.to_string();

    let embedding = pool
        .run(move || provider_for_task.embed(&text))
        .await?
        .map_err(|e| RetrievalError::provider(provider.model_name(), e))?;

    if embedding.len() != provider.dimension() {
        return Err(RetrievalError::provider(
            provider.model_name(),
            EmbeddingError::DimensionMismatch {
                expected: provider.dimension(),
                actual: embedding.len(),
            },
        ));
    }

    Ok(embedding)
}

/// Scale a vector to unit length; `None` for zero or non-finite vectors
pub fn normalize(mut vector: Vec<f32>) -> Option<Vec<f32>> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm < f32::EPSILON {
        return None;
    }
    vector.iter_mut().for_each(|x| *x /= norm);
    Some(vector)
}

/// Cosine similarity in [-1, 1]; 0.0 for empty, mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
    }
}
