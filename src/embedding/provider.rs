/// Embedding provider trait and FastEmbed implementation
use super::lazy::LazyModel;
use super::normalize;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
///
/// Implementations are blocking and CPU-bound; async callers go through
/// [`InferencePool`](super::InferencePool).
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, one unit vector per input
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }
}

/// Reject empty inputs up front; the model would embed them as noise
pub fn validate_inputs(texts: &[String]) -> Result<(), EmbeddingError> {
    if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(EmbeddingError::InvalidInput(format!(
            "Text at position {} is empty",
            position
        )));
    }
    Ok(())
}

/// Check dimensions and unit-normalize raw model output
pub fn finalize_embeddings(
    raw: Vec<Vec<f32>>,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if raw.len() != expected_count {
        return Err(EmbeddingError::GenerationError(format!(
            "Embedding count mismatch: expected {}, got {}",
            expected_count,
            raw.len()
        )));
    }

    raw.into_iter()
        .map(|embedding| {
            if embedding.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            normalize(embedding).ok_or_else(|| {
                EmbeddingError::GenerationError("Model produced a zero vector".to_string())
            })
        })
        .collect()
}

/// FastEmbed bi-encoder provider
///
/// The ONNX model is loaded on first use, not at construction, so building
/// a provider is cheap and never touches the network.
pub struct FastEmbedProvider {
    model: LazyModel<TextEmbedding>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl FastEmbedProvider {
    /// Create a provider for the named model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use.
    /// - all-MiniLM-L6-v2: 90MB (384 dims)
    /// - bge-small-en-v1.5: 130MB (384 dims)
    /// - bge-base-en-v1.5: 440MB (768 dims)
    /// - multilingual-e5-small: 470MB (384 dims)
    pub fn new(model_name: &str, batch_size: usize) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = resolve_model(model_name)?;

        let name = model_name.to_string();
        let model = LazyModel::new(name.clone(), move || {
            let options =
                InitOptions::new(embedding_model.clone()).with_show_download_progress(false);
            TextEmbedding::try_new(options)
        });

        Ok(Self {
            model,
            model_name: name,
            dimension,
            batch_size: batch_size.max(1),
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2", 32)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        validate_inputs(texts)?;

        let model = self
            .model
            .get()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        let raw = model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        finalize_embeddings(raw, texts.len(), self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn resolve_model(model_name: &str) -> Result<(EmbeddingModel, usize), EmbeddingError> {
    match model_name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "multilingual-e5-small" => Ok((EmbeddingModel::MultilingualE5Small, 384)),
        "multilingual-e5-base" => Ok((EmbeddingModel::MultilingualE5Base, 768)),
        _ => Err(EmbeddingError::InitializationError(format!(
            "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small, multilingual-e5-base",
            model_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_is_lazy() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert!(!provider.is_loaded());
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_unsupported_model() {
        assert!(matches!(
            FastEmbedProvider::new("word2vec", 8),
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[test]
    fn test_empty_text_rejected_before_load() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let result = provider.embed_batch(&["ok".to_string(), "  ".to_string()]);
        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
        assert!(!provider.is_loaded());
    }

    #[test]
    fn test_finalize_normalizes() {
        let out = finalize_embeddings(vec![vec![3.0, 4.0]], 1, 2).unwrap();
        assert!((out[0][0] - 0.6).abs() < 1e-6);
        assert!((out[0][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_finalize_rejects_zero_and_mismatch() {
        assert!(finalize_embeddings(vec![vec![0.0, 0.0]], 1, 2).is_err());
        assert!(matches!(
            finalize_embeddings(vec![vec![1.0, 0.0, 0.0]], 1, 2),
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
        assert!(finalize_embeddings(vec![], 1, 2).is_err());
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider.embed("This is a test sentence for embedding.").unwrap();
        assert_eq!(embedding.len(), 384);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-3);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_semantic_similarity() {
        let provider = FastEmbedProvider::with_default_model().unwrap();

        let emb1 = provider.embed("The cat sits on the mat.").unwrap();
        let emb2 = provider.embed("A feline rests on the rug.").unwrap();
        let emb3 = provider.embed("Python programming language.").unwrap();

        let sim_1_2 = super::super::cosine_similarity(&emb1, &emb2);
        let sim_1_3 = super::super::cosine_similarity(&emb1, &emb3);

        assert!(sim_1_2 > sim_1_3);
    }
}
