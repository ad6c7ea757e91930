use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{Result, RetrievalError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_reranker(config, &mut errors);

        // Retrieval parameters carry their own invariants
        errors.extend(config.retrieval.violations("retrieval."));

        Self::validate_inference(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_profiles(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RetrievalError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_reranker(config: &Config, errors: &mut Vec<ValidationError>) {
        let reranker = &config.reranker;

        if reranker.enabled && reranker.model.is_empty() {
            errors.push(ValidationError::new(
                "reranker.model",
                "Model name cannot be empty when reranking is enabled",
            ));
        }

        if reranker.batch_size == 0 {
            errors.push(ValidationError::new(
                "reranker.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if reranker.fallback_count == 0 {
            errors.push(ValidationError::new(
                "reranker.fallback_count",
                "Fallback count must be at least 1",
            ));
        }

        if reranker.max_passage_chars > 0 && reranker.max_passage_chars < 64 {
            errors.push(ValidationError::new(
                "reranker.max_passage_chars",
                format!(
                    "Passage bound must be 0 (disabled) or at least 64, got {}",
                    reranker.max_passage_chars
                ),
            ));
        }
    }

    fn validate_inference(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.inference.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "inference.max_concurrent",
                "At least one inference worker is required",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        let indexing = &config.indexing;

        if indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if indexing.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }

        if indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if indexing.max_elements == 0 {
            errors.push(ValidationError::new(
                "indexing.max_elements",
                "Index capacity must be greater than 0",
            ));
        }
    }

    fn validate_profiles(config: &Config, errors: &mut Vec<ValidationError>) {
        for (name, overrides) in &config.profiles {
            if overrides.top_k == Some(0) {
                errors.push(ValidationError::new(
                    format!("profiles.{}.top_k", name),
                    "top_k must be greater than 0",
                ));
            }

            if overrides.embedding_model.as_deref() == Some("") {
                errors.push(ValidationError::new(
                    format!("profiles.{}.embedding_model", name),
                    "Model name cannot be empty",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileOverrides;

    fn errors_of(config: &Config) -> Vec<ValidationError> {
        match ConfigValidator::validate(config) {
            Err(RetrievalError::ConfigValidation { errors }) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.embedding.batch_size = 0;
        config.inference.max_concurrent = 0;
        config.retrieval.mmr_lambda = 1.5;

        let paths: Vec<_> = errors_of(&config).into_iter().map(|e| e.path).collect();
        assert!(paths.contains(&"embedding.batch_size".to_string()));
        assert!(paths.contains(&"inference.max_concurrent".to_string()));
        assert!(paths.contains(&"retrieval.mmr_lambda".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let mut config = Config::default();
        config.meta.schema_version = "0.1.0".to_string();
        assert_eq!(errors_of(&config)[0].path, "_meta.schema_version");
    }

    #[test]
    fn test_passage_bound() {
        let mut config = Config::default();
        config.reranker.max_passage_chars = 10;
        assert!(ConfigValidator::validate(&config).is_err());

        config.reranker.max_passage_chars = 0;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "broken".to_string(),
            ProfileOverrides {
                top_k: Some(0),
                ..ProfileOverrides::default()
            },
        );
        assert_eq!(errors_of(&config)[0].path, "profiles.broken.top_k");
    }
}
