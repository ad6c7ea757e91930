//! Configuration management for the retrieval core
//!
//! Base (non-adaptive) defaults for every tunable parameter come from a TOML
//! file, optionally overridden by a key-value source such as the environment.
//! A missing or broken source falls back to the hardcoded defaults.

use crate::corpus::IndexConfig;
use crate::embedding::EmbeddingConfig;
use crate::error::{Result, RetrievalError};
use crate::strategy::{Channel, RetrievalParams, StrategySettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod source;
mod validator;

pub use source::{ConfigSource, EnvSource, MapSource, ENV_PREFIX};
pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub embedding: EmbeddingConfig,
    pub reranker: RerankerConfig,
    pub retrieval: RetrievalParams,
    pub strategy: StrategySettings,
    pub inference: InferenceConfig,
    pub indexing: IndexingConfig,
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: current_timestamp(),
            last_modified: current_timestamp(),
        }
    }
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Cross-encoder reranker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub model: String,
    /// Passages per model call
    pub batch_size: usize,
    /// Passage length bound before scoring; 0 disables bounding
    pub max_passage_chars: usize,
    /// Candidates kept when the hard threshold rejects everything
    pub fallback_count: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "bge-reranker-base".to_string(),
            batch_size: 8,
            max_passage_chars: 1200,
            fallback_count: 1,
        }
    }
}

/// Inference worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Concurrent blocking model calls across all requests
    pub max_concurrent: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { max_concurrent: 2 }
    }
}

/// Indexing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub max_elements: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        let index = IndexConfig::default();
        Self {
            hnsw_m: index.hnsw_m,
            hnsw_ef_construction: index.hnsw_ef_construction,
            hnsw_ef_search: index.hnsw_ef_search,
            max_elements: index.max_elements,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    ///
    /// Environment overrides (`KRETRIEVE_SECTION__KEY`) are applied before
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RetrievalError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RetrievalError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_overrides(&EnvSource::new());

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load configuration, falling back to hardcoded defaults when the file
    /// is missing, unreadable or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(RetrievalError::ConfigNotFound { .. }) => {
                tracing::info!("No config at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Config at {:?} unusable, using defaults: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RetrievalError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RetrievalError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RetrievalError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(enabled) = overrides.reranker_enabled {
            self.reranker.enabled = enabled;
        }
        if let Some(enabled) = overrides.strategy_enabled {
            self.strategy.enabled = enabled;
        }
        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        Ok(())
    }

    /// Apply every known key from `source`
    ///
    /// Unparsable values are logged and skipped; unknown keys are ignored.
    pub fn apply_overrides(&mut self, source: &dyn ConfigSource) {
        for (key, value) in source.entries() {
            if let Err(e) = self.set_value(&key, &value) {
                tracing::warn!("Failed to apply config override {}: {}", key, e);
            }
        }
    }

    fn set_value(&mut self, path: &str, value: &str) -> Result<()> {
        let path = path.to_ascii_uppercase();
        let r = &mut self.retrieval;

        match path.as_str() {
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse(&path, value)?,
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse(&path, value)?,

            "RERANKER__ENABLED" => self.reranker.enabled = parse(&path, value)?,
            "RERANKER__MODEL" => self.reranker.model = value.to_string(),
            "RERANKER__BATCH_SIZE" => self.reranker.batch_size = parse(&path, value)?,
            "RERANKER__MAX_PASSAGE_CHARS" => {
                self.reranker.max_passage_chars = parse(&path, value)?
            }
            "RERANKER__FALLBACK_COUNT" => self.reranker.fallback_count = parse(&path, value)?,

            "RETRIEVAL__TOP_K" => r.top_k = parse(&path, value)?,
            "RETRIEVAL__OVERSAMPLE_FACTOR" => r.oversample_factor = parse(&path, value)?,
            "RETRIEVAL__LEXICAL_CANDIDATES" => r.lexical_candidates = parse(&path, value)?,
            "RETRIEVAL__FUSION_CANDIDATES" => r.fusion_candidates = parse(&path, value)?,
            "RETRIEVAL__RERANK_CANDIDATES" => r.rerank_candidates = parse(&path, value)?,
            "RETRIEVAL__MIN_SIMILARITY" => r.min_similarity = parse(&path, value)?,
            "RETRIEVAL__MIN_RERANK_SCORE" => r.min_rerank_score = parse(&path, value)?,
            "RETRIEVAL__RERANK_THRESHOLD_MODE" => {
                r.rerank_threshold_mode = parse(&path, value)?
            }
            "RETRIEVAL__MMR_LAMBDA" => r.mmr_lambda = parse(&path, value)?,
            "RETRIEVAL__PER_DOCUMENT_CAP" => r.per_document_cap = parse(&path, value)?,
            "RETRIEVAL__VECTOR_WEIGHT" => r.vector_weight = parse(&path, value)?,
            "RETRIEVAL__LEXICAL_WEIGHT" => r.lexical_weight = parse(&path, value)?,
            "RETRIEVAL__LANGUAGE_BONUS" => r.language_bonus = parse(&path, value)?,

            "STRATEGY__ENABLED" => self.strategy.enabled = parse(&path, value)?,
            "STRATEGY__DISABLED_CHANNELS" => {
                self.strategy.disabled_channels = value
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| parse::<Channel>(&path, s))
                    .collect::<Result<_>>()?;
            }

            "INFERENCE__MAX_CONCURRENT" => self.inference.max_concurrent = parse(&path, value)?,

            "INDEXING__HNSW_M" => self.indexing.hnsw_m = parse(&path, value)?,
            "INDEXING__HNSW_EF_CONSTRUCTION" => {
                self.indexing.hnsw_ef_construction = parse(&path, value)?
            }
            "INDEXING__HNSW_EF_SEARCH" => self.indexing.hnsw_ef_search = parse(&path, value)?,
            "INDEXING__MAX_ELEMENTS" => self.indexing.max_elements = parse(&path, value)?,

            _ => {
                tracing::debug!("Unknown config key: {}", path);
            }
        }
        Ok(())
    }

    /// Index parameters for a corpus matching the configured embedding model
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            vector_dim: self.embedding.dimension,
            hnsw_m: self.indexing.hnsw_m,
            hnsw_ef_construction: self.indexing.hnsw_ef_construction,
            hnsw_ef_search: self.indexing.hnsw_ef_search,
            max_elements: self.indexing.max_elements,
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RetrievalError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("knowledge-retrieval").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig::default(),
            embedding: EmbeddingConfig::default(),
            reranker: RerankerConfig::default(),
            retrieval: RetrievalParams::default(),
            strategy: StrategySettings::default(),
            inference: InferenceConfig::default(),
            indexing: IndexingConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

fn parse<T>(path: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
{
    value
        .trim()
        .parse()
        .map_err(|_| RetrievalError::InvalidConfigValue {
            path: path.to_string(),
            message: format!(
                "Cannot parse '{}' as {}",
                value,
                std::any::type_name::<T>()
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::RerankThresholdMode;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
        assert_eq!(config.index_config().vector_dim, config.embedding.dimension);
    }

    #[test]
    fn test_partial_file_loads_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[retrieval]
top_k = 5
per_document_cap = 2
rerank_threshold_mode = "soft"

[strategy]
disabled_channels = ["api"]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.rerank_threshold_mode, RerankThresholdMode::Soft);
        assert_eq!(config.retrieval.mmr_lambda, RetrievalParams::default().mmr_lambda);
        assert_eq!(config.strategy.disabled_channels, vec![Channel::Api]);
        assert_eq!(config.meta.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_k = 12;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval, config.retrieval);
    }

    #[test]
    fn test_missing_or_invalid_falls_back() {
        let temp = TempDir::new().unwrap();

        let missing = Config::load_or_default(&temp.path().join("absent.toml"));
        assert_eq!(missing.retrieval, RetrievalParams::default());

        let broken = temp.path().join("broken.toml");
        std::fs::write(&broken, "[retrieval]\ntop_k = \"many\"").unwrap();
        assert_eq!(Config::load_or_default(&broken).retrieval, RetrievalParams::default());

        let invalid = temp.path().join("invalid.toml");
        std::fs::write(&invalid, "[retrieval]\nmmr_lambda = 3.0").unwrap();
        assert!(matches!(
            Config::load(&invalid),
            Err(RetrievalError::ConfigValidation { .. })
        ));
        assert_eq!(Config::load_or_default(&invalid).retrieval.mmr_lambda, 0.7);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        let source = MapSource::from([
            ("RETRIEVAL__TOP_K", "4"),
            ("retrieval__mmr_lambda", "0.5"),
            ("RETRIEVAL__RERANK_THRESHOLD_MODE", "soft"),
            ("STRATEGY__DISABLED_CHANNELS", "api, messenger"),
            ("RERANKER__ENABLED", "not-a-bool"),
            ("UNKNOWN__KEY", "x"),
        ]);

        config.apply_overrides(&source);

        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.mmr_lambda, 0.5);
        assert_eq!(config.retrieval.rerank_threshold_mode, RerankThresholdMode::Soft);
        assert_eq!(
            config.strategy.disabled_channels,
            vec![Channel::Api, Channel::Messenger]
        );
        // unparsable value left untouched
        assert!(config.reranker.enabled);
    }

    #[test]
    fn test_profiles() {
        let mut config = Config::default();
        config.profiles.insert(
            "fast".to_string(),
            ProfileOverrides {
                reranker_enabled: Some(false),
                top_k: Some(3),
                ..ProfileOverrides::default()
            },
        );

        config.apply_profile("fast").unwrap();
        assert!(!config.reranker.enabled);
        assert_eq!(config.retrieval.top_k, 3);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_default_path() {
        if let Ok(path) = Config::default_path() {
            assert!(path.ends_with("knowledge-retrieval/config.toml"));
        }
    }
}
