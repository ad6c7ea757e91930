use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the retrieval core
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding or reranking model failed to load or run
    #[error("{provider} provider unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Recall queries could not reach the corpus
    #[error("Corpus unavailable: {0}")]
    CorpusUnavailable(String),

    /// A resolved parameter set violates an invariant
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The caller supplied an unusable query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The inference worker was dropped before it produced a result
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RetrievalError {
    pub fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;
