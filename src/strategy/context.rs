//! Per-request input to the strategy resolver

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surface the request originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Web,
    Api,
    Messenger,
    Embedded,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Messenger => "messenger",
            Self::Embedded => "embedded",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "api" => Ok(Self::Api),
            "messenger" => Ok(Self::Messenger),
            "embedded" => Ok(Self::Embedded),
            other => Err(format!("Unknown channel: {}", other)),
        }
    }
}

/// Immutable description of one retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyContext {
    /// Correlates log lines for this request
    pub request_id: Uuid,

    /// Raw query text
    pub query: String,

    /// Caller-requested result size; never exceeded
    pub top_k: Option<usize>,

    /// Restrict retrieval to one document
    pub document_id: Option<String>,

    /// Declared query language; detected from the text when absent
    pub language: Option<String>,

    pub channel: Channel,
}

impl StrategyContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            query: query.into(),
            top_k: None,
            document_id: None,
            language: None,
            channel: Channel::default(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }
}
