//! Adaptive strategy resolution
//!
//! Classifies each request into a [`Scenario`] and derives the effective
//! [`RetrievalParams`] consumed by every downstream stage.

mod classifier;
mod context;
mod params;
mod resolver;
mod scenario;

pub use classifier::QueryClassifier;
pub use context::{Channel, StrategyContext};
pub use params::{
    RerankThresholdMode, RetrievalParams, MAX_CANDIDATES, MAX_LANGUAGE_BONUS, MAX_TOP_K,
};
pub use resolver::{StrategyResolver, StrategyResult};
pub use scenario::{Scenario, ScenarioProfile};

use serde::{Deserialize, Serialize};

/// Resolver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// When false the base configuration is passed through unchanged
    pub enabled: bool,
    /// Channels that always receive the base configuration
    pub disabled_channels: Vec<Channel>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_channels: Vec::new(),
        }
    }
}
