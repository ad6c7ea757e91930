//! Adaptive strategy resolution

use super::classifier::QueryClassifier;
use super::context::{Channel, StrategyContext};
use super::params::RetrievalParams;
use super::scenario::Scenario;
use super::StrategySettings;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Effective parameters for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    /// Scenario label, for observability
    pub scenario: Scenario,
    pub params: RetrievalParams,
    /// False when the base configuration was passed through unmodified
    pub adaptive: bool,
}

impl StrategyResult {
    fn passthrough(base: &RetrievalParams) -> Self {
        Self {
            scenario: Scenario::Default,
            params: base.clone(),
            adaptive: false,
        }
    }

    fn fallback(params: RetrievalParams) -> Self {
        Self {
            scenario: Scenario::Fallback,
            params,
            adaptive: false,
        }
    }
}

/// Classifies requests and overrides the base parameters per scenario.
///
/// Resolution is side-effect-free and always yields a valid parameter set.
pub struct StrategyResolver {
    settings: StrategySettings,
    classifier: QueryClassifier,
}

impl StrategyResolver {
    pub fn new(settings: StrategySettings) -> Result<Self> {
        Ok(Self {
            settings,
            classifier: QueryClassifier::new()?,
        })
    }

    pub fn is_enabled_for(&self, channel: Channel) -> bool {
        self.settings.enabled && !self.settings.disabled_channels.contains(&channel)
    }

    pub fn resolve(&self, ctx: &StrategyContext, base: &RetrievalParams) -> StrategyResult {
        if let Err(e) = base.validate() {
            warn!(
                request_id = %ctx.request_id,
                "Base retrieval configuration rejected, using built-in defaults: {}", e
            );
            return StrategyResult::fallback(RetrievalParams::default());
        }

        if !self.is_enabled_for(ctx.channel) {
            return StrategyResult::passthrough(base);
        }

        let scenario = self.classifier.classify(ctx);
        match scenario.profile().apply(base) {
            Ok(params) => {
                debug!(
                    request_id = %ctx.request_id,
                    scenario = %scenario,
                    top_k = params.top_k,
                    mmr_lambda = params.mmr_lambda,
                    "Resolved retrieval strategy"
                );
                StrategyResult {
                    scenario,
                    params,
                    adaptive: true,
                }
            }
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    scenario = %scenario,
                    "Scenario overrides rejected, falling back to base configuration: {}", e
                );
                StrategyResult::fallback(base.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(enabled: bool) -> StrategyResolver {
        StrategyResolver::new(StrategySettings {
            enabled,
            disabled_channels: vec![Channel::Api],
        })
        .unwrap()
    }

    #[test]
    fn test_disabled_passes_base_through() {
        let base = RetrievalParams {
            top_k: 11,
            mmr_lambda: 0.42,
            ..Default::default()
        };
        let ctx = StrategyContext::new("how do I configure X");
        let result = resolver(false).resolve(&ctx, &base);

        assert_eq!(result.params, base);
        assert_eq!(result.scenario, Scenario::Default);
        assert!(!result.adaptive);
    }

    #[test]
    fn test_disabled_channel_passes_base_through() {
        let base = RetrievalParams::default();
        let ctx = StrategyContext::new("how do I configure X").with_channel(Channel::Api);
        let result = resolver(true).resolve(&ctx, &base);
        assert_eq!(result.params, base);
        assert!(!result.adaptive);
    }

    #[test]
    fn test_enabled_overrides() {
        let base = RetrievalParams::default();
        let ctx = StrategyContext::new("what is the refund window");
        let result = resolver(true).resolve(&ctx, &base);
        assert_eq!(result.scenario, Scenario::Precise);
        assert!(result.adaptive);
        assert!(result.params.top_k < base.top_k);
    }

    #[test]
    fn test_invalid_base_falls_back_to_defaults() {
        let base = RetrievalParams {
            top_k: 0,
            ..Default::default()
        };
        let ctx = StrategyContext::new("anything at all here");
        let result = resolver(true).resolve(&ctx, &base);
        assert_eq!(result.scenario, Scenario::Fallback);
        assert_eq!(result.params, RetrievalParams::default());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let base = RetrievalParams::default();
        let ctx = StrategyContext::new("the deploy fails with a timeout");
        let r = resolver(true);
        assert_eq!(r.resolve(&ctx, &base), r.resolve(&ctx, &base));
    }
}
