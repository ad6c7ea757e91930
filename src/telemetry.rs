//! Logging setup

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "knowledge_retrieval=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `default_directive`
/// when the variable is unset or unparsable.
///
/// Returns false if a global subscriber was already installed, so repeated
/// calls (e.g. from several tests) are harmless.
pub fn init_tracing(default_directive: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive.unwrap_or(DEFAULT_DIRECTIVE)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing(Some("debug"));
        assert!(!init_tracing(None));
    }
}
