//! Key-value configuration sources

use std::collections::HashMap;

/// Environment variable prefix: `KRETRIEVE_SECTION__KEY=value`
pub const ENV_PREFIX: &str = "KRETRIEVE_";

/// A flat key-value source of configuration overrides
///
/// Keys use the `SECTION__KEY` form, e.g. `RETRIEVAL__TOP_K`.
pub trait ConfigSource {
    fn entries(&self) -> Vec<(String, String)>;
}

/// Overrides read from the process environment
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub fn new() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvSource {
    fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(&self.prefix)
                    .map(|config_key| (config_key.to_string(), value))
            })
            .collect();
        entries.sort();
        entries
    }
}

/// Overrides held in memory
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapSource {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }
}
