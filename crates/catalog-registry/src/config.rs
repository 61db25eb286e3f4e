//! Configuration for the data product registry.

use serde::Deserialize;

use catalog_core::config::{load_layered, section};
use catalog_graph::GraphConfig;

use crate::error::Result;

/// Registry settings.
///
/// Loaded from the `catalog.toml` `[registry]` section or
/// `CATALOG__REGISTRY__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Seconds between scheduled dependency auto-wiring runs.
    #[serde(default = "default_autowire_interval")]
    pub autowire_interval_secs: u64,

    /// Persist a `ChangeLog` node for every change detected on update.
    #[serde(default = "default_true")]
    pub log_changes: bool,
}

fn default_autowire_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            autowire_interval_secs: default_autowire_interval(),
            log_changes: default_true(),
        }
    }
}

/// Everything the `catalog` binary reads at startup.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub neo4j: GraphConfig,
    pub registry: RegistryConfig,
}

impl CatalogConfig {
    /// Load both sections from `<file_prefix>.toml` and the environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = load_layered(file_prefix)?;
        Ok(Self {
            neo4j: section(&cfg, "neo4j"),
            registry: section(&cfg, "registry"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.autowire_interval_secs, 300);
        assert!(config.log_changes);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{"autowire_interval_secs": 60}"#).unwrap();
        assert_eq!(config.autowire_interval_secs, 60);
        assert!(config.log_changes);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CatalogConfig::load("no-such-catalog-config").unwrap();
        assert_eq!(config.registry.autowire_interval_secs, 300);
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
    }
}
