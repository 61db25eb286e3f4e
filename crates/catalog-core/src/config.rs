//! Configuration management for catalog services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`CATALOG__` prefix, `__` separator)
//! 2. Config file (`catalog.toml` by default, optional)
//! 3. Defaults declared on each section's struct

use serde::de::DeserializeOwned;

use crate::error::CatalogError;

/// Environment variable prefix for every catalog setting.
pub const ENV_PREFIX: &str = "CATALOG";

/// Build the layered configuration source.
pub fn load_layered(file_prefix: &str) -> Result<config::Config, CatalogError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Read one section, falling back to its defaults when the section is missing.
pub fn section<T>(cfg: &config::Config, name: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(name) {
        Ok(section) => section,
        Err(e) => {
            tracing::debug!(section = name, error = %e, "Using default configuration section");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        interval: u64,
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let cfg = load_layered("definitely-not-a-catalog-config").unwrap();
        let sample: Sample = section(&cfg, "sample");
        assert_eq!(sample, Sample::default());
    }
}
