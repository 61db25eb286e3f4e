use thiserror::Error;

/// Top-level error type for the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid entity id: {0}")]
    InvalidId(#[from] uuid::Error),
}
