//! Error types for the catalog-registry crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Graph error: {0}")]
    Store(#[from] catalog_graph::GraphError),

    #[error("Config error: {0}")]
    Config(#[from] catalog_core::CatalogError),

    #[error("Query translation failed: {0}")]
    Translation(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
