//! catalog-core: Shared types, configuration, and error handling for the data product catalog.
//!
//! This crate provides the foundational types used across all catalog components:
//! - The [`DataProduct`] entity and its four field categories
//! - Node labels and edge kinds for the property graph
//! - The change-log record written on every detected mutation
//! - Layered configuration loading
//! - Common error types

pub mod changelog;
pub mod config;
pub mod error;
pub mod types;

pub use changelog::ChangeLogEntry;
pub use error::CatalogError;
pub use types::{
    attributes, AttrValue, Attributes, DataProduct, DictField, DictListField, EdgeKind, EntityId,
    ListField, NodeLabel, ScalarField,
};
