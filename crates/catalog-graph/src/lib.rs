//! Catalog Graph: the store adapter behind the data product registry.
//!
//! The registry only ever talks to a [`GraphStore`]: create and merge nodes,
//! create and merge edges, and run one of a closed set of [`Pattern`]s.
//! Two implementations live here: [`GraphClient`] for Neo4j and
//! [`MemoryStore`] for tests and embedded use.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryStore;
pub use store::{Cell, GraphStore, NodeRecord, NodeRef, Pattern, Row};
