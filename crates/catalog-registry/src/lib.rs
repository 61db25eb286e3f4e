//! catalog-registry: Synchronizes data products with the catalog graph.
//!
//! The [`Registry`] materializes a [`DataProduct`](catalog_core::DataProduct)
//! as a root node plus one subgraph per relation field, diffs later
//! revisions against it, and records every change it makes. Lineage between
//! data products is asserted directly or derived from pipeline topology.

pub mod assistant;
pub mod config;
pub mod diff;
pub mod error;
pub mod lineage;
pub mod pipeline;
pub mod registry;
pub mod scheduler;

pub use assistant::{extract_cypher, graph_schema, Answer, Assistant, QueryTranslator, Translation};
pub use config::{CatalogConfig, RegistryConfig};
pub use error::{RegistryError, Result};
pub use lineage::AutoWireReport;
pub use registry::{Created, FailureStage, FieldFailure, Registry, Updated};
pub use scheduler::AutoWireScheduler;
