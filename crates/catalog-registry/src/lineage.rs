//! Dependency wiring between data products.
//!
//! `FEEDS_INTO` edges come from two places: callers asserting them
//! directly, and derivation from pipeline topology. A pipeline P1 that
//! produces D1 and triggers P2, which produces D2, implies D1 feeds D2.

use std::collections::BTreeSet;

use serde::Serialize;

use catalog_core::{EdgeKind, EntityId};
use catalog_graph::{GraphStore, Pattern};

use crate::error::{RegistryError, Result};
use crate::registry::Registry;

/// Result of one auto-wiring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AutoWireReport {
    /// Distinct (upstream, downstream) pairs implied by pipeline topology.
    pub candidates: usize,
    /// Edges that did not exist before this pass.
    pub created: usize,
}

impl<S: GraphStore> Registry<S> {
    /// Derive `FEEDS_INTO` edges from `PRODUCES`/`TRIGGERS` chains.
    ///
    /// Monotonic: never removes edges or touches nodes, so rerunning it
    /// only ever reports `created == 0` once the graph is saturated.
    pub async fn auto_wire_dependencies(&self) -> Result<AutoWireReport> {
        let rows = self.store.run_pattern(&Pattern::ProducedLineage).await?;

        // Several pipeline pairs can imply the same data product pair.
        let mut pairs = BTreeSet::new();
        for row in &rows {
            let upstream = row.node("upstream")?.node.clone();
            let downstream = row.node("downstream")?.node.clone();
            pairs.insert((upstream, downstream));
        }

        let mut created = 0;
        for (upstream, downstream) in &pairs {
            if self
                .store
                .merge_edge(upstream, downstream, EdgeKind::FeedsInto)
                .await?
            {
                created += 1;
            }
        }

        let report = AutoWireReport {
            candidates: pairs.len(),
            created,
        };
        tracing::info!(
            matches = rows.len(),
            candidates = report.candidates,
            created = report.created,
            "Auto-wired data product dependencies"
        );
        Ok(report)
    }

    /// Assert that one data product feeds another. Returns true when the
    /// edge is new.
    pub async fn add_dependency(&self, from: EntityId, to: EntityId) -> Result<bool> {
        let upstream = self.root(from).await?;
        let downstream = self.root(to).await?;
        let created = self
            .store
            .merge_edge(&upstream.node, &downstream.node, EdgeKind::FeedsInto)
            .await?;

        tracing::info!(
            from = upstream.get_str("name").unwrap_or_default(),
            to = downstream.get_str("name").unwrap_or_default(),
            created,
            "Added dependency"
        );
        Ok(created)
    }

    /// [`add_dependency`](Self::add_dependency) addressed by data product name.
    pub async fn add_dependency_by_name(&self, from: &str, to: &str) -> Result<bool> {
        let from = self.id_by_name(from).await?;
        let to = self.id_by_name(to).await?;
        self.add_dependency(from, to).await
    }

    /// Identifier of the first data product carrying `name`.
    pub async fn id_by_name(&self, name: &str) -> Result<EntityId> {
        let rows = self
            .store
            .run_pattern(&Pattern::EntityByName {
                name: name.to_string(),
            })
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| RegistryError::NotFound(format!("data product named '{name}'")))?;

        let raw = row.text("id")?;
        raw.parse::<EntityId>().map_err(|e| {
            RegistryError::Validation(format!("stored id '{raw}' of '{name}' is not a UUID: {e}"))
        })
    }

    /// Every `FEEDS_INTO` edge as `(from, to)` identifiers.
    pub async fn dependencies(&self) -> Result<Vec<(EntityId, EntityId)>> {
        let rows = self.store.run_pattern(&Pattern::Dependencies).await?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in &rows {
            match (
                row.text("source")?.parse::<EntityId>(),
                row.text("target")?.parse::<EntityId>(),
            ) {
                (Ok(from), Ok(to)) => edges.push((from, to)),
                _ => tracing::debug!("Skipping dependency with a malformed id"),
            }
        }
        edges.sort();
        Ok(edges)
    }
}
