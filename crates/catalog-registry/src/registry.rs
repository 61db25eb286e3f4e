//! The registry: materializes data products onto the graph and reconciles
//! later revisions against the subgraph already there.
//!
//! Create is best-effort past the root node: a relation that fails to
//! materialize is reported as a [`FieldFailure`] and the remaining fields
//! are still written. Update works the same way per category, and records
//! one [`ChangeLogEntry`] for every scalar or relation it rewrites.

use serde::Serialize;

use catalog_core::changelog::{serialize_value, PREVIOUS_ENTRIES};
use catalog_core::{
    attributes, AttrValue, Attributes, ChangeLogEntry, DataProduct, DictField, DictListField,
    EdgeKind, EntityId, ListField, NodeLabel,
};
use catalog_graph::store::validate_properties;
use catalog_graph::{GraphStore, NodeRecord, NodeRef, Pattern};

use crate::config::RegistryConfig;
use crate::diff;
use crate::error::{RegistryError, Result};
use crate::pipeline::pipeline_name;

/// Where a per-field failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Writing the field's nodes or edges.
    Write,
    /// Persisting the change-log entry for a detected change.
    ChangeLog,
}

/// A field whose write failed without aborting the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    pub field: String,
    pub stage: FailureStage,
    pub error: String,
}

impl FieldFailure {
    fn write(field: &str, error: &RegistryError) -> Self {
        Self {
            field: field.to_string(),
            stage: FailureStage::Write,
            error: error.to_string(),
        }
    }

    fn change_log(field: &str, error: &RegistryError) -> Self {
        Self {
            field: field.to_string(),
            stage: FailureStage::ChangeLog,
            error: error.to_string(),
        }
    }
}

/// Outcome of [`Registry::create`].
#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub id: EntityId,
    pub failures: Vec<FieldFailure>,
}

impl Created {
    /// True when every field materialized.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of [`Registry::update`].
#[derive(Debug, Clone, Serialize)]
pub struct Updated {
    pub id: EntityId,
    pub changes: Vec<ChangeLogEntry>,
    pub failures: Vec<FieldFailure>,
}

impl Updated {
    /// True when at least one scalar or relation changed.
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A relation whose old edges were detached. The entry is logged even when
/// re-relating fails, so a removal never goes unrecorded.
struct Rewrite {
    entry: ChangeLogEntry,
    error: Option<RegistryError>,
}

impl Rewrite {
    fn finish(entry: ChangeLogEntry, result: Result<()>) -> Self {
        Self {
            entry,
            error: result.err(),
        }
    }
}

/// Synchronizes data products with a graph store.
///
/// Holds no per-entity state; everything it knows lives in the store.
pub struct Registry<S> {
    pub(crate) store: S,
    config: RegistryConfig,
}

impl<S: GraphStore> Registry<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    pub fn with_config(store: S, config: RegistryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ── Create ───────────────────────────────────────────────────

    /// Materialize a new data product and return its fresh identifier.
    ///
    /// Not idempotent: two calls create two independent subgraphs. Only
    /// string-list reference nodes and named pipelines are shared.
    pub async fn create(&self, product: &DataProduct) -> Result<Created> {
        if let Some(id) = product.id {
            return Err(RegistryError::Validation(format!(
                "data product already has id {id}; use update"
            )));
        }
        validate_product(product)?;

        let id = EntityId::new();
        let mut props = product.scalar_properties();
        props.insert("id".to_string(), AttrValue::from(id.to_string()));
        let root = self
            .store
            .create_node(NodeLabel::DataProduct, &props)
            .await?;

        let mut failures = Vec::new();

        for field in ListField::ALL {
            if let Some(values) = product.string_list(field) {
                if let Err(e) = self.relate_strings(&root, field, values).await {
                    failures.push(FieldFailure::write(field.name(), &e));
                }
            }
        }

        for field in DictField::ALL {
            match product.dict(field) {
                Some(dict) if !dict.is_empty() => {
                    if let Err(e) = self.create_dict(&root, field, dict).await {
                        failures.push(FieldFailure::write(field.name(), &e));
                    }
                }
                _ => {}
            }
        }

        for field in DictListField::ALL {
            if let Some(items) = product.dict_list(field) {
                if let Err(e) = self.relate_items(&root, field, items).await {
                    failures.push(FieldFailure::write(field.name(), &e));
                }
            }
        }

        for failure in &failures {
            tracing::warn!(
                id = %id,
                field = %failure.field,
                error = %failure.error,
                "Relation failed to materialize"
            );
        }

        tracing::info!(
            id = %id,
            name = product.name.as_deref().unwrap_or_default(),
            properties = props.len(),
            failures = failures.len(),
            "Data product created"
        );

        Ok(Created { id, failures })
    }

    // ── Update ───────────────────────────────────────────────────

    /// Reconcile a revised data product against its stored subgraph.
    ///
    /// Absent fields are left untouched. Categories are written
    /// independently, so a failure in one does not stop the others.
    pub async fn update(&self, product: &DataProduct) -> Result<Updated> {
        let id = product.id.ok_or_else(|| {
            RegistryError::Validation("data product id is required for update".to_string())
        })?;
        validate_product(product)?;
        let root = self.root(id).await?;

        let mut outcome = Updated {
            id,
            changes: Vec::new(),
            failures: Vec::new(),
        };

        match self.update_scalars(id, &root.properties, product).await {
            Ok(entries) => {
                for entry in entries {
                    self.record(entry, &mut outcome).await;
                }
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Scalar update failed");
                outcome.failures.push(FieldFailure::write("scalars", &e));
            }
        }

        for field in DictField::ALL {
            let Some(dict) = product.dict(field) else {
                continue;
            };
            let result = self.update_dict(id, &root.node, field, dict).await;
            self.settle(field.name(), result, &mut outcome).await;
        }

        for field in ListField::ALL {
            let Some(values) = product.string_list(field) else {
                continue;
            };
            let result = self.update_strings(id, &root.node, field, values).await;
            self.settle(field.name(), result, &mut outcome).await;
        }

        for field in DictListField::ALL {
            let Some(items) = product.dict_list(field) else {
                continue;
            };
            let result = self.update_items(id, &root.node, field, items).await;
            self.settle(field.name(), result, &mut outcome).await;
        }

        let fields: Vec<&str> = outcome.changes.iter().map(|c| c.field.as_str()).collect();
        tracing::info!(
            id = %id,
            changed = outcome.changed(),
            fields = ?fields,
            failures = outcome.failures.len(),
            "Data product updated"
        );

        Ok(outcome)
    }

    async fn update_scalars(
        &self,
        id: EntityId,
        stored: &Attributes,
        product: &DataProduct,
    ) -> Result<Vec<ChangeLogEntry>> {
        let changes = diff::scalar_changes(stored, product);
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let properties: Attributes = changes
            .iter()
            .map(|c| (c.field.key().to_string(), AttrValue::from(c.new.as_str())))
            .collect();
        self.store
            .run_pattern(&Pattern::SetProperties { id, properties })
            .await?;

        Ok(changes
            .into_iter()
            .map(|c| {
                ChangeLogEntry::new(c.field.key(), serialize_value(&c.old), serialize_value(&c.new))
            })
            .collect())
    }

    async fn update_dict(
        &self,
        id: EntityId,
        root: &NodeRef,
        field: DictField,
        dict: &Attributes,
    ) -> Result<Option<Rewrite>> {
        let current = self
            .store
            .run_pattern(&Pattern::Related {
                id,
                edge: field.edge(),
            })
            .await?;
        let old = current
            .first()
            .map(|row| row.node("node"))
            .transpose()?
            .map(|node| node.properties.clone());

        if !diff::dict_changed(old.as_ref(), dict) {
            tracing::debug!(id = %id, field = field.name(), "Single-dict relation unchanged");
            return Ok(None);
        }

        let entry = ChangeLogEntry::new(field.name(), serialize_value(&old), serialize_value(dict));

        // The previous attribute node stays in the graph, only the edge goes.
        self.detach(id, field.edge()).await?;
        let result = match diff::merge_key(dict) {
            Some(key) => self.replace_dict(root, field, dict, key).await,
            None => Ok(()),
        };
        Ok(Some(Rewrite::finish(entry, result)))
    }

    async fn update_strings(
        &self,
        id: EntityId,
        root: &NodeRef,
        field: ListField,
        values: &[String],
    ) -> Result<Option<Rewrite>> {
        let current = self
            .store
            .run_pattern(&Pattern::Related {
                id,
                edge: field.edge(),
            })
            .await?;

        let mut existing = Vec::with_capacity(current.len());
        for row in &current {
            if let Some(name) = row.node("node")?.get_str("name") {
                existing.push(name.to_string());
            }
        }
        existing.sort();
        existing.dedup();

        if !diff::string_set_changed(&existing, values) {
            tracing::debug!(id = %id, field = field.name(), "String-list relation unchanged");
            return Ok(None);
        }

        let entry = ChangeLogEntry::new(
            field.name(),
            serialize_value(&existing),
            serialize_value(values),
        );

        self.detach(id, field.edge()).await?;
        let result = self.relate_strings(root, field, values).await;
        Ok(Some(Rewrite::finish(entry, result)))
    }

    /// Dict lists are always replaced wholesale and always logged.
    async fn update_items(
        &self,
        id: EntityId,
        root: &NodeRef,
        field: DictListField,
        items: &[Attributes],
    ) -> Result<Option<Rewrite>> {
        let entry = ChangeLogEntry::new(
            field.name(),
            PREVIOUS_ENTRIES.to_string(),
            serialize_value(items),
        );

        self.detach(id, field.edge()).await?;
        let result = self.relate_items(root, field, items).await;
        Ok(Some(Rewrite::finish(entry, result)))
    }

    async fn settle(
        &self,
        field: &str,
        result: Result<Option<Rewrite>>,
        outcome: &mut Updated,
    ) {
        match result {
            Ok(Some(rewrite)) => {
                self.record(rewrite.entry, outcome).await;
                if let Some(e) = rewrite.error {
                    tracing::warn!(id = %outcome.id, field, error = %e, "Relation rewrite failed");
                    outcome.failures.push(FieldFailure::write(field, &e));
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(id = %outcome.id, field, error = %e, "Relation update failed");
                outcome.failures.push(FieldFailure::write(field, &e));
            }
        }
    }

    /// Persist a change-log entry for a change that reached the graph.
    async fn record(&self, entry: ChangeLogEntry, outcome: &mut Updated) {
        if self.config.log_changes {
            if let Err(e) = self.write_change_log(outcome.id, &entry).await {
                tracing::warn!(
                    id = %outcome.id,
                    field = %entry.field,
                    error = %e,
                    "Change-log write failed"
                );
                outcome
                    .failures
                    .push(FieldFailure::change_log(&entry.field, &e));
            }
        }
        tracing::debug!(id = %outcome.id, field = %entry.field, "Change recorded");
        outcome.changes.push(entry);
    }

    /// The node and its edge are written together, so no entry is ever
    /// unreachable from its data product.
    async fn write_change_log(&self, id: EntityId, entry: &ChangeLogEntry) -> Result<()> {
        let rows = self
            .store
            .run_pattern(&Pattern::AppendChangeLog {
                id,
                properties: entry.to_attributes(),
            })
            .await?;
        if rows.is_empty() {
            return Err(RegistryError::NotFound(format!("data product {id}")));
        }
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Change-log entries of a data product, oldest first.
    pub async fn history(&self, id: EntityId) -> Result<Vec<ChangeLogEntry>> {
        self.root(id).await?;
        let rows = self.store.run_pattern(&Pattern::ChangeLog { id }).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let node = row.node("node")?;
            match ChangeLogEntry::from_attributes(&node.properties) {
                Some(entry) => entries.push(entry),
                None => {
                    tracing::debug!(node = %node.node.0, "Skipping malformed change-log node")
                }
            }
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Properties stored on a data product's root node.
    pub async fn properties(&self, id: EntityId) -> Result<Attributes> {
        Ok(self.root(id).await?.properties)
    }

    pub(crate) async fn root(&self, id: EntityId) -> Result<NodeRecord> {
        let rows = self.store.run_pattern(&Pattern::EntityById { id }).await?;
        match rows.first() {
            Some(row) => Ok(row.node("node")?.clone()),
            None => Err(RegistryError::NotFound(format!("data product {id}"))),
        }
    }

    // ── Relation Writers ─────────────────────────────────────────

    async fn detach(&self, id: EntityId, edge: EdgeKind) -> Result<()> {
        let rows = self
            .store
            .run_pattern(&Pattern::DetachRelated { id, edge })
            .await?;
        let removed = rows.first().and_then(|r| r.integer("removed").ok()).unwrap_or(0);
        tracing::debug!(id = %id, edge = %edge, removed, "Detached relation");
        Ok(())
    }

    async fn relate_strings(&self, root: &NodeRef, field: ListField, values: &[String]) -> Result<()> {
        for value in diff::unique_values(values) {
            let node = self
                .store
                .merge_node(field.label(), &attributes([("name", value)]), "name")
                .await?;
            self.store.create_edge(root, &node, field.edge()).await?;
        }
        Ok(())
    }

    /// Upsert the attribute node so it holds exactly `dict`, then relate it.
    async fn replace_dict(
        &self,
        root: &NodeRef,
        field: DictField,
        dict: &Attributes,
        key: &str,
    ) -> Result<()> {
        let node = self.store.replace_node(field.label(), dict, key).await?;
        self.store.create_edge(root, &node, field.edge()).await?;
        Ok(())
    }

    async fn create_dict(&self, root: &NodeRef, field: DictField, dict: &Attributes) -> Result<()> {
        let node = self.store.create_node(field.label(), dict).await?;
        self.store.create_edge(root, &node, field.edge()).await?;
        Ok(())
    }

    async fn relate_items(
        &self,
        root: &NodeRef,
        field: DictListField,
        items: &[Attributes],
    ) -> Result<()> {
        for item in items {
            let node = if field == DictListField::Pipelines && pipeline_name(item).is_some() {
                self.upsert_pipeline(item).await?
            } else {
                self.store.create_node(field.label(), item).await?
            };
            self.store.create_edge(root, &node, field.edge()).await?;
        }
        Ok(())
    }
}

/// Reject attribute keys the graph cannot store, before anything is written.
pub(crate) fn validate_attributes(field: &str, dict: &Attributes) -> Result<()> {
    validate_properties(dict).map_err(|e| RegistryError::Validation(format!("{field}: {e}")))
}

fn validate_product(product: &DataProduct) -> Result<()> {
    for field in DictField::ALL {
        if let Some(dict) = product.dict(field) {
            validate_attributes(field.name(), dict)?;
        }
    }
    for field in DictListField::ALL {
        for item in product.dict_list(field).unwrap_or_default() {
            validate_attributes(field.name(), item)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_graph::MemoryStore;

    #[tokio::test]
    async fn test_create_rejects_existing_id() {
        let registry = Registry::new(MemoryStore::new());
        let product = DataProduct {
            id: Some(EntityId::new()),
            ..DataProduct::named("RawX")
        };

        let err = registry.create(&product).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(registry.store().count_nodes(NodeLabel::DataProduct).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_attribute_key_aborts_before_writes() {
        let registry = Registry::new(MemoryStore::new());
        let product = DataProduct {
            owner: Some(attributes([("e-mail", "ops@example.com")])),
            ..DataProduct::named("RawX")
        };

        let err = registry.create(&product).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(registry.store().count_nodes(NodeLabel::DataProduct).await, 0);
    }

    #[tokio::test]
    async fn test_change_log_can_be_disabled() {
        let config = RegistryConfig {
            log_changes: false,
            ..Default::default()
        };
        let registry = Registry::with_config(MemoryStore::new(), config);
        let created = registry.create(&DataProduct::named("RawX")).await.unwrap();

        let updated = registry
            .update(&DataProduct {
                id: Some(created.id),
                schedule: Some("hourly".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(updated.changed());
        assert_eq!(registry.store().count_nodes(NodeLabel::ChangeLog).await, 0);
        assert!(registry.history(created.id).await.unwrap().is_empty());
    }

    #[test]
    fn test_outcome_serializes_failure_stage() {
        let failure = FieldFailure::change_log(
            "tags",
            &RegistryError::NotFound("data product x".to_string()),
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "change_log");
        assert_eq!(json["field"], "tags");
    }
}
