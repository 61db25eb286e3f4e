//! The store contract consumed by the registry.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use catalog_core::{AttrValue, Attributes, EdgeKind, EntityId, NodeLabel};

use crate::client::GraphError;

/// Opaque handle to a node, valid for the store that returned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef(pub String);

/// A node as returned in a pattern row.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node: NodeRef,
    pub labels: Vec<String>,
    pub properties: Attributes,
}

impl NodeRecord {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(AttrValue::as_str)
    }
}

/// One named column of a pattern row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Value(AttrValue),
    Node(NodeRecord),
}

/// A row of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, cell: Cell) -> Self {
        self.columns.insert(column.to_string(), cell);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns.get(column)
    }

    pub fn node(&self, column: &str) -> Result<&NodeRecord, GraphError> {
        match self.get(column) {
            Some(Cell::Node(record)) => Ok(record),
            _ => Err(GraphError::Column(column.to_string())),
        }
    }

    pub fn text(&self, column: &str) -> Result<&str, GraphError> {
        match self.get(column) {
            Some(Cell::Value(AttrValue::String(s))) => Ok(s),
            _ => Err(GraphError::Column(column.to_string())),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, GraphError> {
        match self.get(column) {
            Some(Cell::Value(AttrValue::Integer(i))) => Ok(*i),
            _ => Err(GraphError::Column(column.to_string())),
        }
    }
}

/// How a pattern column is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Node,
    Text,
    Integer,
}

/// The closed set of graph patterns the registry runs.
///
/// Labels and relationship types only ever come from [`NodeLabel`] and
/// [`EdgeKind`]; every caller-supplied value travels as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// The root node of an entity. Column `node`.
    EntityById { id: EntityId },
    /// First entity id carrying the given name. Column `id`.
    EntityByName { name: String },
    /// The pipeline node with the given name. Column `node`.
    PipelineByName { name: String },
    /// Every node reached from an entity's root via `edge`. Column `node`.
    Related { id: EntityId, edge: EdgeKind },
    /// Delete every `edge` leaving an entity's root. Column `removed`.
    DetachRelated { id: EntityId, edge: EdgeKind },
    /// Merge properties onto an entity's root node. No rows.
    SetProperties { id: EntityId, properties: Attributes },
    /// `(p1)-[:PRODUCES]->(d1)`, `(p1)-[:TRIGGERS]->(p2)-[:PRODUCES]->(d2)`.
    /// Columns `upstream` (d1) and `downstream` (d2).
    ProducedLineage,
    /// Every `FEEDS_INTO` edge. Columns `source`, `target` (entity ids).
    Dependencies,
    /// Change-log nodes of an entity, oldest first. Column `node`.
    ChangeLog { id: EntityId },
    /// Create a change-log node and its `HAS_CHANGE_LOG` edge in one write.
    /// Column `node`; no rows when the entity does not exist.
    AppendChangeLog { id: EntityId, properties: Attributes },
}

impl Pattern {
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::EntityById { .. } => "entity_by_id",
            Pattern::EntityByName { .. } => "entity_by_name",
            Pattern::PipelineByName { .. } => "pipeline_by_name",
            Pattern::Related { .. } => "related",
            Pattern::DetachRelated { .. } => "detach_related",
            Pattern::SetProperties { .. } => "set_properties",
            Pattern::ProducedLineage => "produced_lineage",
            Pattern::Dependencies => "dependencies",
            Pattern::ChangeLog { .. } => "change_log",
            Pattern::AppendChangeLog { .. } => "append_change_log",
        }
    }

    /// The columns each row of this pattern carries.
    pub fn columns(&self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Pattern::EntityById { .. }
            | Pattern::PipelineByName { .. }
            | Pattern::Related { .. }
            | Pattern::ChangeLog { .. }
            | Pattern::AppendChangeLog { .. } => &[("node", ColumnKind::Node)],
            Pattern::EntityByName { .. } => &[("id", ColumnKind::Text)],
            Pattern::DetachRelated { .. } => &[("removed", ColumnKind::Integer)],
            Pattern::SetProperties { .. } => &[],
            Pattern::ProducedLineage => &[
                ("upstream", ColumnKind::Node),
                ("downstream", ColumnKind::Node),
            ],
            Pattern::Dependencies => &[("source", ColumnKind::Text), ("target", ColumnKind::Text)],
        }
    }
}

/// Minimal capability surface of the underlying graph database.
///
/// Merge operations are the only deduplication mechanism: concurrent
/// callers creating the same shared node converge through them.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a new node unconditionally.
    async fn create_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
    ) -> Result<NodeRef, GraphError>;

    /// Upsert a node by `(label, properties[key])`. On match, the supplied
    /// properties are merged onto the existing node.
    async fn merge_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
    ) -> Result<NodeRef, GraphError>;

    /// Upsert a node by `(label, properties[key])`. On match, the existing
    /// properties are replaced by exactly the supplied ones.
    async fn replace_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
    ) -> Result<NodeRef, GraphError>;

    /// Create a new edge unconditionally.
    async fn create_edge(&self, from: &NodeRef, to: &NodeRef, edge: EdgeKind)
        -> Result<(), GraphError>;

    /// Upsert an edge. Returns true when the edge did not exist before.
    async fn merge_edge(&self, from: &NodeRef, to: &NodeRef, edge: EdgeKind)
        -> Result<bool, GraphError>;

    /// Run a pattern and collect its rows.
    async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<Row>, GraphError>;
}

/// Property keys must be plain identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_property_key(key: &str) -> Result<(), GraphError> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(GraphError::InvalidKey(key.to_string()))
    }
}

pub fn validate_properties(properties: &Attributes) -> Result<(), GraphError> {
    properties.keys().try_for_each(|k| validate_property_key(k))
}

/// Validate a merge key and fetch the value it merges on.
pub fn merge_key_value<'a>(
    properties: &'a Attributes,
    key: &str,
) -> Result<&'a AttrValue, GraphError> {
    validate_property_key(key)?;
    properties
        .get(key)
        .ok_or_else(|| GraphError::InvalidKey(format!("{key} (missing from properties)")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::attributes;

    #[test]
    fn property_keys_must_be_identifiers() {
        assert!(validate_property_key("access_count").is_ok());
        assert!(validate_property_key("_private").is_ok());
        assert!(validate_property_key("level2").is_ok());

        assert!(validate_property_key("").is_err());
        assert!(validate_property_key("2fa").is_err());
        assert!(validate_property_key("name}) DETACH DELETE (n").is_err());
        assert!(validate_property_key("e-mail").is_err());
    }

    #[test]
    fn merge_key_must_be_present() {
        let props = attributes([("name", "Ingest")]);
        assert_eq!(
            merge_key_value(&props, "name").unwrap(),
            &AttrValue::from("Ingest")
        );
        assert!(matches!(
            merge_key_value(&props, "status"),
            Err(GraphError::InvalidKey(_))
        ));
    }

    #[test]
    fn row_accessors_check_column_kind() {
        let row = Row::new()
            .with("id", Cell::Value(AttrValue::from("abc")))
            .with("removed", Cell::Value(AttrValue::Integer(3)));

        assert_eq!(row.text("id").unwrap(), "abc");
        assert_eq!(row.integer("removed").unwrap(), 3);
        assert!(row.node("id").is_err());
        assert!(row.text("missing").is_err());
    }
}
