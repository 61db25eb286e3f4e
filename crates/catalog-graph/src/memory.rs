//! In-memory graph store.
//!
//! Evaluates every [`Pattern`] directly over a node/edge table. Used by the
//! registry tests and for running the catalog without a database.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use catalog_core::{AttrValue, Attributes, EdgeKind, EntityId, NodeLabel};

use crate::client::GraphError;
use crate::store::{
    merge_key_value, validate_properties, Cell, GraphStore, NodeRecord, NodeRef, Pattern, Row,
};

#[derive(Debug, Clone)]
struct MemNode {
    label: NodeLabel,
    properties: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemEdge {
    from: usize,
    to: usize,
    kind: EdgeKind,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<MemNode>,
    edges: Vec<MemEdge>,
}

impl Inner {
    fn resolve(&self, node: &NodeRef) -> Result<usize, GraphError> {
        node.0
            .strip_prefix("mem:")
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|i| *i < self.nodes.len())
            .ok_or_else(|| GraphError::UnknownNode(node.0.clone()))
    }

    fn record(&self, index: usize) -> NodeRecord {
        let node = &self.nodes[index];
        NodeRecord {
            node: node_ref(index),
            labels: vec![node.label.as_str().to_string()],
            properties: node.properties.clone(),
        }
    }

    fn entity(&self, id: &EntityId) -> Option<usize> {
        let id = AttrValue::String(id.to_string());
        self.nodes
            .iter()
            .position(|n| n.label == NodeLabel::DataProduct && n.properties.get("id") == Some(&id))
    }

    fn outgoing(&self, from: usize, kind: EdgeKind) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.from == from && e.kind == kind)
            .map(|e| e.to)
    }

    fn is(&self, index: usize, label: NodeLabel) -> bool {
        self.nodes[index].label == label
    }

    fn entity_id(&self, index: usize) -> Cell {
        match self.nodes[index].properties.get("id") {
            Some(value) => Cell::Value(value.clone()),
            None => Cell::Null,
        }
    }
}

fn node_ref(index: usize) -> NodeRef {
    NodeRef(format!("mem:{index}"))
}

/// A graph store held entirely in process memory.
///
/// Clone is cheap and clones share the same graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes carrying a label.
    pub async fn count_nodes(&self, label: NodeLabel) -> usize {
        let inner = self.inner.lock().await;
        inner.nodes.iter().filter(|n| n.label == label).count()
    }

    /// Number of edges of one kind.
    pub async fn count_edges(&self, kind: EdgeKind) -> usize {
        let inner = self.inner.lock().await;
        inner.edges.iter().filter(|e| e.kind == kind).count()
    }

    /// All nodes carrying a label.
    pub async fn nodes(&self, label: NodeLabel) -> Vec<NodeRecord> {
        let inner = self.inner.lock().await;
        (0..inner.nodes.len())
            .filter(|i| inner.is(*i, label))
            .map(|i| inner.record(i))
            .collect()
    }

    async fn upsert(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
        replace: bool,
    ) -> Result<NodeRef, GraphError> {
        validate_properties(properties)?;
        let key_value = merge_key_value(properties, key)?;
        let mut inner = self.inner.lock().await;

        let existing = inner
            .nodes
            .iter()
            .position(|n| n.label == label && n.properties.get(key) == Some(key_value));

        match existing {
            Some(index) => {
                let stored = &mut inner.nodes[index].properties;
                if replace {
                    stored.clone_from(properties);
                } else {
                    stored.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Ok(node_ref(index))
            }
            None => {
                inner.nodes.push(MemNode {
                    label,
                    properties: properties.clone(),
                });
                Ok(node_ref(inner.nodes.len() - 1))
            }
        }
    }

    /// All edges of one kind as `(from, to)` node pairs.
    pub async fn edges(&self, kind: EdgeKind) -> Vec<(NodeRecord, NodeRecord)> {
        let inner = self.inner.lock().await;
        inner
            .edges
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (inner.record(e.from), inner.record(e.to)))
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn create_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
    ) -> Result<NodeRef, GraphError> {
        validate_properties(properties)?;
        let mut inner = self.inner.lock().await;
        inner.nodes.push(MemNode {
            label,
            properties: properties.clone(),
        });
        Ok(node_ref(inner.nodes.len() - 1))
    }

    async fn merge_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
    ) -> Result<NodeRef, GraphError> {
        self.upsert(label, properties, key, false).await
    }

    async fn replace_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
    ) -> Result<NodeRef, GraphError> {
        self.upsert(label, properties, key, true).await
    }

    async fn create_edge(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        edge: EdgeKind,
    ) -> Result<(), GraphError> {
        let mut inner = self.inner.lock().await;
        let (from, to) = (inner.resolve(from)?, inner.resolve(to)?);
        inner.edges.push(MemEdge {
            from,
            to,
            kind: edge,
        });
        Ok(())
    }

    async fn merge_edge(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        edge: EdgeKind,
    ) -> Result<bool, GraphError> {
        let mut inner = self.inner.lock().await;
        let candidate = MemEdge {
            from: inner.resolve(from)?,
            to: inner.resolve(to)?,
            kind: edge,
        };
        if inner.edges.contains(&candidate) {
            return Ok(false);
        }
        inner.edges.push(candidate);
        Ok(true)
    }

    async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<Row>, GraphError> {
        let mut inner = self.inner.lock().await;

        let rows = match pattern {
            Pattern::EntityById { id } => inner
                .entity(id)
                .map(|root| Row::new().with("node", Cell::Node(inner.record(root))))
                .into_iter()
                .collect(),

            Pattern::EntityByName { name } => {
                let name = AttrValue::String(name.clone());
                inner
                    .nodes
                    .iter()
                    .position(|n| {
                        n.label == NodeLabel::DataProduct && n.properties.get("name") == Some(&name)
                    })
                    .map(|index| Row::new().with("id", inner.entity_id(index)))
                    .into_iter()
                    .collect()
            }

            Pattern::PipelineByName { name } => {
                let name = AttrValue::String(name.clone());
                inner
                    .nodes
                    .iter()
                    .position(|n| {
                        n.label == NodeLabel::Pipeline && n.properties.get("name") == Some(&name)
                    })
                    .map(|index| Row::new().with("node", Cell::Node(inner.record(index))))
                    .into_iter()
                    .collect()
            }

            Pattern::Related { id, edge } => match inner.entity(id) {
                Some(root) => inner
                    .outgoing(root, *edge)
                    .map(|to| Row::new().with("node", Cell::Node(inner.record(to))))
                    .collect(),
                None => Vec::new(),
            },

            Pattern::DetachRelated { id, edge } => {
                let before = inner.edges.len();
                if let Some(root) = inner.entity(id) {
                    inner.edges.retain(|e| !(e.from == root && e.kind == *edge));
                }
                let removed = (before - inner.edges.len()) as i64;
                vec![Row::new().with("removed", Cell::Value(AttrValue::Integer(removed)))]
            }

            Pattern::SetProperties { id, properties } => {
                validate_properties(properties)?;
                if let Some(root) = inner.entity(id) {
                    inner.nodes[root]
                        .properties
                        .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Vec::new()
            }

            Pattern::ProducedLineage => {
                let mut rows = Vec::new();
                for produced in inner.edges.iter().filter(|e| e.kind == EdgeKind::Produces) {
                    let (p1, d1) = (produced.from, produced.to);
                    if !inner.is(p1, NodeLabel::Pipeline) || !inner.is(d1, NodeLabel::DataProduct)
                    {
                        continue;
                    }
                    for p2 in inner.outgoing(p1, EdgeKind::Triggers) {
                        if !inner.is(p2, NodeLabel::Pipeline) {
                            continue;
                        }
                        for d2 in inner.outgoing(p2, EdgeKind::Produces) {
                            if inner.is(d2, NodeLabel::DataProduct) {
                                rows.push(
                                    Row::new()
                                        .with("upstream", Cell::Node(inner.record(d1)))
                                        .with("downstream", Cell::Node(inner.record(d2))),
                                );
                            }
                        }
                    }
                }
                rows
            }

            Pattern::Dependencies => inner
                .edges
                .iter()
                .filter(|e| e.kind == EdgeKind::FeedsInto)
                .filter(|e| inner.is(e.from, NodeLabel::DataProduct))
                .filter(|e| inner.is(e.to, NodeLabel::DataProduct))
                .map(|e| {
                    Row::new()
                        .with("source", inner.entity_id(e.from))
                        .with("target", inner.entity_id(e.to))
                })
                .collect(),

            Pattern::ChangeLog { id } => match inner.entity(id) {
                Some(root) => {
                    let mut entries: Vec<NodeRecord> = inner
                        .outgoing(root, EdgeKind::HasChangeLog)
                        .filter(|i| inner.is(*i, NodeLabel::ChangeLog))
                        .map(|i| inner.record(i))
                        .collect();
                    entries.sort_by(|a, b| a.get_str("timestamp").cmp(&b.get_str("timestamp")));
                    entries
                        .into_iter()
                        .map(|record| Row::new().with("node", Cell::Node(record)))
                        .collect()
                }
                None => Vec::new(),
            },

            Pattern::AppendChangeLog { id, properties } => match inner.entity(id) {
                Some(root) => {
                    validate_properties(properties)?;
                    inner.nodes.push(MemNode {
                        label: NodeLabel::ChangeLog,
                        properties: properties.clone(),
                    });
                    let entry = inner.nodes.len() - 1;
                    inner.edges.push(MemEdge {
                        from: root,
                        to: entry,
                        kind: EdgeKind::HasChangeLog,
                    });
                    vec![Row::new().with("node", Cell::Node(inner.record(entry)))]
                }
                None => Vec::new(),
            },
        };

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::attributes;

    #[tokio::test]
    async fn merge_node_reuses_by_key() {
        let store = MemoryStore::new();
        let tag = attributes([("name", "raw")]);

        let a = store.merge_node(NodeLabel::Tag, &tag, "name").await.unwrap();
        let b = store.merge_node(NodeLabel::Tag, &tag, "name").await.unwrap();
        let other = store
            .merge_node(NodeLabel::Table, &tag, "name")
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, other);
        assert_eq!(store.count_nodes(NodeLabel::Tag).await, 1);
    }

    #[tokio::test]
    async fn merge_node_adds_properties_on_match() {
        let store = MemoryStore::new();
        store
            .merge_node(NodeLabel::Pipeline, &attributes([("name", "Ingest")]), "name")
            .await
            .unwrap();
        store
            .merge_node(
                NodeLabel::Pipeline,
                &attributes([("name", "Ingest"), ("status", "Active")]),
                "name",
            )
            .await
            .unwrap();

        let pipelines = store.nodes(NodeLabel::Pipeline).await;
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].get_str("status"), Some("Active"));
    }

    #[tokio::test]
    async fn replace_node_drops_missing_properties() {
        let store = MemoryStore::new();
        let first = store
            .merge_node(
                NodeLabel::Owner,
                &attributes([("name", "Alice"), ("email", "a@x")]),
                "name",
            )
            .await
            .unwrap();
        let second = store
            .replace_node(NodeLabel::Owner, &attributes([("name", "Alice")]), "name")
            .await
            .unwrap();

        assert_eq!(first, second);
        let owners = store.nodes(NodeLabel::Owner).await;
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].properties, attributes([("name", "Alice")]));
    }

    #[tokio::test]
    async fn append_change_log_writes_node_and_edge() {
        let store = MemoryStore::new();
        let id = EntityId::new();
        store
            .create_node(
                NodeLabel::DataProduct,
                &attributes([("id", id.to_string().as_str())]),
            )
            .await
            .unwrap();
        let entry = attributes([("field", "schedule"), ("timestamp", "t1")]);

        let rows = store
            .run_pattern(&Pattern::AppendChangeLog {
                id,
                properties: entry.clone(),
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.count_edges(EdgeKind::HasChangeLog).await, 1);

        let missing = store
            .run_pattern(&Pattern::AppendChangeLog {
                id: EntityId::new(),
                properties: entry,
            })
            .await
            .unwrap();
        assert!(missing.is_empty());
        assert_eq!(store.count_nodes(NodeLabel::ChangeLog).await, 1);
    }

    #[tokio::test]
    async fn merge_edge_reports_creation_once() {
        let store = MemoryStore::new();
        let a = store
            .create_node(NodeLabel::Pipeline, &attributes([("name", "A")]))
            .await
            .unwrap();
        let b = store
            .create_node(NodeLabel::Pipeline, &attributes([("name", "B")]))
            .await
            .unwrap();

        assert!(store.merge_edge(&a, &b, EdgeKind::Triggers).await.unwrap());
        assert!(!store.merge_edge(&a, &b, EdgeKind::Triggers).await.unwrap());
        assert!(store.merge_edge(&b, &a, EdgeKind::Triggers).await.unwrap());
        assert_eq!(store.count_edges(EdgeKind::Triggers).await, 2);
    }

    #[tokio::test]
    async fn unknown_refs_are_rejected() {
        let store = MemoryStore::new();
        let a = store
            .create_node(NodeLabel::Tag, &attributes([("name", "x")]))
            .await
            .unwrap();
        let bogus = NodeRef("mem:42".to_string());

        let err = store
            .create_edge(&a, &bogus, EdgeKind::HasTag)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn invalid_property_keys_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create_node(NodeLabel::Owner, &attributes([("e-mail", "a@b.c")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidKey(_)));
        assert_eq!(store.count_nodes(NodeLabel::Owner).await, 0);
    }

    #[tokio::test]
    async fn detach_related_keeps_target_nodes() {
        let store = MemoryStore::new();
        let id = EntityId::new();
        let root = store
            .create_node(
                NodeLabel::DataProduct,
                &attributes([("id", id.to_string())]),
            )
            .await
            .unwrap();
        for name in ["raw", "daily"] {
            let tag = store
                .merge_node(NodeLabel::Tag, &attributes([("name", name)]), "name")
                .await
                .unwrap();
            store.create_edge(&root, &tag, EdgeKind::HasTag).await.unwrap();
        }

        let rows = store
            .run_pattern(&Pattern::DetachRelated {
                id,
                edge: EdgeKind::HasTag,
            })
            .await
            .unwrap();

        assert_eq!(rows[0].integer("removed").unwrap(), 2);
        assert_eq!(store.count_edges(EdgeKind::HasTag).await, 0);
        assert_eq!(store.count_nodes(NodeLabel::Tag).await, 2);
    }
}
