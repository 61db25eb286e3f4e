//! Read patterns and row decoding for the Neo4j store.

use neo4rs::{query, Query};

use catalog_core::{AttrValue, Attributes, EdgeKind, NodeLabel};

use crate::client::{GraphClient, GraphError};
use crate::mutations::attributes_param;
use crate::store::{Cell, ColumnKind, NodeRecord, NodeRef, Pattern, Row};

impl GraphClient {
    /// Count nodes carrying a label.
    pub async fn count_nodes(&self, label: NodeLabel) -> Result<i64, GraphError> {
        let label = label.as_str();
        let q = query(&format!(
            "MATCH (n:{label})
             RETURN count(n) AS cnt"
        ));

        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Count relationships of one type.
    pub async fn count_edges(&self, edge: EdgeKind) -> Result<i64, GraphError> {
        let rel_type = edge.as_cypher();
        let q = query(&format!(
            "MATCH ()-[r:{rel_type}]->()
             RETURN count(r) AS cnt"
        ));

        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }
}

/// Cypher text for a pattern. Node columns `c` are returned together with
/// `c_ref`, the node's `elementId`.
pub(crate) fn pattern_cypher(pattern: &Pattern) -> String {
    match pattern {
        Pattern::EntityById { .. } => "MATCH (n:DataProduct {id: $id})
             RETURN n AS node, elementId(n) AS node_ref
             LIMIT 1"
            .to_string(),
        Pattern::EntityByName { .. } => "MATCH (n:DataProduct {name: $name})
             RETURN n.id AS id
             LIMIT 1"
            .to_string(),
        Pattern::PipelineByName { .. } => "MATCH (n:Pipeline {name: $name})
             RETURN n AS node, elementId(n) AS node_ref
             LIMIT 1"
            .to_string(),
        Pattern::Related { edge, .. } => {
            let rel_type = edge.as_cypher();
            format!(
                "MATCH (:DataProduct {{id: $id}})-[:{rel_type}]->(n)
                 RETURN n AS node, elementId(n) AS node_ref"
            )
        }
        Pattern::DetachRelated { edge, .. } => {
            let rel_type = edge.as_cypher();
            format!(
                "MATCH (:DataProduct {{id: $id}})-[r:{rel_type}]->()
                 DELETE r
                 RETURN count(r) AS removed"
            )
        }
        Pattern::SetProperties { .. } => "MATCH (n:DataProduct {id: $id})
             SET n += $props"
            .to_string(),
        Pattern::ProducedLineage => "MATCH (p1:Pipeline)-[:PRODUCES]->(d1:DataProduct),
                   (p1)-[:TRIGGERS]->(p2:Pipeline)-[:PRODUCES]->(d2:DataProduct)
             RETURN d1 AS upstream, elementId(d1) AS upstream_ref,
                    d2 AS downstream, elementId(d2) AS downstream_ref"
            .to_string(),
        Pattern::Dependencies => "MATCH (a:DataProduct)-[:FEEDS_INTO]->(b:DataProduct)
             RETURN a.id AS source, b.id AS target"
            .to_string(),
        Pattern::ChangeLog { .. } => "MATCH (:DataProduct {id: $id})-[:HAS_CHANGE_LOG]->(n:ChangeLog)
             RETURN n AS node, elementId(n) AS node_ref
             ORDER BY n.timestamp"
            .to_string(),
        Pattern::AppendChangeLog { .. } => "MATCH (d:DataProduct {id: $id})
             CREATE (d)-[:HAS_CHANGE_LOG]->(n:ChangeLog)
             SET n = $props
             RETURN n AS node, elementId(n) AS node_ref"
            .to_string(),
    }
}

/// Build the parameterized query for a pattern.
pub(crate) fn pattern_query(pattern: &Pattern) -> Query {
    let q = query(&pattern_cypher(pattern));
    match pattern {
        Pattern::EntityById { id }
        | Pattern::Related { id, .. }
        | Pattern::DetachRelated { id, .. }
        | Pattern::ChangeLog { id } => q.param("id", id.to_string()),
        Pattern::EntityByName { name } | Pattern::PipelineByName { name } => {
            q.param("name", name.clone())
        }
        Pattern::SetProperties { id, properties }
        | Pattern::AppendChangeLog { id, properties } => q
            .param("id", id.to_string())
            .param("props", attributes_param(properties)),
        Pattern::ProducedLineage | Pattern::Dependencies => q,
    }
}

/// Decode a Neo4j row into the columns the pattern declares.
pub(crate) fn decode_row(pattern: &Pattern, row: &neo4rs::Row) -> Result<Row, GraphError> {
    let mut decoded = Row::new();
    for (column, kind) in pattern.columns() {
        let cell = match kind {
            ColumnKind::Node => decode_node(row, column)?,
            ColumnKind::Text => row
                .get::<String>(column)
                .map(|s| Cell::Value(AttrValue::String(s)))
                .unwrap_or(Cell::Null),
            ColumnKind::Integer => row
                .get::<i64>(column)
                .map(|i| Cell::Value(AttrValue::Integer(i)))
                .unwrap_or(Cell::Null),
        };
        decoded = decoded.with(column, cell);
    }
    Ok(decoded)
}

fn decode_node(row: &neo4rs::Row, column: &str) -> Result<Cell, GraphError> {
    let node: neo4rs::Node = row.get(column).map_err(|e| {
        GraphError::Serialization(format!("Failed to deserialize node {column}: {e}"))
    })?;
    let node_ref: String = row.get(&format!("{column}_ref")).map_err(|e| {
        GraphError::Serialization(format!("Failed to read ref of {column}: {e}"))
    })?;

    Ok(Cell::Node(NodeRecord {
        node: NodeRef(node_ref),
        labels: node.labels().into_iter().map(String::from).collect(),
        properties: node_properties(&node),
    }))
}

/// Read every property of a node into the closed attribute value set.
/// Properties of any other kind are skipped.
fn node_properties(node: &neo4rs::Node) -> Attributes {
    let mut props = Attributes::new();
    for key in node.keys() {
        let value = if let Ok(b) = node.get::<bool>(key) {
            AttrValue::Boolean(b)
        } else if let Ok(i) = node.get::<i64>(key) {
            AttrValue::Integer(i)
        } else if let Ok(x) = node.get::<f64>(key) {
            AttrValue::Float(x)
        } else if let Ok(s) = node.get::<String>(key) {
            AttrValue::String(s)
        } else if let Ok(items) = node.get::<Vec<String>>(key) {
            AttrValue::StringList(items)
        } else {
            tracing::debug!(key, "Skipping property of unsupported type");
            continue;
        };
        props.insert(key.to_string(), value);
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::EntityId;

    #[test]
    fn related_pattern_interpolates_only_the_edge_type() {
        let cypher = pattern_cypher(&Pattern::Related {
            id: EntityId::new(),
            edge: EdgeKind::HasTag,
        });
        assert!(cypher.contains("MATCH (:DataProduct {id: $id})-[:HAS_TAG]->(n)"));
    }

    #[test]
    fn detach_pattern_deletes_edges_not_nodes() {
        let cypher = pattern_cypher(&Pattern::DetachRelated {
            id: EntityId::new(),
            edge: EdgeKind::OwnedBy,
        });
        assert!(cypher.contains("-[r:OWNED_BY]->()"));
        assert!(cypher.contains("DELETE r"));
        assert!(!cypher.contains("DETACH"));
    }

    #[test]
    fn every_node_column_has_a_ref() {
        let patterns = [
            Pattern::EntityById { id: EntityId::new() },
            Pattern::PipelineByName {
                name: "Ingest".to_string(),
            },
            Pattern::Related {
                id: EntityId::new(),
                edge: EdgeKind::HasPolicy,
            },
            Pattern::ProducedLineage,
            Pattern::ChangeLog { id: EntityId::new() },
            Pattern::AppendChangeLog {
                id: EntityId::new(),
                properties: Attributes::new(),
            },
        ];
        for pattern in &patterns {
            let cypher = pattern_cypher(pattern);
            for (column, kind) in pattern.columns() {
                if *kind == ColumnKind::Node {
                    assert!(cypher.contains(&format!("AS {column}_ref")), "{}", pattern.name());
                }
            }
        }
    }
}
