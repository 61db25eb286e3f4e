//! Write operations for the catalog graph.
//!
//! Node and edge writes address nodes by `elementId`, which is what the
//! store hands out as a [`NodeRef`](crate::store::NodeRef). Labels and
//! relationship types are interpolated only from the closed enums.

use neo4rs::{query, BoltMap, BoltString, BoltType};

use catalog_core::{AttrValue, Attributes, EdgeKind, NodeLabel};

use crate::client::{GraphClient, GraphError};
use crate::store::validate_property_key;

impl GraphClient {
    // ── Maintenance ──────────────────────────────────────────────

    /// Remove every node and relationship from the database.
    pub async fn clear(&self) -> Result<i64, GraphError> {
        let q = query(
            "MATCH (n)
             DETACH DELETE n
             RETURN count(n) AS cnt",
        );

        let removed = match self.query_one(q).await? {
            Some(row) => row.get::<i64>("cnt").unwrap_or(0),
            None => 0,
        };
        tracing::warn!(removed, "Cleared graph");
        Ok(removed)
    }
}

// ── Cypher Templates ─────────────────────────────────────────────

pub(crate) fn create_node_cypher(label: NodeLabel) -> String {
    let label = label.as_str();
    format!(
        "CREATE (n:{label})
         SET n = $props
         RETURN elementId(n) AS ref"
    )
}

pub(crate) fn merge_node_cypher(label: NodeLabel, key: &str) -> Result<String, GraphError> {
    validate_property_key(key)?;
    let label = label.as_str();
    Ok(format!(
        "MERGE (n:{label} {{{key}: $key_value}})
         SET n += $props
         RETURN elementId(n) AS ref"
    ))
}

pub(crate) fn replace_node_cypher(label: NodeLabel, key: &str) -> Result<String, GraphError> {
    validate_property_key(key)?;
    let label = label.as_str();
    Ok(format!(
        "MERGE (n:{label} {{{key}: $key_value}})
         SET n = $props
         RETURN elementId(n) AS ref"
    ))
}

pub(crate) fn create_edge_cypher(edge: EdgeKind) -> String {
    let rel_type = edge.as_cypher();
    format!(
        "MATCH (a) WHERE elementId(a) = $from
         MATCH (b) WHERE elementId(b) = $to
         CREATE (a)-[r:{rel_type}]->(b)
         RETURN type(r) AS rel_type"
    )
}

pub(crate) fn merge_edge_cypher(edge: EdgeKind) -> String {
    let rel_type = edge.as_cypher();
    format!(
        "MATCH (a) WHERE elementId(a) = $from
         MATCH (b) WHERE elementId(b) = $to
         OPTIONAL MATCH (a)-[existing:{rel_type}]->(b)
         WITH a, b, count(existing) AS before
         MERGE (a)-[:{rel_type}]->(b)
         RETURN before = 0 AS created"
    )
}

// ── Parameters ───────────────────────────────────────────────────

pub(crate) fn value_param(value: &AttrValue) -> BoltType {
    match value {
        AttrValue::Boolean(b) => BoltType::from(*b),
        AttrValue::Integer(i) => BoltType::from(*i),
        AttrValue::Float(x) => BoltType::from(*x),
        AttrValue::String(s) => BoltType::from(s.as_str()),
        AttrValue::StringList(items) => BoltType::from(items.clone()),
    }
}

pub(crate) fn attributes_param(properties: &Attributes) -> BoltType {
    let mut map = BoltMap::new();
    for (key, value) in properties {
        map.put(BoltString::from(key.as_str()), value_param(value));
    }
    BoltType::Map(map)
}
