//! Neo4j connection management and shared graph client.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use serde::Deserialize;

use catalog_core::{Attributes, EdgeKind, NodeLabel};

use crate::mutations::{
    attributes_param, create_edge_cypher, create_node_cypher, merge_edge_cypher,
    merge_node_cypher, replace_node_cypher, value_param,
};
use crate::queries::{decode_row, pattern_query};
use crate::store::{merge_key_value, validate_properties, GraphStore, NodeRef, Pattern, Row};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Invalid property key: {0}")]
    InvalidKey(String),

    #[error("Unknown node reference: {0}")]
    UnknownNode(String),

    #[error("Missing or mistyped column: {0}")]
    Column(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for connecting to Neo4j.
///
/// Read from the `[neo4j]` section of `catalog.toml` or
/// `CATALOG__NEO4J__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        // The pool is lazy; force a round trip so an unreachable server fails here.
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    async fn returned_ref(&self, q: Query) -> Result<NodeRef, GraphError> {
        let row = self
            .query_one(q)
            .await?
            .ok_or_else(|| GraphError::Serialization("write returned no node".to_string()))?;
        let node_ref: String = row
            .get("ref")
            .map_err(|e| GraphError::Serialization(format!("Failed to read node ref: {e}")))?;
        Ok(NodeRef(node_ref))
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn create_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
    ) -> Result<NodeRef, GraphError> {
        validate_properties(properties)?;
        let q = query(&create_node_cypher(label)).param("props", attributes_param(properties));
        self.returned_ref(q).await
    }

    async fn merge_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
    ) -> Result<NodeRef, GraphError> {
        validate_properties(properties)?;
        let key_value = merge_key_value(properties, key)?;
        let q = query(&merge_node_cypher(label, key)?)
            .param("key_value", value_param(key_value))
            .param("props", attributes_param(properties));
        self.returned_ref(q).await
    }

    async fn replace_node(
        &self,
        label: NodeLabel,
        properties: &Attributes,
        key: &str,
    ) -> Result<NodeRef, GraphError> {
        validate_properties(properties)?;
        let key_value = merge_key_value(properties, key)?;
        let q = query(&replace_node_cypher(label, key)?)
            .param("key_value", value_param(key_value))
            .param("props", attributes_param(properties));
        self.returned_ref(q).await
    }

    async fn create_edge(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        edge: EdgeKind,
    ) -> Result<(), GraphError> {
        let q = query(&create_edge_cypher(edge))
            .param("from", from.0.clone())
            .param("to", to.0.clone());

        match self.query_one(q).await? {
            Some(_) => Ok(()),
            None => Err(GraphError::UnknownNode(format!("{} or {}", from.0, to.0))),
        }
    }

    async fn merge_edge(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        edge: EdgeKind,
    ) -> Result<bool, GraphError> {
        let q = query(&merge_edge_cypher(edge))
            .param("from", from.0.clone())
            .param("to", to.0.clone());

        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<bool>("created").unwrap_or(false)),
            None => Err(GraphError::UnknownNode(format!("{} or {}", from.0, to.0))),
        }
    }

    async fn run_pattern(&self, pattern: &Pattern) -> Result<Vec<Row>, GraphError> {
        let rows = self.query_rows(pattern_query(pattern)).await?;
        tracing::debug!(pattern = pattern.name(), rows = rows.len(), "Pattern executed");
        rows.iter().map(|row| decode_row(pattern, row)).collect()
    }
}
