//! Pipeline linking.
//!
//! Pipelines are shared nodes, unique by name. The first caller to mention
//! a pipeline decides its stored attributes; later references only match
//! it by name.

use catalog_core::{AttrValue, Attributes, EdgeKind, EntityId, NodeLabel};
use catalog_graph::{GraphStore, NodeRef, Pattern};

use crate::error::{RegistryError, Result};
use crate::registry::{validate_attributes, Registry};

impl<S: GraphStore> Registry<S> {
    /// Record that `upstream` triggers `downstream`. Returns true when the
    /// `TRIGGERS` edge did not exist yet.
    pub async fn link_pipelines(&self, upstream: &Attributes, downstream: &Attributes) -> Result<bool> {
        let from_name = require_name(upstream)?;
        let to_name = require_name(downstream)?;
        validate_attributes("pipeline", upstream)?;
        validate_attributes("pipeline", downstream)?;

        let from = self.upsert_pipeline(upstream).await?;
        let to = self.upsert_pipeline(downstream).await?;
        let created = self.store.merge_edge(&from, &to, EdgeKind::Triggers).await?;

        tracing::info!(
            upstream = from_name,
            downstream = to_name,
            created,
            "Pipelines linked"
        );
        Ok(created)
    }

    /// Record that a pipeline produces a data product. Returns true when
    /// the `PRODUCES` edge did not exist yet.
    pub async fn pipeline_produces(&self, pipeline: &Attributes, id: EntityId) -> Result<bool> {
        let name = require_name(pipeline)?;
        validate_attributes("pipeline", pipeline)?;

        // Resolve the data product first so a bad id writes nothing.
        let product = self.root(id).await?;
        let node = self.upsert_pipeline(pipeline).await?;
        let created = self
            .store
            .merge_edge(&node, &product.node, EdgeKind::Produces)
            .await?;

        tracing::info!(
            pipeline = name,
            product = product.get_str("name").unwrap_or_default(),
            id = %id,
            created,
            "Pipeline produces data product"
        );
        Ok(created)
    }

    /// Find the pipeline by name, creating it with every supplied attribute
    /// when it does not exist.
    pub(crate) async fn upsert_pipeline(&self, pipeline: &Attributes) -> Result<NodeRef> {
        let name = require_name(pipeline)?;
        let existing = self
            .store
            .run_pattern(&Pattern::PipelineByName {
                name: name.to_string(),
            })
            .await?;

        if let Some(row) = existing.first() {
            return Ok(row.node("node")?.node.clone());
        }

        tracing::debug!(pipeline = name, "Creating pipeline");
        Ok(self
            .store
            .merge_node(NodeLabel::Pipeline, pipeline, "name")
            .await?)
    }
}

/// The pipeline's name, when it carries a string `name` attribute.
pub(crate) fn pipeline_name(pipeline: &Attributes) -> Option<&str> {
    pipeline.get("name").and_then(AttrValue::as_str)
}

fn require_name(pipeline: &Attributes) -> Result<&str> {
    pipeline_name(pipeline).ok_or_else(|| {
        RegistryError::Validation("pipeline attributes must include a string `name`".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::attributes;

    #[test]
    fn test_pipeline_name_must_be_text() {
        assert_eq!(pipeline_name(&attributes([("name", "Ingest")])), Some("Ingest"));
        assert_eq!(pipeline_name(&attributes([("name", 7i64)])), None);
        assert!(require_name(&attributes([("status", "Active")])).is_err());
    }
}
