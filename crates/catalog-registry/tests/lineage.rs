//! Pipeline linking and dependency wiring against the in-memory graph store.

use std::sync::Arc;
use std::time::Duration;

use catalog_core::{attributes, Attributes, DataProduct, EdgeKind, EntityId, NodeLabel};
use catalog_graph::MemoryStore;
use catalog_registry::{AutoWireReport, AutoWireScheduler, Registry, RegistryError};

fn pipeline(name: &str) -> Attributes {
    attributes([("name", name)])
}

async fn product(registry: &Registry<MemoryStore>, name: &str) -> EntityId {
    registry.create(&DataProduct::named(name)).await.unwrap().id
}

// ── Pipelines ────────────────────────────────────────────────────

#[tokio::test]
async fn test_link_pipelines_is_idempotent() {
    let registry = Registry::new(MemoryStore::new());

    assert!(registry
        .link_pipelines(&pipeline("Ingest"), &pipeline("Process"))
        .await
        .unwrap());
    assert!(!registry
        .link_pipelines(&pipeline("Ingest"), &pipeline("Process"))
        .await
        .unwrap());

    let store = registry.store();
    assert_eq!(store.count_edges(EdgeKind::Triggers).await, 1);
    assert_eq!(store.count_nodes(NodeLabel::Pipeline).await, 2);
}

#[tokio::test]
async fn test_first_reference_decides_pipeline_attributes() {
    let registry = Registry::new(MemoryStore::new());
    registry
        .link_pipelines(
            &attributes([("name", "Ingest"), ("status", "Active")]),
            &pipeline("Process"),
        )
        .await
        .unwrap();
    registry
        .link_pipelines(
            &attributes([("name", "Ingest"), ("status", "Paused")]),
            &pipeline("Publish"),
        )
        .await
        .unwrap();

    let ingest: Vec<_> = registry
        .store()
        .nodes(NodeLabel::Pipeline)
        .await
        .into_iter()
        .filter(|p| p.get_str("name") == Some("Ingest"))
        .collect();
    assert_eq!(ingest.len(), 1);
    assert_eq!(ingest[0].get_str("status"), Some("Active"));
}

#[tokio::test]
async fn test_pipelines_need_a_name() {
    let registry = Registry::new(MemoryStore::new());
    let err = registry
        .link_pipelines(&attributes([("status", "Active")]), &pipeline("Process"))
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Validation(_)));
    assert_eq!(registry.store().count_nodes(NodeLabel::Pipeline).await, 0);
}

#[tokio::test]
async fn test_pipeline_produces_is_idempotent() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "RawCustomerData").await;

    assert!(registry
        .pipeline_produces(&pipeline("Ingest"), raw)
        .await
        .unwrap());
    assert!(!registry
        .pipeline_produces(&pipeline("Ingest"), raw)
        .await
        .unwrap());

    assert_eq!(registry.store().count_edges(EdgeKind::Produces).await, 1);
}

#[tokio::test]
async fn test_pipeline_produces_unknown_product_writes_nothing() {
    let registry = Registry::new(MemoryStore::new());
    let err = registry
        .pipeline_produces(&pipeline("Ingest"), EntityId::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::NotFound(_)));
    assert_eq!(registry.store().count_nodes(NodeLabel::Pipeline).await, 0);
}

// ── Auto-wiring ──────────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_process_scenario() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "RawCustomerData").await;
    let processed = product(&registry, "ProcessedCustomerData").await;

    registry
        .link_pipelines(&pipeline("Ingest"), &pipeline("Process"))
        .await
        .unwrap();
    registry
        .pipeline_produces(&pipeline("Ingest"), raw)
        .await
        .unwrap();
    registry
        .pipeline_produces(&pipeline("Process"), processed)
        .await
        .unwrap();

    let report = registry.auto_wire_dependencies().await.unwrap();
    assert_eq!(
        report,
        AutoWireReport {
            candidates: 1,
            created: 1
        }
    );
    assert_eq!(registry.dependencies().await.unwrap(), vec![(raw, processed)]);
}

#[tokio::test]
async fn test_auto_wire_is_monotonic() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "RawX").await;
    let processed = product(&registry, "ProcessedX").await;
    registry
        .link_pipelines(&pipeline("P1"), &pipeline("P2"))
        .await
        .unwrap();
    registry.pipeline_produces(&pipeline("P1"), raw).await.unwrap();
    registry
        .pipeline_produces(&pipeline("P2"), processed)
        .await
        .unwrap();

    let first = registry.auto_wire_dependencies().await.unwrap();
    let second = registry.auto_wire_dependencies().await.unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.candidates, 1);
    assert_eq!(second.created, 0);
    assert_eq!(registry.store().count_edges(EdgeKind::FeedsInto).await, 1);
}

#[tokio::test]
async fn test_auto_wire_collapses_fan_out() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "Raw").await;
    let clean = product(&registry, "Clean").await;
    let report_a = product(&registry, "ReportA").await;

    // Two upstream pipelines produce Raw and both trigger Transform.
    for upstream in ["IngestA", "IngestB"] {
        registry
            .link_pipelines(&pipeline(upstream), &pipeline("Transform"))
            .await
            .unwrap();
        registry
            .pipeline_produces(&pipeline(upstream), raw)
            .await
            .unwrap();
    }
    registry
        .pipeline_produces(&pipeline("Transform"), clean)
        .await
        .unwrap();
    registry
        .pipeline_produces(&pipeline("Transform"), report_a)
        .await
        .unwrap();

    let report = registry.auto_wire_dependencies().await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.created, 2);

    let mut expected = vec![(raw, clean), (raw, report_a)];
    expected.sort();
    assert_eq!(registry.dependencies().await.unwrap(), expected);
}

#[tokio::test]
async fn test_auto_wire_ignores_unlinked_pipelines() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "Raw").await;
    let other = product(&registry, "Other").await;
    registry.pipeline_produces(&pipeline("Ingest"), raw).await.unwrap();
    registry
        .pipeline_produces(&pipeline("Unrelated"), other)
        .await
        .unwrap();

    let report = registry.auto_wire_dependencies().await.unwrap();
    assert_eq!(report, AutoWireReport::default());
}

#[tokio::test]
async fn test_scheduler_wires_in_background() {
    let registry = Arc::new(Registry::new(MemoryStore::new()));
    let raw = product(&registry, "Raw").await;
    let processed = product(&registry, "Processed").await;
    registry
        .link_pipelines(&pipeline("Ingest"), &pipeline("Process"))
        .await
        .unwrap();
    registry.pipeline_produces(&pipeline("Ingest"), raw).await.unwrap();
    registry
        .pipeline_produces(&pipeline("Process"), processed)
        .await
        .unwrap();

    let handle =
        AutoWireScheduler::new(registry.clone(), Duration::from_millis(20)).spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    assert_eq!(registry.dependencies().await.unwrap(), vec![(raw, processed)]);
}

// ── Explicit dependencies ────────────────────────────────────────

#[tokio::test]
async fn test_add_dependency_is_idempotent() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "RawX").await;
    let processed = product(&registry, "ProcessedX").await;

    assert!(registry.add_dependency(raw, processed).await.unwrap());
    assert!(!registry.add_dependency(raw, processed).await.unwrap());
    assert_eq!(registry.store().count_edges(EdgeKind::FeedsInto).await, 1);
}

#[tokio::test]
async fn test_add_dependency_unknown_id_is_not_found() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "RawX").await;

    let err = registry
        .add_dependency(raw, EntityId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
    assert_eq!(registry.store().count_edges(EdgeKind::FeedsInto).await, 0);
}

#[tokio::test]
async fn test_add_dependency_by_name() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "RawCustomerData").await;
    let processed = product(&registry, "ProcessedCustomerData").await;

    assert!(registry
        .add_dependency_by_name("RawCustomerData", "ProcessedCustomerData")
        .await
        .unwrap());
    assert_eq!(registry.dependencies().await.unwrap(), vec![(raw, processed)]);

    let err = registry
        .add_dependency_by_name("RawCustomerData", "Missing")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn test_explicit_and_derived_edges_converge() {
    let registry = Registry::new(MemoryStore::new());
    let raw = product(&registry, "Raw").await;
    let processed = product(&registry, "Processed").await;
    registry.add_dependency(raw, processed).await.unwrap();

    registry
        .link_pipelines(&pipeline("Ingest"), &pipeline("Process"))
        .await
        .unwrap();
    registry.pipeline_produces(&pipeline("Ingest"), raw).await.unwrap();
    registry
        .pipeline_produces(&pipeline("Process"), processed)
        .await
        .unwrap();

    let report = registry.auto_wire_dependencies().await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.created, 0);
    assert_eq!(registry.store().count_edges(EdgeKind::FeedsInto).await, 1);
}
