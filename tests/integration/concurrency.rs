//! Integration tests for fetch slot limits

use futures::future::join_all;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use statfin_ingest::catalog::Catalog;
use statfin_ingest::orchestrator::Orchestrator;
use statfin_ingest::store::{InMemoryStore, SourceConfig};

use crate::common::{client, SlowCubeTransport};

fn store_with(count: usize) -> Arc<InMemoryStore> {
    let store = (0..count).fold(InMemoryStore::new(), |store, i| {
        store.with_source(SourceConfig::new(format!("source-{i}"), "vrm/a.px"))
    });
    Arc::new(store)
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_fetches_never_exceed_slots() {
    let transport = Arc::new(SlowCubeTransport::new(Duration::from_millis(200)));
    let catalog = Arc::new(Catalog::new(client(transport.clone(), 0)));
    let orch = Orchestrator::new(catalog, store_with(8)).with_max_concurrent(3);
    assert_eq!(orch.max_concurrent(), 3);
    assert_eq!(orch.available_slots(), 3);

    let ids: Vec<String> = (0..8).map(|i| format!("source-{i}")).collect();
    let results = join_all(ids.iter().map(|id| orch.fetch_one(id))).await;

    assert!(results.iter().all(|r| r.success));
    assert_eq!(transport.peak(), 3);
    assert_eq!(orch.available_slots(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_single_slot_serializes_fetches() {
    let transport = Arc::new(SlowCubeTransport::new(Duration::from_millis(50)));
    let catalog = Arc::new(Catalog::new(client(transport.clone(), 0)));
    let orch = Orchestrator::new(catalog, store_with(4)).with_max_concurrent(0);
    // zero is raised to one slot
    assert_eq!(orch.max_concurrent(), 1);

    let ids: Vec<String> = (0..4).map(|i| format!("source-{i}")).collect();
    join_all(ids.iter().map(|id| orch.fetch_one(id))).await;

    assert_eq!(transport.peak(), 1);
}

#[test]
fn test_slot_gauge_recovers_after_fetch() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let transport = Arc::new(SlowCubeTransport::new(Duration::from_millis(1)));
            let catalog = Arc::new(Catalog::new(client(transport, 0)));
            let orch = Orchestrator::new(catalog, store_with(1)).with_max_concurrent(2);
            assert!(orch.fetch_one("source-0").await.success);
        })
    });

    let rendered = handle.render();
    assert!(
        rendered.contains("fetch_slots_available 2"),
        "gauge not restored:\n{rendered}"
    );
}
