//! Integration tests for the periodic scheduler

use std::sync::Arc;
use std::time::Duration;
use statfin_ingest::orchestrator::Scheduler;
use statfin_ingest::shutdown::ShutdownCoordinator;
use statfin_ingest::store::{InMemoryStore, SourceConfig};

use crate::common::{orchestrator, population_cube, ScriptedTransport};

fn scheduler() -> (Scheduler, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::json(population_cube()));
    let store = Arc::new(InMemoryStore::new().with_source(SourceConfig::new("vaesto", "vrm/a.px")));
    let orch = Arc::new(orchestrator(transport.clone(), store));
    let scheduler = Scheduler::new(orch, Duration::from_secs(3600), ShutdownCoordinator::shared());
    (scheduler, transport)
}

#[tokio::test(start_paused = true)]
async fn test_runs_immediately_then_every_interval() {
    let (scheduler, transport) = scheduler();

    assert!(scheduler.start());
    assert!(scheduler.is_running());
    assert!(!scheduler.start(), "second start must be rejected");

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.runs_completed(), 1);
    assert_eq!(transport.calls(), 1);
    let first = scheduler.last_summary().unwrap();
    assert_eq!((first.attempted, first.successful), (1, 1));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(scheduler.runs_completed(), 2);
    // the source is scheduled a day out after its first fetch
    assert_eq!(scheduler.last_summary().unwrap().attempted, 0);
    assert_eq!(transport.calls(), 1);

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    assert!(!scheduler.start(), "start after stop must be rejected");
}

#[tokio::test]
async fn test_run_once_without_loop() {
    let (scheduler, transport) = scheduler();

    let summary = scheduler.run_once().await;

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.total_records_inserted, 6);
    assert_eq!(scheduler.runs_completed(), 1);
    assert!(!scheduler.is_running());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_stop_before_start_is_harmless() {
    let (scheduler, _) = scheduler();
    scheduler.stop().await;
    assert_eq!(scheduler.runs_completed(), 0);
    assert!(scheduler.last_summary().is_none());
}
