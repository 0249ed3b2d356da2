//! Integration tests for the file-backed store

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use statfin_ingest::store::file::{StoreDocument, SCHEMA_VERSION};
use statfin_ingest::store::{
    FetchOutcome, FetchState, FileStore, SourceConfig, SourceStore, StatusUpdate, StoreError,
    StoredRecord,
};

use crate::common::{orchestrator, population_cube, ScriptedTransport};

fn row(region: &str, value: f64) -> StoredRecord {
    StoredRecord {
        source_id: "vaesto".to_string(),
        year: 2023,
        quarter: None,
        month: None,
        region_code: Some(region.to_string()),
        industry_code: None,
        value: Some(value),
        value_label: Some("Väestö 31.12.".to_string()),
        unit: Some("henkilöä".to_string()),
        fetched_at: Utc.with_ymd_and_hms(2024, 3, 28, 6, 0, 0).unwrap(),
    }
}

#[test]
fn test_open_initializes_empty_document() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    assert!(store.state_path().exists());
    let document = store.load_document().unwrap();
    assert_eq!(document.schema_version, SCHEMA_VERSION);
    assert!(document.sources.is_empty());
    assert!(document.region_codes.is_none());
}

#[tokio::test]
async fn test_sources_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileStore::open(dir.path()).unwrap();
        store
            .upsert_source(SourceConfig::new("vaesto", "vrm/a.px").with_priority(2))
            .await
            .unwrap();
        store
            .upsert_source(SourceConfig::new("off", "vrm/b.px").inactive())
            .await
            .unwrap();
        // replace, not duplicate
        store
            .upsert_source(SourceConfig::new("vaesto", "vrm/a.px").with_priority(7))
            .await
            .unwrap();
    }

    let store = FileStore::open(dir.path()).unwrap();
    let source = store.get_source("vaesto").await.unwrap().unwrap();
    assert_eq!(source.priority, 7);
    let active = store.list_active_sources().await.unwrap();
    assert_eq!(active.len(), 1);
    assert!(store.get_source("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_rejects_invalid_source() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let err = store
        .upsert_source(SourceConfig::new("broken", " "))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}

#[tokio::test]
async fn test_upsert_rejects_ids_sharing_a_record_file() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store
        .upsert_source(SourceConfig::new("vrm/a", "vrm/a.px"))
        .await
        .unwrap();

    let err = store
        .upsert_source(SourceConfig::new("vrm_a", "vrm/b.px"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::IdConflict {
            id: "vrm_a".to_string(),
            existing: "vrm/a".to_string()
        }
    );
    assert!(store.get_source("vrm_a").await.unwrap().is_none());

    // same id still replaces
    store
        .upsert_source(SourceConfig::new("vrm/a", "vrm/c.px"))
        .await
        .unwrap();
    let source = store.get_source("vrm/a").await.unwrap().unwrap();
    assert_eq!(source.table_path, "vrm/c.px");
}

#[tokio::test]
async fn test_write_batch_replaces_and_summarizes() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let first = store
        .write_batch("vaesto", vec![row("SSS", 1.0), row("01", 2.0)])
        .await
        .unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(store.read_records("vaesto").unwrap(), vec![row("SSS", 1.0), row("01", 2.0)]);

    let second = store
        .write_batch("vaesto", vec![row("SSS", 1.0), row("01", 3.0), row("02", 4.0)])
        .await
        .unwrap();
    assert_eq!((second.inserted, second.updated, second.skipped), (1, 1, 1));
    assert_eq!(store.read_records("vaesto").unwrap().len(), 3);
}

#[test]
fn test_records_path_is_sanitized() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let path = store.records_path("../etc/passwd");
    assert!(path.starts_with(dir.path()));
    assert_eq!(path.file_name().unwrap(), ".._etc_passwd.csv");
}

#[tokio::test]
async fn test_update_status_unknown_source() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let now = Utc::now();
    let err = store
        .update_status(
            "ghost",
            StatusUpdate {
                outcome: FetchOutcome::Success,
                at: now,
                next_fetch_at: now,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound("ghost".to_string()));
}

#[test]
fn test_schema_version_mismatch() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store
        .save_document(&StoreDocument {
            schema_version: "0.1.0".to_string(),
            ..StoreDocument::default()
        })
        .unwrap();

    let err = store.load_document().unwrap_err();
    assert!(matches!(err, StoreError::SchemaVersionMismatch { .. }));
}

#[tokio::test]
async fn test_reference_codes_from_document() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store
        .modify_document(|doc| {
            doc.region_codes = Some(vec!["SSS".to_string(), "01".to_string()]);
            Ok(())
        })
        .unwrap();

    let codes = store.reference_codes().await.unwrap();
    assert!(codes.regions.unwrap().contains("01"));
    assert!(codes.industries.is_none());
}

#[tokio::test]
async fn test_orchestrated_fetch_into_file_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    store
        .upsert_source(SourceConfig::new("vaesto", "vrm/statfin_vaerak_pxt_11ra.px"))
        .await
        .unwrap();
    let transport = Arc::new(ScriptedTransport::json(population_cube()));
    let orch = orchestrator(transport, store.clone());

    let result = orch.fetch_one("vaesto").await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(store.read_records("vaesto").unwrap().len(), 6);

    let reopened = FileStore::open(dir.path()).unwrap();
    let status = reopened.get_source("vaesto").await.unwrap().unwrap().status;
    assert_eq!(status.last_fetch_status, FetchState::Success);
    assert_eq!(status.fetch_count, 1);
}
