// Database integration tests
// Tests SQLite operations in isolation using in-memory database

mod common;

use relscan::repository::{CacheRecord, Database, SCHEMA_VERSION};

/// Helper to create test database with initialized schema
async fn setup_db() -> Database {
    let db = common::create_test_db().await;
    db.init_schema().await.unwrap();
    db
}

fn record<'a>(commit: &'a str, lineage: &'a str, state: &'a str) -> CacheRecord<'a> {
    CacheRecord::new(commit, lineage, "cfg", "sum", state)
}

#[tokio::test]
async fn test_schema_init() {
    let db = common::create_test_db().await;

    // First init should return true (schema was rebuilt/created)
    let rebuilt = db.init_schema().await.unwrap();
    assert!(rebuilt, "First init_schema should return true");

    // Second init should return false (schema exists and version matches)
    let rebuilt = db.init_schema().await.unwrap();
    assert!(!rebuilt, "Second init_schema should return false");

    // Verify schema version is stored
    let version = db.get_metadata("schema_version").await;
    assert_eq!(version.as_deref(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_schema_version_change_drops_cache() {
    let db = setup_db().await;
    db.save_cache_records_with_callback(&[record("c1", "l1", "{}")], |_| {})
        .await
        .unwrap();

    // Pretend an older build wrote this cache
    db.set_metadata("schema_version", "0").await.unwrap();

    let rebuilt = db.init_schema().await.unwrap();
    assert!(rebuilt, "Stale schema should be rebuilt");
    assert_eq!(db.cache_entry_count().await.unwrap(), 0);
    assert_eq!(db.get_metadata("schema_version").await.as_deref(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_metadata_roundtrip() {
    let db = setup_db().await;

    // Set metadata
    db.set_metadata("test_key", "test_value").await.unwrap();

    // Get metadata
    let value = db.get_metadata("test_key").await;
    assert_eq!(value.as_deref(), Some("test_value"));

    // Update metadata
    db.set_metadata("test_key", "updated_value").await.unwrap();
    let value = db.get_metadata("test_key").await;
    assert_eq!(value.as_deref(), Some("updated_value"));

    // Non-existent key returns None
    let value = db.get_metadata("nonexistent").await;
    assert!(value.is_none());
}

#[tokio::test]
async fn test_save_and_load_record() {
    let db = setup_db().await;

    let records = vec![record("c1", "l1", "{\"a\":1}"), record("c2", "l2", "{\"b\":2}")];
    let mut reported = 0;
    db.save_cache_records_with_callback(&records, |n| reported += n)
        .await
        .unwrap();
    assert_eq!(reported, 2);

    let loaded = db.load_cache_record("c1", "l1").await.unwrap().unwrap();
    assert_eq!(loaded.commit_id, "c1");
    assert_eq!(loaded.config_hash, "cfg");
    assert_eq!(loaded.checksum, "sum");
    assert_eq!(loaded.state, "{\"a\":1}");

    // Same commit through a different lineage is a different entry
    assert!(db.load_cache_record("c1", "l2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_existing_records_not_replaced() {
    let db = setup_db().await;

    db.save_cache_records_with_callback(&[record("c1", "l1", "first")], |_| {})
        .await
        .unwrap();
    // Saving the same key again must keep the original row
    db.save_cache_records_with_callback(&[record("c1", "l1", "second")], |_| {})
        .await
        .unwrap();

    let loaded = db.load_cache_record("c1", "l1").await.unwrap().unwrap();
    assert_eq!(loaded.state, "first");
    assert_eq!(db.cache_entry_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_large_batch_spans_chunks() {
    let db = setup_db().await;

    let ids: Vec<String> = (0..2500).map(|i| format!("commit{i}")).collect();
    let records: Vec<CacheRecord<'_>> = ids.iter().map(|id| record(id, "l", "{}")).collect();
    let mut calls = 0;
    db.save_cache_records_with_callback(&records, |_| calls += 1)
        .await
        .unwrap();

    assert_eq!(calls, 3);
    assert_eq!(db.cache_entry_count().await.unwrap(), 2500);
}

#[tokio::test]
async fn test_clear_cache() {
    let db = setup_db().await;

    db.save_cache_records_with_callback(&[record("c1", "l1", "{}"), record("c2", "l1", "{}")], |_| {})
        .await
        .unwrap();
    assert_eq!(db.cache_entry_count().await.unwrap(), 2);

    db.clear_cache().await.unwrap();
    assert_eq!(db.cache_entry_count().await.unwrap(), 0);

    // Metadata survives clearing the cache
    assert_eq!(db.get_metadata("schema_version").await.as_deref(), Some(SCHEMA_VERSION));
}
