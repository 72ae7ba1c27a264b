mod common;

use chrono::Duration;
use common::fixtures::*;
use shopkeeper::registry::EntityType;
use shopkeeper::store::{Filter, MemoryStore, RecordStore};
use shopkeeper::sweeper::{self, FAILED_SENTINEL};
use std::sync::Arc;

#[actix_rt::test]
async fn test_cutoff_is_strict() {
    let store = MemoryStore::new();
    let cutoff = base_time();
    seed_product(&store, "Expired", Some(cutoff - Duration::seconds(1))).await;
    seed_product(&store, "Exact", Some(cutoff)).await;
    seed_product(&store, "Recent", Some(cutoff + Duration::seconds(1))).await;
    seed_product(&store, "Live", None).await;

    let summary = sweeper::run_with_cutoff(&store, cutoff).await;
    assert!(summary.success);
    assert_eq!(summary.cleaned[&EntityType::Product], 1);
    assert_eq!(summary.total_removed(), 1);

    let remaining = store
        .select("products", &Filter::new(), None, None)
        .await
        .unwrap();
    let names: Vec<&str> = remaining
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert!(!names.contains(&"Expired"));
    assert!(names.contains(&"Exact"));
    assert!(names.contains(&"Recent"));
    assert!(names.contains(&"Live"));
}

#[actix_rt::test]
async fn test_sweep_is_idempotent() {
    let store = MemoryStore::new();
    let cutoff = base_time();
    seed_product(&store, "Expired", Some(cutoff - Duration::days(1))).await;
    seed_order(&store, "ORD-1", Some(cutoff - Duration::days(2))).await;

    let first = sweeper::run_with_cutoff(&store, cutoff).await;
    assert_eq!(first.total_removed(), 2);

    let second = sweeper::run_with_cutoff(&store, cutoff).await;
    assert!(second.success);
    assert_eq!(second.total_removed(), 0);
    assert!(second.cleaned.values().all(|&c| c == 0));
}

#[actix_rt::test]
async fn test_sweep_covers_all_registered_types() {
    let store = MemoryStore::new();
    let cutoff = base_time();
    seed_product(&store, "P", Some(cutoff - Duration::days(1))).await;
    seed_brand(&store, "B", "b", Some(cutoff - Duration::days(1))).await;
    seed_order(&store, "ORD-1", Some(cutoff - Duration::days(1))).await;

    let summary = sweeper::run_with_cutoff(&store, cutoff).await;
    assert_eq!(summary.cleaned.len(), EntityType::ALL.len());
    assert_eq!(summary.cleaned[&EntityType::Product], 1);
    assert_eq!(summary.cleaned[&EntityType::Brand], 1);
    assert_eq!(summary.cleaned[&EntityType::Order], 1);
    assert_eq!(summary.cleaned[&EntityType::Category], 0);
    assert_eq!(summary.cleaned[&EntityType::Coupon], 0);
}

#[actix_rt::test]
async fn test_sweep_writes_system_log_entries() {
    let store = MemoryStore::new();
    let cutoff = base_time();
    let id = seed_product(&store, "Expired", Some(cutoff - Duration::days(1))).await;

    sweeper::run_with_cutoff(&store, cutoff).await;

    let logs = store
        .select("trash_log", &Filter::new(), None, None)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    let entry = &logs[0];
    assert_eq!(entry["entity_type"], "product");
    assert_eq!(entry["entity_id"], id.as_str());
    assert_eq!(entry["entity_name"], "Auto-cleaned");
    assert_eq!(entry["action"], "permanently_deleted");
    assert_eq!(entry["performed_by_email"], "system");
}

#[actix_rt::test]
async fn test_failed_type_gets_sentinel_and_others_proceed() {
    let inner = Arc::new(MemoryStore::new());
    let cutoff = base_time();
    seed_product(inner.as_ref(), "Expired", Some(cutoff - Duration::days(1))).await;
    seed_order(inner.as_ref(), "ORD-1", Some(cutoff - Duration::days(1))).await;
    let flaky = FlakyStore::new(inner.clone(), "orders");

    let summary = sweeper::run_with_cutoff(&flaky, cutoff).await;
    assert!(summary.success);
    assert_eq!(summary.cleaned[&EntityType::Product], 1);
    assert_eq!(summary.cleaned[&EntityType::Order], FAILED_SENTINEL);
    assert_eq!(summary.total_removed(), 1);

    // The failed type's rows are untouched.
    assert_eq!(inner.row_count("orders"), 1);
    assert_eq!(inner.row_count("products"), 0);
}
