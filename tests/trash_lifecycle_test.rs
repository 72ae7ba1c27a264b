mod common;

use chrono::Duration;
use common::fixtures::*;
use shopkeeper::registry::EntityType;
use shopkeeper::store::{ChangeNotifier, Filter, MemoryStore, RecordStore};
use shopkeeper::trash::{Actor, TrashFilter, TrashManager};
use shopkeeper::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn manager(store: &Arc<MemoryStore>) -> TrashManager {
    TrashManager::new(store.clone())
}

#[actix_rt::test]
async fn test_trash_then_restore_round_trips() {
    let store = Arc::new(MemoryStore::new());
    let trash = manager(&store);
    let id = seed_product(store.as_ref(), "Widget", None).await;
    let actor = Actor::user("u1", "admin@example.com");

    trash
        .trash(EntityType::Product, &id, Some(&actor))
        .await
        .unwrap();
    let rows = store
        .select("products", &Filter::by_id(&id), None, None)
        .await
        .unwrap();
    assert!(rows[0].get("deleted_at").unwrap().is_string());

    trash
        .restore(EntityType::Product, &id, Some(&actor))
        .await
        .unwrap();
    let rows = store
        .select("products", &Filter::by_id(&id), None, None)
        .await
        .unwrap();
    let row = &rows[0];
    assert!(row.get("deleted_at").unwrap().is_null());
    // Non-lifecycle fields survive the round trip untouched.
    assert_eq!(row["name"], "Widget");
    assert_eq!(row["sku"], "SKU-WIDGET");
    assert_eq!(row["price"], 9.99);

    let entries = trash.activity_log(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.action == "trashed"));
    assert!(entries.iter().any(|e| e.action == "restored"));
    for entry in &entries {
        assert_eq!(entry.entity_name, "Widget");
        assert_eq!(entry.performed_by.as_deref(), Some("u1"));
        assert_eq!(entry.performed_by_email.as_deref(), Some("admin@example.com"));
    }
}

#[actix_rt::test]
async fn test_permanent_delete_logs_name_of_removed_row() {
    let store = Arc::new(MemoryStore::new());
    let trash = manager(&store);
    let id = seed_product(store.as_ref(), "Doomed", Some(base_time())).await;

    trash
        .permanent_delete(EntityType::Product, &id, None)
        .await
        .unwrap();
    assert_eq!(store.row_count("products"), 0);
    assert!(trash.list_trashed(TrashFilter::All).await.is_empty());

    let entries = trash.activity_log(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "permanently_deleted");
    assert_eq!(entries[0].entity_name, "Doomed");
    assert_eq!(entries[0].entity_id, id);
}

#[actix_rt::test]
async fn test_lifecycle_ops_are_not_found_for_unknown_ids() {
    let store = Arc::new(MemoryStore::new());
    let trash = manager(&store);

    let err = trash
        .trash(EntityType::Product, "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = trash
        .restore(EntityType::Brand, "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = trash
        .permanent_delete(EntityType::Order, "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    // Failed operations leave no audit trail.
    assert!(trash.activity_log(10).await.unwrap().is_empty());
}

#[actix_rt::test]
async fn test_list_trashed_sorts_and_filters() {
    let store = Arc::new(MemoryStore::new());
    let trash = manager(&store);
    let t = base_time();
    let old_product = seed_product(store.as_ref(), "Old", Some(t)).await;
    let new_product = seed_product(store.as_ref(), "New", Some(t + Duration::hours(2))).await;
    let brand = seed_brand(store.as_ref(), "Acme", "acme", Some(t + Duration::hours(1))).await;
    seed_product(store.as_ref(), "Live", None).await;

    let all = trash.list_trashed(TrashFilter::All).await;
    let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![&new_product, &brand, &old_product]);

    let products = trash.list_trashed(TrashFilter::Only(EntityType::Product)).await;
    assert_eq!(products.len(), 2);
    assert!(products.iter().all(|i| i.entity_type == EntityType::Product));
    // Extra display columns ride along.
    assert_eq!(products[0].extra["sku"], "SKU-NEW");
}

#[actix_rt::test]
async fn test_list_trashed_skips_failing_type() {
    let inner = Arc::new(MemoryStore::new());
    seed_product(inner.as_ref(), "Widget", Some(base_time())).await;
    seed_brand(inner.as_ref(), "Acme", "acme", Some(base_time())).await;
    let flaky: Arc<dyn RecordStore> = Arc::new(FlakyStore::new(inner.clone(), "brands"));
    let trash = TrashManager::new(flaky);

    let items = trash.list_trashed(TrashFilter::All).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].entity_type, EntityType::Product);
    assert_eq!(items[0].name, "Widget");
}

#[actix_rt::test]
async fn test_bulk_restore_partial_failure() {
    let inner = Arc::new(MemoryStore::new());
    let p1 = seed_product(inner.as_ref(), "One", Some(base_time())).await;
    let p2 = seed_product(inner.as_ref(), "Two", Some(base_time())).await;
    let b1 = seed_brand(inner.as_ref(), "Acme", "acme", Some(base_time())).await;
    let flaky: Arc<dyn RecordStore> = Arc::new(FlakyStore::new(inner.clone(), "brands"));
    let trash = TrashManager::new(flaky);

    let selection = vec![
        (EntityType::Product, p1.clone()),
        (EntityType::Brand, b1.clone()),
        (EntityType::Product, p2.clone()),
    ];
    let restored = trash.bulk_restore(&selection, None).await;
    assert_eq!(restored, 2);

    // The products are live again; the brand stayed trashed.
    let live = inner
        .select("products", &Filter::new().is_null("deleted_at"), None, None)
        .await
        .unwrap();
    assert_eq!(live.len(), 2);
    let brands = inner
        .select("brands", &Filter::by_id(&b1), None, None)
        .await
        .unwrap();
    assert!(brands[0].get("deleted_at").unwrap().is_string());

    // Only the successful group was logged.
    let entries = trash.activity_log(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.action == "restored"));
    assert!(entries.iter().all(|e| e.entity_type == "product"));
}

#[actix_rt::test]
async fn test_lost_log_entry_does_not_block_lifecycle() {
    let inner = Arc::new(MemoryStore::new());
    let id = seed_product(inner.as_ref(), "Widget", None).await;
    let flaky: Arc<dyn RecordStore> = Arc::new(FlakyStore::new(inner.clone(), "trash_log"));
    let trash = TrashManager::new(flaky);

    trash.trash(EntityType::Product, &id, None).await.unwrap();
    let rows = inner
        .select("products", &Filter::by_id(&id), None, None)
        .await
        .unwrap();
    assert!(rows[0].get("deleted_at").unwrap().is_string());

    trash.restore(EntityType::Product, &id, None).await.unwrap();
    let rows = inner
        .select("products", &Filter::by_id(&id), None, None)
        .await
        .unwrap();
    assert!(rows[0].get("deleted_at").unwrap().is_null());

    // Both state changes went through without a single ledger row.
    assert_eq!(inner.row_count("trash_log"), 0);
}

#[actix_rt::test]
async fn test_notifier_fires_after_each_mutation() {
    struct CountingNotifier {
        product_changes: AtomicUsize,
    }

    impl ChangeNotifier for CountingNotifier {
        fn record_changed(&self, table: &str) {
            if table == "products" {
                self.product_changes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(CountingNotifier {
        product_changes: AtomicUsize::new(0),
    });
    let trash = TrashManager::new(store.clone()).with_notifier(notifier.clone());
    let id = seed_product(store.as_ref(), "Widget", None).await;

    trash.trash(EntityType::Product, &id, None).await.unwrap();
    trash.restore(EntityType::Product, &id, None).await.unwrap();
    trash
        .permanent_delete(EntityType::Product, &id, None)
        .await
        .unwrap();
    assert_eq!(notifier.product_changes.load(Ordering::SeqCst), 3);

    // A failed operation must not notify.
    assert!(trash.trash(EntityType::Product, "missing", None).await.is_err());
    assert_eq!(notifier.product_changes.load(Ordering::SeqCst), 3);
}

#[actix_rt::test]
async fn test_retrashing_appends_duplicate_log_entries() {
    let store = Arc::new(MemoryStore::new());
    let trash = manager(&store);
    let id = seed_product(store.as_ref(), "Widget", None).await;

    trash.trash(EntityType::Product, &id, None).await.unwrap();
    trash.trash(EntityType::Product, &id, None).await.unwrap();

    let entries = trash.activity_log(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.action == "trashed"));
    assert!(entries.iter().all(|e| e.entity_id == id));
}

#[actix_rt::test]
async fn test_mixed_session_leaves_consistent_log() {
    let store = Arc::new(MemoryStore::new());
    let trash = manager(&store);
    let actor = Actor::user("u1", "admin@example.com");
    let p1 = seed_product(store.as_ref(), "Alpha", None).await;
    let p2 = seed_product(store.as_ref(), "Beta", None).await;
    let p3 = seed_product(store.as_ref(), "Gamma", None).await;

    for id in [&p1, &p2, &p3] {
        trash
            .trash(EntityType::Product, id, Some(&actor))
            .await
            .unwrap();
    }
    trash
        .restore(EntityType::Product, &p1, Some(&actor))
        .await
        .unwrap();
    let deleted = trash
        .bulk_permanent_delete(
            &[
                (EntityType::Product, p2.clone()),
                (EntityType::Product, p3.clone()),
            ],
            Some(&actor),
        )
        .await;
    assert_eq!(deleted, 2);

    // Alpha is live, the other two are gone.
    assert!(trash
        .list_trashed(TrashFilter::Only(EntityType::Product))
        .await
        .is_empty());
    assert_eq!(store.row_count("products"), 1);

    let entries = trash.activity_log(10).await.unwrap();
    assert_eq!(entries.len(), 6);
    let count = |action: &str| entries.iter().filter(|e| e.action == action).count();
    assert_eq!(count("trashed"), 3);
    assert_eq!(count("restored"), 1);
    assert_eq!(count("permanently_deleted"), 2);
    // Newest first.
    for pair in entries.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}
