//! Test fixtures: seeded rows and a failure-injecting store wrapper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopkeeper::store::{
    FieldValue, Fields, Filter, MemoryStore, Order, RecordStore, Row, StoreError,
};
use std::sync::Arc;

/// Fixed micro-aligned instant so RFC 3339 round trips compare exactly.
pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn row_id(rows: &[Row]) -> String {
    rows[0]
        .get("id")
        .and_then(|v| v.as_str())
        .expect("inserted row should have an id")
        .to_owned()
}

/// Insert a product row directly into the store, optionally pre-trashed.
pub async fn seed_product(
    store: &dyn RecordStore,
    name: &str,
    deleted_at: Option<DateTime<Utc>>,
) -> String {
    let slug = shopkeeper::catalog::slugify(name);
    let mut fields: Fields = vec![
        ("name", name.into()),
        ("slug", slug.into()),
        ("sku", format!("SKU-{}", name.to_uppercase()).into()),
        ("price", 9.99.into()),
        ("quantity", 5i64.into()),
        ("is_active", true.into()),
        ("product_type", "simple".into()),
        ("created_at", base_time().into()),
    ];
    if let Some(ts) = deleted_at {
        fields.push(("deleted_at", ts.into()));
    }
    let rows = store.insert("products", vec![fields]).await.unwrap();
    row_id(&rows)
}

/// Insert a brand row directly into the store, optionally pre-trashed.
pub async fn seed_brand(
    store: &dyn RecordStore,
    name: &str,
    slug: &str,
    deleted_at: Option<DateTime<Utc>>,
) -> String {
    let mut fields: Fields = vec![
        ("name", name.into()),
        ("slug", slug.into()),
        ("is_active", true.into()),
        ("created_at", base_time().into()),
    ];
    if let Some(ts) = deleted_at {
        fields.push(("deleted_at", ts.into()));
    }
    let rows = store.insert("brands", vec![fields]).await.unwrap();
    row_id(&rows)
}

/// Insert a category row directly into the store.
pub async fn seed_category(
    store: &dyn RecordStore,
    name: &str,
    slug: &str,
    parent_id: Option<&str>,
) -> String {
    let fields: Fields = vec![
        ("name", name.into()),
        ("slug", slug.into()),
        (
            "parent_id",
            parent_id
                .map(|id| FieldValue::Text(id.to_owned()))
                .unwrap_or(FieldValue::Null),
        ),
        ("status", "active".into()),
        ("created_at", base_time().into()),
    ];
    let rows = store.insert("categories", vec![fields]).await.unwrap();
    row_id(&rows)
}

/// Insert an order row directly into the store, optionally pre-trashed.
pub async fn seed_order(
    store: &dyn RecordStore,
    order_number: &str,
    deleted_at: Option<DateTime<Utc>>,
) -> String {
    let mut fields: Fields = vec![
        ("order_number", order_number.into()),
        ("total_amount", 42.0.into()),
        ("status", "pending".into()),
        ("created_at", base_time().into()),
    ];
    if let Some(ts) = deleted_at {
        fields.push(("deleted_at", ts.into()));
    }
    let rows = store.insert("orders", vec![fields]).await.unwrap();
    row_id(&rows)
}

/// Store wrapper that fails every operation against one table, simulating a
/// backend outage isolated to that entity type. All other tables pass
/// through to the wrapped [`MemoryStore`].
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    pub broken_table: &'static str,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, broken_table: &'static str) -> Self {
        Self {
            inner,
            broken_table,
        }
    }

    fn check(&self, table: &str) -> Result<(), StoreError> {
        if table == self.broken_table {
            Err(StoreError::Backend(format!(
                "simulated outage for table {}",
                table
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
        limit: Option<u64>,
    ) -> Result<Vec<Row>, StoreError> {
        self.check(table)?;
        self.inner.select(table, filter, order, limit).await
    }

    async fn insert(&self, table: &str, rows: Vec<Fields>) -> Result<Vec<Row>, StoreError> {
        self.check(table)?;
        self.inner.insert(table, rows).await
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        fields: Fields,
    ) -> Result<u64, StoreError> {
        self.check(table)?;
        self.inner.update(table, filter, fields).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        self.check(table)?;
        self.inner.delete(table, filter).await
    }
}
