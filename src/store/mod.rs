//! Record store abstraction.
//!
//! All persistence goes through the narrow [`RecordStore`] trait: filtered
//! select, insert, update, and delete against a named table. The production
//! backend is Postgres ([`postgres::PostgresStore`]); tests and local
//! development use [`memory::MemoryStore`]. Rows are read back as plain JSON
//! objects; writes carry typed [`FieldValue`]s so backends can bind
//! parameters with the correct database types.
//!
//! Row-level atomicity (a `deleted_at` overwrite, an audit append) is
//! delegated to the backend's own transactional guarantees; nothing in this
//! crate implements its own locking.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A row as returned by the store: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Columns to write, in declaration order.
pub type Fields = Vec<(&'static str, FieldValue)>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A row came back in a shape we could not decode.
    #[error("failed to decode row from {table}: {message}")]
    Decode { table: String, message: String },
}

/// A typed value for writes and filter comparisons.
///
/// Reads come back as JSON; writes are typed so the Postgres backend can
/// bind e.g. a `timestamptz` instead of text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    TextArray(Vec<String>),
}

impl FieldValue {
    /// JSON representation, as a backend storing raw JSON rows would persist
    /// it. Timestamps serialize as RFC 3339 with microsecond precision, the
    /// same shape the hosted backend returns.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Value::from(*f),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Timestamp(ts) => serde_json::Value::String(
                ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            ),
            FieldValue::Json(v) => v.clone(),
            FieldValue::TextArray(items) => {
                serde_json::Value::Array(items.iter().cloned().map(Into::into).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Json(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::TextArray(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => FieldValue::Null,
        }
    }
}

/// One filter condition. Conditions within a [`Filter`] are ANDed.
#[derive(Debug, Clone)]
pub enum Cond {
    Eq(&'static str, FieldValue),
    In(&'static str, Vec<FieldValue>),
    IsNull(&'static str),
    NotNull(&'static str),
    Lt(&'static str, FieldValue),
}

/// Conjunction of conditions on a single table.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conds: Vec<Cond>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a primary-key match.
    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }

    /// Shorthand for a primary-key set match.
    pub fn by_ids(ids: &[String]) -> Self {
        Self::new().is_in("id", ids.iter().map(|id| id.as_str().into()).collect())
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.conds.push(Cond::Eq(column, value.into()));
        self
    }

    /// `column IN (values)`. An empty set matches nothing.
    pub fn is_in(mut self, column: &'static str, values: Vec<FieldValue>) -> Self {
        self.conds.push(Cond::In(column, values));
        self
    }

    pub fn is_null(mut self, column: &'static str) -> Self {
        self.conds.push(Cond::IsNull(column));
        self
    }

    pub fn not_null(mut self, column: &'static str) -> Self {
        self.conds.push(Cond::NotNull(column));
        self
    }

    /// Strict less-than comparison.
    pub fn lt(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.conds.push(Cond::Lt(column, value.into()));
        self
    }

    pub fn conds(&self) -> &[Cond] {
        &self.conds
    }

    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }
}

/// Result ordering on a single column.
#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// The narrow persistence contract the core consumes.
///
/// `delete` returns the removed rows (the lifecycle manager needs the
/// pre-deletion display name for its audit entries, and the sweeper needs
/// the removed ids).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
        limit: Option<u64>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Insert rows, returning them as stored (ids and defaults filled in).
    async fn insert(&self, table: &str, rows: Vec<Fields>) -> Result<Vec<Row>, StoreError>;

    /// Update matching rows, returning the affected row count.
    async fn update(&self, table: &str, filter: &Filter, fields: Fields)
        -> Result<u64, StoreError>;

    /// Delete matching rows, returning the removed rows.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;
}

/// Optional post-mutation notification sink.
///
/// The presentation layer uses this to refresh views after a successful
/// mutation. Delivery is best-effort; nothing in the core depends on a
/// notification arriving or being subscribed.
pub trait ChangeNotifier: Send + Sync {
    fn record_changed(&self, table: &str);
}
