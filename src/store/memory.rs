//! In-memory record store.
//!
//! Backs tests and local development with the same contract as the Postgres
//! store. Rows live in per-table vectors in insertion order, so sorts are
//! stable: entries with equal timestamps come back in call order, matching
//! how an append-ordered table reads.

use super::{Cond, FieldValue, Fields, Filter, Order, RecordStore, Row, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;

/// Thread-safe in-memory table store keyed by table name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total row count for a table. Test convenience.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_null(row: &Row, column: &str) -> bool {
    matches!(row.get(column), None | Some(serde_json::Value::Null))
}

fn matches_eq(row: &Row, column: &str, value: &FieldValue) -> bool {
    let Some(actual) = row.get(column) else {
        return matches!(value, FieldValue::Null);
    };
    if let FieldValue::Timestamp(expected) = value {
        return parse_timestamp(actual).map(|ts| ts == *expected).unwrap_or(false);
    }
    *actual == value.to_json()
}

fn matches_lt(row: &Row, column: &str, value: &FieldValue) -> bool {
    let Some(actual) = row.get(column) else {
        return false;
    };
    match value {
        FieldValue::Timestamp(cutoff) => parse_timestamp(actual)
            .map(|ts| ts < *cutoff)
            .unwrap_or(false),
        FieldValue::Int(n) => actual.as_i64().map(|a| a < *n).unwrap_or(false),
        FieldValue::Float(n) => actual.as_f64().map(|a| a < *n).unwrap_or(false),
        FieldValue::Text(s) => actual.as_str().map(|a| a < s.as_str()).unwrap_or(false),
        _ => false,
    }
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    filter.conds().iter().all(|cond| match cond {
        Cond::Eq(column, value) => matches_eq(row, column, value),
        Cond::In(column, values) => values.iter().any(|v| matches_eq(row, column, v)),
        Cond::IsNull(column) => is_null(row, column),
        Cond::NotNull(column) => !is_null(row, column),
        Cond::Lt(column, value) => matches_lt(row, column, value),
    })
}

/// Column comparison for sorting: timestamps by instant when both sides
/// parse, otherwise numbers, otherwise strings. Nulls sort first.
fn compare_column(a: &Row, b: &Row, column: &str) -> Ordering {
    let (va, vb) = (a.get(column), b.get(column));
    match (va, vb) {
        (None | Some(serde_json::Value::Null), None | Some(serde_json::Value::Null)) => {
            Ordering::Equal
        }
        (None | Some(serde_json::Value::Null), _) => Ordering::Less,
        (_, None | Some(serde_json::Value::Null)) => Ordering::Greater,
        (Some(va), Some(vb)) => {
            if let (Some(ta), Some(tb)) = (parse_timestamp(va), parse_timestamp(vb)) {
                return ta.cmp(&tb);
            }
            if let (Some(na), Some(nb)) = (va.as_f64(), vb.as_f64()) {
                return na.partial_cmp(&nb).unwrap_or(Ordering::Equal);
            }
            va.as_str().unwrap_or("").cmp(vb.as_str().unwrap_or(""))
        }
    }
}

fn fields_to_row(fields: Fields) -> Row {
    let mut row = Row::new();
    for (column, value) in fields {
        row.insert(column.to_owned(), value.to_json());
    }
    row
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
        limit: Option<u64>,
    ) -> Result<Vec<Row>, StoreError> {
        let mut rows: Vec<Row> = match self.tables.get(table) {
            Some(rows) => rows
                .iter()
                .filter(|row| matches_filter(row, filter))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        if let Some(order) = order {
            // Stable sort keeps insertion order for equal keys.
            rows.sort_by(|a, b| {
                let ordering = compare_column(a, b, order.column);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Fields>) -> Result<Vec<Row>, StoreError> {
        let mut stored = Vec::with_capacity(rows.len());
        let mut entry = self.tables.entry(table.to_owned()).or_default();
        for fields in rows {
            let mut row = fields_to_row(fields);
            if is_null(&row, "id") {
                row.insert(
                    "id".to_owned(),
                    serde_json::Value::String(uuid::Uuid::new_v4().to_string()),
                );
            }
            entry.push(row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        fields: Fields,
    ) -> Result<u64, StoreError> {
        let Some(mut entry) = self.tables.get_mut(table) else {
            return Ok(0);
        };
        let mut affected = 0;
        for row in entry.iter_mut() {
            if matches_filter(row, filter) {
                for (column, value) in &fields {
                    row.insert((*column).to_owned(), value.to_json());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let Some(mut entry) = self.tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let mut removed = Vec::new();
        entry.retain(|row| {
            if matches_filter(row, filter) {
                removed.push(row.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}
