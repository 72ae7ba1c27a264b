//! Postgres-backed record store.
//!
//! Executes parameterized SQL through a `sea_orm::DatabaseConnection`.
//! Reads project each row through `row_to_json` so the caller gets the same
//! JSON object shape the hosted backend serves; deletes and inserts use
//! `RETURNING` to hand back the affected rows in one round trip.

use super::{Cond, FieldValue, Fields, Filter, Order, RecordStore, Row, StoreError};
use async_trait::async_trait;
use sea_orm::sea_query::ArrayType;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement, Value};

pub struct PostgresStore {
    db: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let db = Database::connect(url).await?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn query_rows(&self, table: &str, sql: String, values: Vec<Value>) -> Result<Vec<Row>, StoreError> {
        let results = self
            .db
            .query_all(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
            .await?;

        let mut rows = Vec::with_capacity(results.len());
        for result in results {
            let json: serde_json::Value =
                result.try_get("", "row").map_err(|e| StoreError::Decode {
                    table: table.to_owned(),
                    message: e.to_string(),
                })?;
            match json {
                serde_json::Value::Object(map) => rows.push(map),
                other => {
                    return Err(StoreError::Decode {
                        table: table.to_owned(),
                        message: format!("expected JSON object, got {}", other),
                    })
                }
            }
        }
        Ok(rows)
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        StoreError::Backend(err.to_string())
    }
}

fn bind(value: FieldValue) -> Value {
    match value {
        // Untyped null; only reachable through IN lists, which never carry it.
        FieldValue::Null => Value::String(None),
        FieldValue::Text(s) => s.into(),
        FieldValue::Int(i) => i.into(),
        FieldValue::Float(f) => f.into(),
        FieldValue::Bool(b) => b.into(),
        FieldValue::Timestamp(ts) => ts.into(),
        FieldValue::Json(v) => v.into(),
        FieldValue::TextArray(items) => Value::Array(
            ArrayType::String,
            Some(Box::new(items.into_iter().map(Value::from).collect())),
        ),
    }
}

/// Render the WHERE clause, pushing bind values as it goes. Returns an empty
/// string for an empty filter.
fn render_filter(filter: &Filter, values: &mut Vec<Value>) -> String {
    let mut parts = Vec::with_capacity(filter.conds().len());
    for cond in filter.conds() {
        match cond {
            Cond::Eq(column, FieldValue::Null) => parts.push(format!("{} IS NULL", column)),
            Cond::Eq(column, value) => {
                values.push(bind(value.clone()));
                parts.push(format!("{} = ${}", column, values.len()));
            }
            Cond::In(column, items) => {
                if items.is_empty() {
                    // IN () is invalid SQL; an empty set matches nothing.
                    parts.push("FALSE".to_owned());
                } else {
                    let mut placeholders = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(bind(item.clone()));
                        placeholders.push(format!("${}", values.len()));
                    }
                    parts.push(format!("{} IN ({})", column, placeholders.join(", ")));
                }
            }
            Cond::IsNull(column) => parts.push(format!("{} IS NULL", column)),
            Cond::NotNull(column) => parts.push(format!("{} IS NOT NULL", column)),
            Cond::Lt(column, value) => {
                values.push(bind(value.clone()));
                parts.push(format!("{} < ${}", column, values.len()));
            }
        }
    }
    parts.join(" AND ")
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
        limit: Option<u64>,
    ) -> Result<Vec<Row>, StoreError> {
        let mut values = Vec::new();
        let mut sql = format!("SELECT row_to_json({0}) AS row FROM {0}", table);
        let where_clause = render_filter(filter, &mut values);
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if let Some(order) = order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                order.column,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        self.query_rows(table, sql, values).await
    }

    async fn insert(&self, table: &str, rows: Vec<Fields>) -> Result<Vec<Row>, StoreError> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Vec<&'static str> = first.iter().map(|(column, _)| *column).collect();

        let mut values = Vec::new();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut tuple = Vec::with_capacity(columns.len());
            for column in &columns {
                let field = row
                    .iter()
                    .find(|(c, _)| c == column)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(FieldValue::Null);
                if matches!(field, FieldValue::Null) {
                    tuple.push("NULL".to_owned());
                } else {
                    values.push(bind(field));
                    tuple.push(format!("${}", values.len()));
                }
            }
            tuples.push(format!("({})", tuple.join(", ")));
        }

        let sql = format!(
            "INSERT INTO {0} ({1}) VALUES {2} RETURNING row_to_json({0}) AS row",
            table,
            columns.join(", "),
            tuples.join(", ")
        );
        self.query_rows(table, sql, values).await
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        fields: Fields,
    ) -> Result<u64, StoreError> {
        let mut values = Vec::new();
        let mut assignments = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            if matches!(value, FieldValue::Null) {
                assignments.push(format!("{} = NULL", column));
            } else {
                values.push(bind(value));
                assignments.push(format!("{} = ${}", column, values.len()));
            }
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        let where_clause = render_filter(filter, &mut values);
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }

        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let mut values = Vec::new();
        let mut sql = format!("DELETE FROM {}", table);
        let where_clause = render_filter(filter, &mut values);
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        sql.push_str(&format!(" RETURNING row_to_json({}) AS row", table));
        self.query_rows(table, sql, values).await
    }
}
