//! Soft-delete lifecycle manager.
//!
//! Every registered entity type shares one trash contract: a nullable
//! `deleted_at` column marks a row trashed, restore clears it, permanent
//! delete removes the row. A row is always in exactly one of three states:
//! live (`deleted_at` null), trashed (`deleted_at` set), or purged (removed,
//! observable only through the audit log).
//!
//! Every restore and every purge appends one entry to the `trash_log` ledger.
//! The ledger is append-only and best-effort relative to the primary state
//! change: a lost log entry is logged for operators and swallowed, a lost
//! restore is an error.

use crate::error::{Error, Result};
use crate::registry::EntityType;
use crate::store::{ChangeNotifier, FieldValue, Fields, Filter, Order, RecordStore, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Append-only audit ledger table.
pub const TRASH_LOG_TABLE: &str = "trash_log";

/// Lifecycle transitions recorded in the trash log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashAction {
    Trashed,
    Restored,
    PermanentlyDeleted,
}

impl TrashAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TrashAction::Trashed => "trashed",
            TrashAction::Restored => "restored",
            TrashAction::PermanentlyDeleted => "permanently_deleted",
        }
    }
}

impl std::fmt::Display for TrashAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a lifecycle action. Both fields are optional;
/// system-initiated actions carry only the "system" email.
#[derive(Clone, Debug, Default)]
pub struct Actor {
    pub id: Option<String>,
    pub email: Option<String>,
}

impl Actor {
    pub fn user(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            email: Some(email.into()),
        }
    }

    /// Actor for unattended jobs.
    pub fn system() -> Self {
        Self {
            id: None,
            email: Some("system".to_owned()),
        }
    }
}

/// A trashed row as shown in the trash view.
#[derive(Clone, Debug, Serialize)]
pub struct TrashedItem {
    pub id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub deleted_at: DateTime<Utc>,
    /// Per-type display attributes (sku/price, order status, ...). Context
    /// only; lifecycle logic never reads these.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One immutable audit record from the trash log.
///
/// `entity_name` is a snapshot taken when the action ran, so it stays
/// meaningful after the row itself is purged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrashLogEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub entity_name: String,
    pub action: String,
    #[serde(default)]
    pub performed_by: Option<String>,
    #[serde(default)]
    pub performed_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entity-type filter for trash listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrashFilter {
    All,
    Only(EntityType),
}

impl TrashFilter {
    fn types(self) -> Vec<EntityType> {
        match self {
            TrashFilter::All => EntityType::ALL.to_vec(),
            TrashFilter::Only(entity) => vec![entity],
        }
    }
}

/// Implements the shared trash/restore/purge contract over the record store.
#[derive(Clone)]
pub struct TrashManager {
    store: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
}

fn row_name(row: &Row, name_column: &str) -> String {
    row.get(name_column)
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| "Unknown".to_owned())
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(|v| v.as_str())
}

impl TrashManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            notifier: None,
        }
    }

    /// Attach an optional post-mutation notification sink. Correctness never
    /// depends on notifications being delivered.
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// All trashed rows for the selected types, newest deletion first.
    ///
    /// Fans out one filtered query per type. A failing type is logged and
    /// skipped rather than failing the whole call; callers get partial
    /// results.
    pub async fn list_trashed(&self, filter: TrashFilter) -> Vec<TrashedItem> {
        let mut items = Vec::new();
        for entity in filter.types() {
            let config = entity.config();
            let rows = match self
                .store
                .select(
                    config.table,
                    &Filter::new().not_null("deleted_at"),
                    Some(Order::desc("deleted_at")),
                    None,
                )
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    log::warn!("failed to list trashed {}: {}", entity, e);
                    continue;
                }
            };

            for row in rows {
                let Some(id) = row_id(&row) else { continue };
                let deleted_at = row
                    .get("deleted_at")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                let Some(deleted_at) = deleted_at else {
                    log::warn!("trashed {} {} has unparsable deleted_at", entity, id);
                    continue;
                };
                let mut extra = serde_json::Map::new();
                for column in config.extra_columns {
                    if let Some(value) = row.get(*column) {
                        extra.insert((*column).to_owned(), value.clone());
                    }
                }
                items.push(TrashedItem {
                    id: id.to_owned(),
                    entity_type: entity,
                    name: row_name(&row, config.name_column),
                    deleted_at,
                    extra,
                });
            }
        }
        items.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        items
    }

    /// Soft-delete one row: set `deleted_at = now()`, then append a
    /// `trashed` log entry. If the update fails no entry is written.
    ///
    /// Re-trashing an already-trashed row is a no-op at the state level but
    /// still appends a log entry; racing calls produce duplicate audit rows
    /// by design.
    pub async fn trash(&self, entity: EntityType, id: &str, actor: Option<&Actor>) -> Result<()> {
        let config = entity.config();
        let name = self.display_name(entity, id).await?;
        self.store
            .update(
                config.table,
                &Filter::by_id(id),
                vec![("deleted_at", Utc::now().into())],
            )
            .await?;
        self.log_action(entity, id, &name, TrashAction::Trashed, actor)
            .await;
        self.notify(config.table);
        Ok(())
    }

    /// Reverse a soft delete: clear `deleted_at`, append a `restored` entry.
    pub async fn restore(&self, entity: EntityType, id: &str, actor: Option<&Actor>) -> Result<()> {
        let config = entity.config();
        let name = self.display_name(entity, id).await?;
        self.store
            .update(
                config.table,
                &Filter::by_id(id),
                vec![("deleted_at", FieldValue::Null)],
            )
            .await?;
        self.log_action(entity, id, &name, TrashAction::Restored, actor)
            .await;
        self.notify(config.table);
        Ok(())
    }

    /// Remove the row entirely. The display name is captured from the
    /// deleted row itself (`DELETE .. RETURNING`), since it no longer exists
    /// when the log entry is appended.
    pub async fn permanent_delete(
        &self,
        entity: EntityType,
        id: &str,
        actor: Option<&Actor>,
    ) -> Result<()> {
        let config = entity.config();
        let removed = self.store.delete(config.table, &Filter::by_id(id)).await?;
        let row = removed
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(entity.as_str(), id))?;
        let name = row_name(&row, config.name_column);
        self.log_action(entity, id, &name, TrashAction::PermanentlyDeleted, actor)
            .await;
        self.notify(config.table);
        Ok(())
    }

    /// Restore a selection spanning entity types.
    ///
    /// Items are grouped per type and restored with one batched update per
    /// group. A failing group contributes nothing to the returned count and
    /// its items stay trashed; other groups proceed. Callers must inspect
    /// the count rather than assume all-or-nothing.
    pub async fn bulk_restore(
        &self,
        items: &[(EntityType, String)],
        actor: Option<&Actor>,
    ) -> usize {
        let mut restored = 0;
        for (entity, ids) in group_by_type(items) {
            let config = entity.config();
            let names = self.snapshot_names(entity, &ids).await;
            match self
                .store
                .update(
                    config.table,
                    &Filter::by_ids(&ids),
                    vec![("deleted_at", FieldValue::Null)],
                )
                .await
            {
                Ok(_) => {
                    restored += ids.len();
                    for id in &ids {
                        let name = names
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| "Unknown".to_owned());
                        self.log_action(entity, id, &name, TrashAction::Restored, actor)
                            .await;
                    }
                    self.notify(config.table);
                }
                Err(e) => log::warn!("bulk restore failed for {}: {}", entity, e),
            }
        }
        restored
    }

    /// Permanently delete a selection spanning entity types. Same grouping
    /// and partial-failure policy as [`bulk_restore`](Self::bulk_restore);
    /// the count reflects rows actually removed.
    pub async fn bulk_permanent_delete(
        &self,
        items: &[(EntityType, String)],
        actor: Option<&Actor>,
    ) -> usize {
        let mut deleted = 0;
        for (entity, ids) in group_by_type(items) {
            let config = entity.config();
            match self.store.delete(config.table, &Filter::by_ids(&ids)).await {
                Ok(removed) => {
                    deleted += removed.len();
                    for row in &removed {
                        let Some(id) = row_id(row) else { continue };
                        let name = row_name(row, config.name_column);
                        self.log_action(entity, id, &name, TrashAction::PermanentlyDeleted, actor)
                            .await;
                    }
                    self.notify(config.table);
                }
                Err(e) => log::warn!("bulk permanent delete failed for {}: {}", entity, e),
            }
        }
        deleted
    }

    /// Most recent audit entries, newest first.
    pub async fn activity_log(&self, limit: u64) -> Result<Vec<TrashLogEntry>> {
        let rows = self
            .store
            .select(
                TRASH_LOG_TABLE,
                &Filter::new(),
                Some(Order::desc("created_at")),
                Some(limit),
            )
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<TrashLogEntry>(serde_json::Value::Object(row)) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("skipping malformed trash log entry: {}", e),
            }
        }
        Ok(entries)
    }

    async fn display_name(&self, entity: EntityType, id: &str) -> Result<String> {
        let config = entity.config();
        let rows = self
            .store
            .select(config.table, &Filter::by_id(id), None, Some(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(entity.as_str(), id))?;
        Ok(row_name(&row, config.name_column))
    }

    /// Display names for a batch, keyed by id. Failures degrade to an empty
    /// map; the restore itself must not be blocked by a failed name read.
    async fn snapshot_names(&self, entity: EntityType, ids: &[String]) -> HashMap<String, String> {
        let config = entity.config();
        match self
            .store
            .select(config.table, &Filter::by_ids(ids), None, None)
            .await
        {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| {
                    Some((row_id(row)?.to_owned(), row_name(row, config.name_column)))
                })
                .collect(),
            Err(e) => {
                log::warn!("failed to snapshot {} names for audit log: {}", entity, e);
                HashMap::new()
            }
        }
    }

    /// Append one audit entry. Failures never surface to the caller and
    /// never roll back the state change that triggered them.
    async fn log_action(
        &self,
        entity: EntityType,
        id: &str,
        name: &str,
        action: TrashAction,
        actor: Option<&Actor>,
    ) {
        let fields: Fields = vec![
            ("entity_type", entity.as_str().into()),
            ("entity_id", id.into()),
            ("entity_name", name.into()),
            ("action", action.as_str().into()),
            ("performed_by", actor.and_then(|a| a.id.clone()).into()),
            (
                "performed_by_email",
                actor.and_then(|a| a.email.clone()).into(),
            ),
            ("created_at", Utc::now().into()),
        ];
        if let Err(e) = self.store.insert(TRASH_LOG_TABLE, vec![fields]).await {
            log::warn!(
                "failed to write trash log entry for {} {}: {}",
                entity,
                id,
                e
            );
        }
    }

    fn notify(&self, table: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.record_changed(table);
        }
    }
}

fn group_by_type(items: &[(EntityType, String)]) -> BTreeMap<EntityType, Vec<String>> {
    let mut grouped: BTreeMap<EntityType, Vec<String>> = BTreeMap::new();
    for (entity, id) in items {
        grouped.entry(*entity).or_default().push(id.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_strings() {
        assert_eq!(TrashAction::Trashed.as_str(), "trashed");
        assert_eq!(TrashAction::Restored.as_str(), "restored");
        assert_eq!(
            TrashAction::PermanentlyDeleted.as_str(),
            "permanently_deleted"
        );
    }

    #[test]
    fn test_system_actor() {
        let actor = Actor::system();
        assert_eq!(actor.id, None);
        assert_eq!(actor.email.as_deref(), Some("system"));
    }

    #[test]
    fn test_group_by_type_preserves_ids() {
        let items = vec![
            (EntityType::Product, "a".to_owned()),
            (EntityType::Brand, "b".to_owned()),
            (EntityType::Product, "c".to_owned()),
        ];
        let grouped = group_by_type(&items);
        assert_eq!(grouped[&EntityType::Product], vec!["a", "c"]);
        assert_eq!(grouped[&EntityType::Brand], vec!["b"]);
    }
}
