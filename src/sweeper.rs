//! Retention sweeper.
//!
//! Stateless scheduled job: rows trashed more than [`RETENTION_DAYS`] ago are
//! permanently removed, one batched delete per registered entity type, and
//! each removal is recorded in the trash log. Safe to re-invoke at any time;
//! a run with no eligible rows removes nothing.
//!
//! The sweep deletes first and logs after, trading audit fidelity (the
//! display name is gone, entries carry the "Auto-cleaned" placeholder) for a
//! single round trip per table. The job runs unattended against potentially
//! large tables and must not hold per-row transactions open.

use crate::registry::EntityType;
use crate::store::{Fields, Filter, RecordStore};
use crate::trash::{TrashAction, TRASH_LOG_TABLE};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Fixed retention window for trashed rows.
pub const RETENTION_DAYS: i64 = 30;

/// Per-type count recorded when the type's batched delete failed.
pub const FAILED_SENTINEL: i64 = -1;

/// Result of one sweep across all registered entity types. The job's only
/// output; intended for operational monitoring.
#[derive(Clone, Debug, Serialize)]
pub struct SweepSummary {
    pub success: bool,
    /// Rows removed per entity type, or [`FAILED_SENTINEL`] where the
    /// type's delete failed.
    pub cleaned: BTreeMap<EntityType, i64>,
}

impl SweepSummary {
    /// Total rows removed across types that succeeded.
    pub fn total_removed(&self) -> i64 {
        self.cleaned.values().filter(|&&c| c >= 0).sum()
    }
}

/// Run one sweep with the default cutoff of now minus [`RETENTION_DAYS`].
pub async fn run(store: &dyn RecordStore) -> SweepSummary {
    run_with_cutoff(store, Utc::now() - Duration::days(RETENTION_DAYS)).await
}

/// Run one sweep removing rows with `deleted_at` strictly before `cutoff`.
///
/// A row trashed exactly at the cutoff is kept. Per-type failures are
/// recorded as the sentinel and do not abort the remaining types.
pub async fn run_with_cutoff(store: &dyn RecordStore, cutoff: DateTime<Utc>) -> SweepSummary {
    let mut cleaned = BTreeMap::new();

    for entity in EntityType::ALL {
        let config = entity.config();
        let filter = Filter::new().not_null("deleted_at").lt("deleted_at", cutoff);

        match store.delete(config.table, &filter).await {
            Ok(removed) => {
                cleaned.insert(entity, removed.len() as i64);
                if removed.is_empty() {
                    continue;
                }
                log::info!("swept {} expired rows from {}", removed.len(), config.table);

                // The rows are already gone, so no richer name is available
                // than the placeholder.
                let now = Utc::now();
                let logs: Vec<Fields> = removed
                    .iter()
                    .filter_map(|row| row.get("id").and_then(|v| v.as_str()))
                    .map(|id| {
                        vec![
                            ("entity_type", entity.as_str().into()),
                            ("entity_id", id.into()),
                            ("entity_name", "Auto-cleaned".into()),
                            ("action", TrashAction::PermanentlyDeleted.as_str().into()),
                            ("performed_by_email", "system".into()),
                            ("created_at", now.into()),
                        ]
                    })
                    .collect();
                if let Err(e) = store.insert(TRASH_LOG_TABLE, logs).await {
                    log::warn!(
                        "failed to write sweep log entries for {}: {}",
                        config.table,
                        e
                    );
                }
            }
            Err(e) => {
                log::error!("sweep failed for {}: {}", config.table, e);
                cleaned.insert(entity, FAILED_SENTINEL);
            }
        }
    }

    SweepSummary {
        success: true,
        cleaned,
    }
}
