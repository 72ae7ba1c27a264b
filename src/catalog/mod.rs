//! Catalog CRUD services.
//!
//! Products, brands, and categories share the same rules: slugs are derived
//! from names, slug uniqueness is checked against **live** rows only (a
//! trashed row's slug is free for reuse), and deletion always goes through
//! the trash lifecycle rather than removing rows.

pub mod brands;
pub mod categories;
pub mod homepage;
pub mod products;

use crate::error::Result;
use crate::store::{Filter, RecordStore};

/// Derive a URL slug from a display name: lowercase, runs of
/// non-alphanumeric characters collapsed to a single hyphen, trimmed of
/// leading and trailing hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Whether `slug` is already taken by a live row in `table`. Trashed rows
/// never block reuse. `exclude_id` skips the row being updated.
pub(crate) async fn slug_in_use(
    store: &dyn RecordStore,
    table: &'static str,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool> {
    let rows = store
        .select(
            table,
            &Filter::new().eq("slug", slug).is_null("deleted_at"),
            None,
            None,
        )
        .await?;
    Ok(rows.iter().any(|row| {
        let id = row.get("id").and_then(|v| v.as_str());
        exclude_id.is_none() || id != exclude_id
    }))
}
