//! Category catalog service.
//!
//! Categories form a two-level hierarchy through `parent_id`. A category can
//! never be its own parent, and a category with live children cannot be
//! trashed until the children are moved or trashed first.

use super::{slug_in_use, slugify};
use crate::error::{Error, Result};
use crate::registry::EntityType;
use crate::store::{FieldValue, Fields, Filter, Order, RecordStore, Row, StoreError};
use crate::trash::{Actor, TrashManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const TABLE: &str = "categories";

fn default_status() -> String {
    "active".to_owned()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewCategory {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    /// Explicit slug; derived from the name when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<String>,
    pub status: Option<String>,
}

/// Partial update. `parent_id` uses a nested option: `None` leaves the
/// parent unchanged, `Some(None)` moves the category to the top level.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub status: Option<String>,
}

pub struct CategoryCatalog {
    store: Arc<dyn RecordStore>,
    trash: TrashManager,
}

fn decode(row: Row) -> Result<Category> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
        Error::Store(StoreError::Decode {
            table: TABLE.to_owned(),
            message: e.to_string(),
        })
    })
}

impl CategoryCatalog {
    pub fn new(store: Arc<dyn RecordStore>, trash: TrashManager) -> Self {
        Self { store, trash }
    }

    /// Live categories, newest first.
    pub async fn list(&self) -> Result<Vec<Category>> {
        let rows = self
            .store
            .select(
                TABLE,
                &Filter::new().is_null("deleted_at"),
                Some(Order::desc("created_at")),
                None,
            )
            .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Category> {
        let rows = self
            .store
            .select(TABLE, &Filter::by_id(id), None, Some(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("category", id))?;
        decode(row)
    }

    /// Live direct children of a category.
    pub async fn live_children(&self, id: &str) -> Result<Vec<Category>> {
        let rows = self
            .store
            .select(
                TABLE,
                &Filter::new().eq("parent_id", id).is_null("deleted_at"),
                Some(Order::asc("name")),
                None,
            )
            .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn create(&self, input: NewCategory) -> Result<Category> {
        input.validate()?;
        let slug = match input.slug.as_deref().filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_owned(),
            None => slugify(&input.name),
        };
        if slug.is_empty() {
            return Err(Error::validation("name must contain letters or digits"));
        }
        if slug_in_use(self.store.as_ref(), TABLE, &slug, None).await? {
            return Err(Error::validation(format!("slug '{}' already exists", slug)));
        }
        if let Some(parent_id) = &input.parent_id {
            self.require_live_parent(parent_id).await?;
        }

        let now = Utc::now();
        let fields: Fields = vec![
            ("name", input.name.as_str().into()),
            ("slug", slug.into()),
            ("description", input.description.into()),
            ("image_url", input.image_url.into()),
            ("parent_id", input.parent_id.into()),
            ("status", input.status.unwrap_or_else(default_status).into()),
            ("created_at", now.into()),
            ("updated_at", now.into()),
        ];
        let rows = self.store.insert(TABLE, vec![fields]).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store(StoreError::Backend("insert returned no row".into())))?;
        decode(row)
    }

    pub async fn update(&self, id: &str, update: CategoryUpdate) -> Result<Category> {
        if let Some(name) = &update.name {
            if name.is_empty() {
                return Err(Error::validation("name is required"));
            }
        }
        if let Some(slug) = &update.slug {
            if slug.is_empty() {
                return Err(Error::validation("slug cannot be empty"));
            }
            if slug_in_use(self.store.as_ref(), TABLE, slug, Some(id)).await? {
                return Err(Error::validation(format!("slug '{}' already exists", slug)));
            }
        }
        if let Some(Some(parent_id)) = &update.parent_id {
            if parent_id == id {
                return Err(Error::validation("a category cannot be its own parent"));
            }
            self.require_live_parent(parent_id).await?;
        }

        let mut fields: Fields = Vec::new();
        if let Some(name) = update.name {
            fields.push(("name", name.into()));
        }
        if let Some(slug) = update.slug {
            fields.push(("slug", slug.into()));
        }
        if let Some(description) = update.description {
            fields.push(("description", description.into()));
        }
        if let Some(image_url) = update.image_url {
            fields.push(("image_url", image_url.into()));
        }
        if let Some(parent_id) = update.parent_id {
            fields.push((
                "parent_id",
                parent_id.map(FieldValue::Text).unwrap_or(FieldValue::Null),
            ));
        }
        if let Some(status) = update.status {
            fields.push(("status", status.into()));
        }
        if fields.is_empty() {
            return self.get(id).await;
        }
        fields.push(("updated_at", Utc::now().into()));

        self.store.update(TABLE, &Filter::by_id(id), fields).await?;
        self.get(id).await
    }

    /// Move a category to the trash. Refused while live children exist;
    /// nothing is mutated on refusal.
    pub async fn delete(&self, id: &str, actor: Option<&Actor>) -> Result<()> {
        let children = self.live_children(id).await?;
        if !children.is_empty() {
            return Err(Error::validation(
                "category has live subcategories; move or delete them first",
            ));
        }
        self.trash.trash(EntityType::Category, id, actor).await
    }

    async fn require_live_parent(&self, parent_id: &str) -> Result<()> {
        let parent = self.get(parent_id).await?;
        if parent.deleted_at.is_some() {
            return Err(Error::validation("parent category is in the trash"));
        }
        Ok(())
    }
}
