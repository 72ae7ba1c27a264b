//! Homepage content sections.
//!
//! Each section is one configurable block of the storefront homepage (hero,
//! featured grid, promo banner, ...) ordered by `sort_order`. Sections are
//! not trashable; deleting one removes the row.

use crate::error::{Error, Result};
use crate::store::{FieldValue, Fields, Filter, Order, RecordStore, Row, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const TABLE: &str = "homepage_sections";

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HomepageSection {
    pub id: String,
    pub section_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub badge_text: Option<String>,
    /// Free-form per-section payload (slides, product ids, CTA links, ...).
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewSection {
    #[validate(length(min = 1, message = "section_type is required"))]
    pub section_type: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub badge_text: Option<String>,
    pub content: Option<serde_json::Value>,
    pub image_url: Option<String>,
    pub is_enabled: Option<bool>,
    pub sort_order: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SectionUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub badge_text: Option<String>,
    pub content: Option<serde_json::Value>,
    pub image_url: Option<String>,
    pub is_enabled: Option<bool>,
    pub sort_order: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct HomepageSections {
    store: Arc<dyn RecordStore>,
}

fn decode(row: Row) -> Result<HomepageSection> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
        Error::Store(StoreError::Decode {
            table: TABLE.to_owned(),
            message: e.to_string(),
        })
    })
}

impl HomepageSections {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All sections in display order.
    pub async fn list(&self) -> Result<Vec<HomepageSection>> {
        let rows = self
            .store
            .select(TABLE, &Filter::new(), Some(Order::asc("sort_order")), None)
            .await?;
        rows.into_iter().map(decode).collect()
    }

    /// First section of a given type, if one exists.
    pub async fn get_by_type(&self, section_type: &str) -> Result<Option<HomepageSection>> {
        let rows = self
            .store
            .select(
                TABLE,
                &Filter::new().eq("section_type", section_type),
                Some(Order::asc("sort_order")),
                Some(1),
            )
            .await?;
        rows.into_iter().next().map(decode).transpose()
    }

    pub async fn create(&self, input: NewSection) -> Result<HomepageSection> {
        input.validate()?;
        let now = Utc::now();
        let fields: Fields = vec![
            ("section_type", input.section_type.as_str().into()),
            ("title", input.title.into()),
            ("subtitle", input.subtitle.into()),
            ("badge_text", input.badge_text.into()),
            (
                "content",
                FieldValue::Json(input.content.unwrap_or_else(|| serde_json::json!({}))),
            ),
            ("image_url", input.image_url.into()),
            ("is_enabled", input.is_enabled.unwrap_or(true).into()),
            ("sort_order", input.sort_order.into()),
            ("starts_at", input.starts_at.into()),
            ("expires_at", input.expires_at.into()),
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

    pub async fn update(&self, id: &str, update: SectionUpdate) -> Result<HomepageSection> {
        let mut fields: Fields = Vec::new();
        if let Some(title) = update.title {
            fields.push(("title", title.into()));
        }
        if let Some(subtitle) = update.subtitle {
            fields.push(("subtitle", subtitle.into()));
        }
        if let Some(badge_text) = update.badge_text {
            fields.push(("badge_text", badge_text.into()));
        }
        if let Some(content) = update.content {
            fields.push(("content", FieldValue::Json(content)));
        }
        if let Some(image_url) = update.image_url {
            fields.push(("image_url", image_url.into()));
        }
        if let Some(is_enabled) = update.is_enabled {
            fields.push(("is_enabled", is_enabled.into()));
        }
        if let Some(sort_order) = update.sort_order {
            fields.push(("sort_order", sort_order.into()));
        }
        if let Some(starts_at) = update.starts_at {
            fields.push(("starts_at", starts_at.into()));
        }
        if let Some(expires_at) = update.expires_at {
            fields.push(("expires_at", expires_at.into()));
        }
        if fields.is_empty() {
            return self.get(id).await;
        }
        fields.push(("updated_at", Utc::now().into()));

        self.store.update(TABLE, &Filter::by_id(id), fields).await?;
        self.get(id).await
    }

    /// Enable or disable a section without touching its content.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<HomepageSection> {
        self.update(
            id,
            SectionUpdate {
                is_enabled: Some(enabled),
                ..SectionUpdate::default()
            },
        )
        .await
    }

    /// Remove a section outright. Sections are not part of the trash
    /// lifecycle.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.delete(TABLE, &Filter::by_id(id)).await?;
        if removed.is_empty() {
            return Err(Error::not_found("homepage section", id));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<HomepageSection> {
        let rows = self
            .store
            .select(TABLE, &Filter::by_id(id), None, Some(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("homepage section", id))?;
        decode(row)
    }
}
