//! Brand catalog service.

use super::{slug_in_use, slugify};
use crate::error::{Error, Result};
use crate::registry::EntityType;
use crate::store::{Fields, Filter, Order, RecordStore, Row, StoreError};
use crate::trash::{Actor, TrashManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

const TABLE: &str = "brands";

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Number of products naming this brand; filled by [`BrandCatalog::list`],
    /// not a stored column.
    #[serde(default)]
    pub product_count: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewBrand {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    /// Explicit slug; derived from the name when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "logo_url must be a valid URL"))]
    pub logo_url: Option<String>,
    #[validate(url(message = "website_url must be a valid URL"))]
    pub website_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BrandUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub website_url: Option<String>,
    pub is_active: Option<bool>,
}

pub struct BrandCatalog {
    store: Arc<dyn RecordStore>,
    trash: TrashManager,
}

fn decode(row: Row) -> Result<Brand> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
        Error::Store(StoreError::Decode {
            table: TABLE.to_owned(),
            message: e.to_string(),
        })
    })
}

impl BrandCatalog {
    pub fn new(store: Arc<dyn RecordStore>, trash: TrashManager) -> Self {
        Self { store, trash }
    }

    /// Live brands, newest first, each with its product count.
    pub async fn list(&self) -> Result<Vec<Brand>> {
        let rows = self
            .store
            .select(
                TABLE,
                &Filter::new().is_null("deleted_at"),
                Some(Order::desc("created_at")),
                None,
            )
            .await?;

        // Products reference brands by name.
        let mut counts: HashMap<String, i64> = HashMap::new();
        match self
            .store
            .select("products", &Filter::new(), None, None)
            .await
        {
            Ok(products) => {
                for product in &products {
                    if let Some(brand) = product.get("brand").and_then(|v| v.as_str()) {
                        *counts.entry(brand.to_owned()).or_insert(0) += 1;
                    }
                }
            }
            Err(e) => log::warn!("failed to compute brand product counts: {}", e),
        }

        let mut brands = Vec::with_capacity(rows.len());
        for row in rows {
            let mut brand = decode(row)?;
            brand.product_count = Some(counts.get(&brand.name).copied().unwrap_or(0));
            brands.push(brand);
        }
        Ok(brands)
    }

    pub async fn get(&self, id: &str) -> Result<Brand> {
        let rows = self
            .store
            .select(TABLE, &Filter::by_id(id), None, Some(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("brand", id))?;
        decode(row)
    }

    pub async fn create(&self, input: NewBrand) -> Result<Brand> {
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

        let now = Utc::now();
        let fields: Fields = vec![
            ("name", input.name.as_str().into()),
            ("slug", slug.into()),
            ("description", input.description.into()),
            ("logo_url", input.logo_url.into()),
            ("website_url", input.website_url.into()),
            ("is_active", input.is_active.unwrap_or(true).into()),
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

    pub async fn update(&self, id: &str, update: BrandUpdate) -> Result<Brand> {
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
        if let Some(logo_url) = update.logo_url {
            fields.push(("logo_url", logo_url.into()));
        }
        if let Some(website_url) = update.website_url {
            fields.push(("website_url", website_url.into()));
        }
        if let Some(is_active) = update.is_active {
            fields.push(("is_active", is_active.into()));
        }
        if fields.is_empty() {
            return self.get(id).await;
        }
        fields.push(("updated_at", Utc::now().into()));

        self.store.update(TABLE, &Filter::by_id(id), fields).await?;
        self.get(id).await
    }

    /// Move a brand to the trash. Its slug becomes reusable immediately.
    pub async fn delete(&self, id: &str, actor: Option<&Actor>) -> Result<()> {
        self.trash.trash(EntityType::Brand, id, actor).await
    }
}
