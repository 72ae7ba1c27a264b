//! Product catalog service.
//!
//! Create/update/list plus the bulk operations the admin product table
//! offers: duplicate-as-draft, import of pre-parsed rows, publish/unpublish
//! by selection. Deletion is always a soft delete through the trash
//! lifecycle.

use super::{slug_in_use, slugify};
use crate::error::{Error, Result};
use crate::registry::EntityType;
use crate::store::{FieldValue, Fields, Filter, Order, RecordStore, Row, StoreError};
use crate::trash::{Actor, TrashManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const TABLE: &str = "products";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[default]
    Simple,
    Variable,
    /// Grouped products carry no price of their own; it aggregates from
    /// the children.
    Grouped,
    Bundle,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Simple => "simple",
            ProductType::Variable => "variable",
            ProductType::Grouped => "grouped",
            ProductType::Bundle => "bundle",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_low_stock() -> i64 {
    10
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub compare_at_price: Option<f64>,
    #[serde(default)]
    pub cost_price: Option<f64>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Vec<String>,
    #[serde(default)]
    pub publish_at: Option<DateTime<Utc>>,
    #[serde(default = "default_low_stock")]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub product_type: ProductType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Payload for creating a product. The slug is derived from the name.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default)]
pub struct NewProduct {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub cost_price: Option<f64>,
    #[validate(range(min = 0, message = "quantity cannot be negative"))]
    pub quantity: i64,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub description: Option<String>,
    pub barcode: Option<String>,
    pub weight: Option<f64>,
    pub dimensions: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Vec<String>,
    pub publish_at: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "low stock threshold cannot be negative"))]
    pub low_stock_threshold: i64,
    pub brand: Option<String>,
    pub product_type: ProductType,
}

impl Default for NewProduct {
    fn default() -> Self {
        Self {
            name: String::new(),
            sku: None,
            price: 0.0,
            compare_at_price: None,
            cost_price: None,
            quantity: 0,
            category: None,
            category_id: None,
            images: Vec::new(),
            is_active: true,
            is_featured: false,
            description: None,
            barcode: None,
            weight: None,
            dimensions: None,
            tags: Vec::new(),
            meta_title: None,
            meta_description: None,
            meta_keywords: Vec::new(),
            publish_at: None,
            low_stock_threshold: 10,
            brand: None,
            product_type: ProductType::Simple,
        }
    }
}

/// Partial update. `None` fields are left unchanged; the slug is never
/// rewritten on update.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub compare_at_price: Option<f64>,
    pub cost_price: Option<f64>,
    pub quantity: Option<i64>,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub description: Option<String>,
    pub barcode: Option<String>,
    pub weight: Option<f64>,
    pub dimensions: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<Vec<String>>,
    pub publish_at: Option<DateTime<Utc>>,
    pub low_stock_threshold: Option<i64>,
    pub brand: Option<String>,
    pub product_type: Option<ProductType>,
}

/// One pre-parsed import row. Tokenizing the CSV itself happens upstream;
/// this service only validates and persists the parsed records.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductImport {
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub quantity: i64,
    pub category: Option<String>,
    pub images: Vec<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

pub struct ProductCatalog {
    store: Arc<dyn RecordStore>,
    trash: TrashManager,
}

fn decode(row: Row) -> Result<Product> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
        Error::Store(StoreError::Decode {
            table: TABLE.to_owned(),
            message: e.to_string(),
        })
    })
}

fn validate_price(price: f64, product_type: ProductType) -> Result<()> {
    if product_type != ProductType::Grouped && price <= 0.0 {
        return Err(Error::validation("price must be greater than zero"));
    }
    Ok(())
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn RecordStore>, trash: TrashManager) -> Self {
        Self { store, trash }
    }

    /// Live products, newest first. `include_deleted` adds trashed rows for
    /// admin views that show them inline.
    pub async fn list(&self, include_deleted: bool) -> Result<Vec<Product>> {
        let mut filter = Filter::new();
        if !include_deleted {
            filter = filter.is_null("deleted_at");
        }
        let rows = self
            .store
            .select(TABLE, &filter, Some(Order::desc("created_at")), None)
            .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Product> {
        let rows = self
            .store
            .select(TABLE, &Filter::by_id(id), None, Some(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("product", id))?;
        decode(row)
    }

    pub async fn create(&self, input: NewProduct) -> Result<Product> {
        input.validate()?;
        validate_price(input.price, input.product_type)?;

        let slug = slugify(&input.name);
        if slug.is_empty() {
            return Err(Error::validation("name must contain letters or digits"));
        }
        if slug_in_use(self.store.as_ref(), TABLE, &slug, None).await? {
            return Err(Error::validation(format!("slug '{}' already exists", slug)));
        }

        let now = Utc::now();
        let fields = build_fields(&input, &slug, now);
        let rows = self.store.insert(TABLE, vec![fields]).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store(StoreError::Backend("insert returned no row".into())))?;
        decode(row)
    }

    pub async fn update(&self, id: &str, update: ProductUpdate) -> Result<Product> {
        let current = self.get(id).await?;

        let effective_type = update.product_type.unwrap_or(current.product_type);
        let effective_price = update.price.unwrap_or(current.price);
        validate_price(effective_price, effective_type)?;
        if let Some(quantity) = update.quantity {
            if quantity < 0 {
                return Err(Error::validation("quantity cannot be negative"));
            }
        }
        if let Some(name) = &update.name {
            if name.is_empty() {
                return Err(Error::validation("name is required"));
            }
        }

        let mut fields: Fields = Vec::new();
        push_opt(&mut fields, "name", update.name);
        push_opt(&mut fields, "sku", update.sku);
        push_opt(&mut fields, "price", update.price);
        push_opt(&mut fields, "compare_at_price", update.compare_at_price);
        push_opt(&mut fields, "cost_price", update.cost_price);
        push_opt(&mut fields, "quantity", update.quantity);
        push_opt(&mut fields, "category", update.category);
        push_opt(&mut fields, "category_id", update.category_id);
        push_opt(&mut fields, "images", update.images);
        push_opt(&mut fields, "is_active", update.is_active);
        push_opt(&mut fields, "is_featured", update.is_featured);
        push_opt(&mut fields, "description", update.description);
        push_opt(&mut fields, "barcode", update.barcode);
        push_opt(&mut fields, "weight", update.weight);
        push_opt(&mut fields, "dimensions", update.dimensions);
        push_opt(&mut fields, "tags", update.tags);
        push_opt(&mut fields, "meta_title", update.meta_title);
        push_opt(&mut fields, "meta_description", update.meta_description);
        push_opt(&mut fields, "meta_keywords", update.meta_keywords);
        push_opt(&mut fields, "publish_at", update.publish_at);
        push_opt(&mut fields, "low_stock_threshold", update.low_stock_threshold);
        push_opt(&mut fields, "brand", update.brand);
        if let Some(product_type) = update.product_type {
            fields.push(("product_type", product_type.as_str().into()));
        }
        if fields.is_empty() {
            return Ok(current);
        }
        fields.push(("updated_at", Utc::now().into()));

        self.store.update(TABLE, &Filter::by_id(id), fields).await?;
        self.get(id).await
    }

    /// Move a product to the trash. Never issues a raw delete.
    pub async fn delete(&self, id: &str, actor: Option<&Actor>) -> Result<()> {
        self.trash.trash(EntityType::Product, id, actor).await
    }

    /// Clone a product as an inactive draft: " (Copy)" name, `-COPY` sku,
    /// barcode cleared.
    pub async fn duplicate(&self, id: &str) -> Result<Product> {
        let source = self.get(id).await?;
        let copy = NewProduct {
            name: format!("{} (Copy)", source.name),
            sku: source.sku.map(|sku| format!("{}-COPY", sku)),
            price: source.price,
            compare_at_price: source.compare_at_price,
            cost_price: source.cost_price,
            quantity: source.quantity,
            category: source.category,
            category_id: source.category_id,
            images: source.images,
            is_active: false,
            is_featured: false,
            description: source.description,
            barcode: None,
            weight: source.weight,
            dimensions: source.dimensions,
            tags: source.tags,
            meta_title: source.meta_title,
            meta_description: source.meta_description,
            meta_keywords: source.meta_keywords,
            publish_at: None,
            low_stock_threshold: source.low_stock_threshold,
            brand: source.brand,
            product_type: source.product_type,
        };
        self.create(copy).await
    }

    /// Import pre-parsed rows. Rows that fail validation (bad price,
    /// duplicate slug) are logged and skipped; returns the number imported.
    pub async fn bulk_import(&self, rows: Vec<ProductImport>) -> Result<usize> {
        let mut imported = 0;
        for row in rows {
            let input = NewProduct {
                name: row.name.clone(),
                sku: row.sku,
                price: row.price,
                compare_at_price: row.compare_at_price,
                quantity: row.quantity,
                category: row.category,
                images: row.images,
                is_active: row.is_active.unwrap_or(true),
                description: row.description,
                ..NewProduct::default()
            };
            match self.create(input).await {
                Ok(_) => imported += 1,
                Err(e) if e.is_validation() => {
                    log::warn!("skipping import row '{}': {}", row.name, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(imported)
    }

    /// Publish or unpublish a selection in one batched update. Returns the
    /// affected row count.
    pub async fn bulk_set_active(&self, ids: &[String], active: bool) -> Result<u64> {
        let affected = self
            .store
            .update(
                TABLE,
                &Filter::by_ids(ids),
                vec![("is_active", active.into()), ("updated_at", Utc::now().into())],
            )
            .await?;
        Ok(affected)
    }
}

fn push_opt(fields: &mut Fields, column: &'static str, value: Option<impl Into<FieldValue>>) {
    if let Some(value) = value {
        fields.push((column, value.into()));
    }
}

fn build_fields(input: &NewProduct, slug: &str, now: DateTime<Utc>) -> Fields {
    vec![
        ("name", input.name.as_str().into()),
        ("slug", slug.into()),
        ("sku", input.sku.clone().into()),
        ("price", input.price.into()),
        ("compare_at_price", input.compare_at_price.into()),
        ("cost_price", input.cost_price.into()),
        ("quantity", input.quantity.into()),
        ("category", input.category.clone().into()),
        ("category_id", input.category_id.clone().into()),
        ("images", input.images.clone().into()),
        ("is_active", input.is_active.into()),
        ("is_featured", input.is_featured.into()),
        ("description", input.description.clone().into()),
        ("barcode", input.barcode.clone().into()),
        ("weight", input.weight.into()),
        ("dimensions", input.dimensions.clone().into()),
        ("tags", input.tags.clone().into()),
        ("meta_title", input.meta_title.clone().into()),
        ("meta_description", input.meta_description.clone().into()),
        ("meta_keywords", input.meta_keywords.clone().into()),
        ("publish_at", input.publish_at.into()),
        ("low_stock_threshold", input.low_stock_threshold.into()),
        ("brand", input.brand.clone().into()),
        ("product_type", input.product_type.as_str().into()),
        ("created_at", now.into()),
        ("updated_at", now.into()),
    ]
}
