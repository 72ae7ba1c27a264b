//! Static registry of trashable entity types.
//!
//! Every soft-deletable table is described by one [`EntityConfig`] row:
//! the table name, the column used as a human-readable display name, and
//! the extra columns surfaced in trash listings for context. Adding a new
//! trashable entity requires a new enum variant and config here plus a
//! `deleted_at` column in the database; the lifecycle manager and sweeper
//! pick it up through [`EntityType::ALL`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of entity types participating in the trash lifecycle.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Product,
    Order,
    Brand,
    Category,
    Coupon,
}

/// Per-type configuration. Pure data; no behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityConfig {
    /// Underlying table name.
    pub table: &'static str,
    /// Column holding the display name snapshotted into audit entries.
    pub name_column: &'static str,
    /// Columns surfaced in trash listings for context only. Never consulted
    /// by lifecycle logic.
    pub extra_columns: &'static [&'static str],
}

static PRODUCT: EntityConfig = EntityConfig {
    table: "products",
    name_column: "name",
    extra_columns: &["sku", "price", "quantity", "category", "images"],
};

static ORDER: EntityConfig = EntityConfig {
    table: "orders",
    name_column: "order_number",
    extra_columns: &["total_amount", "status", "payment_status"],
};

static BRAND: EntityConfig = EntityConfig {
    table: "brands",
    name_column: "name",
    extra_columns: &["slug", "logo_url"],
};

static CATEGORY: EntityConfig = EntityConfig {
    table: "categories",
    name_column: "name",
    extra_columns: &["slug", "image_url"],
};

static COUPON: EntityConfig = EntityConfig {
    table: "coupons",
    name_column: "code",
    extra_columns: &["discount_type", "discount_value", "is_active"],
};

impl EntityType {
    /// Every registered entity type, in sweep/fan-out order.
    pub const ALL: [EntityType; 5] = [
        EntityType::Product,
        EntityType::Order,
        EntityType::Brand,
        EntityType::Category,
        EntityType::Coupon,
    ];

    /// Registry lookup. Exhaustive over the closed enumeration.
    pub fn config(self) -> &'static EntityConfig {
        match self {
            EntityType::Product => &PRODUCT,
            EntityType::Order => &ORDER,
            EntityType::Brand => &BRAND,
            EntityType::Category => &CATEGORY,
            EntityType::Coupon => &COUPON,
        }
    }

    /// Wire/log representation.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Order => "order",
            EntityType::Brand => "brand",
            EntityType::Category => "category",
            EntityType::Coupon => "coupon",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(EntityType::Product),
            "order" => Ok(EntityType::Order),
            "brand" => Ok(EntityType::Brand),
            "category" => Ok(EntityType::Category),
            "coupon" => Ok(EntityType::Coupon),
            other => Err(crate::error::Error::validation(format!(
                "unknown entity type: {}",
                other
            ))),
        }
    }
}
