//! Storefront administration core.
//!
//! Catalog CRUD (products, brands, categories), homepage content sections,
//! and the shared soft-delete lifecycle: every registered entity type is
//! trashed by stamping `deleted_at`, restorable until the retention sweeper
//! purges it, with every restore and purge recorded in an append-only
//! `trash_log` ledger.
//!
//! Persistence goes through the [`store::RecordStore`] trait; production
//! runs against Postgres, tests against the in-memory implementation.

pub mod app_config;
pub mod catalog;
pub mod error;
pub mod registry;
pub mod store;
pub mod sweeper;
pub mod trash;

pub use error::{Error, Result};
