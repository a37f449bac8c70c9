//! Database access for the tier manager
//!
//! Catalog items, operational settings and audit findings all live in the
//! shared `resale.db` created by [`resale_common::db::init_database`].

pub mod findings;
pub mod items;
pub mod settings;

pub use items::SqliteCatalogStore;
