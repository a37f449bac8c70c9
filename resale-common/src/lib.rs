//! # Resale Common Library
//!
//! Shared code for the resale tier manager including:
//! - Domain models (tiers, grades, catalog items, move directives, audit findings)
//! - Database initialization and schema
//! - Event types (CatalogEvent) and the broadcast EventBus
//! - Configuration loading and root folder resolution
//! - SSE and time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use models::{
    ArchiveSubtier, AuditFinding, AuditIssue, BrandTier, ConditionGrade, Item, ItemId, ListingDetail,
    MoveDirective, MoveReason, Placement, Tier,
};
