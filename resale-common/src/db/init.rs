//! Database initialization
//!
//! Creates the SQLite database on first run, applies connection pragmas,
//! creates every table idempotently and seeds default settings.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Default ARCHIVE subtiers seeded into the `archive_subtiers` setting
pub const DEFAULT_ARCHIVE_SUBTIERS: &str = r#"[
{"id":"military","display_name":"MILITARY ARCHIVE"},
{"id":"workwear","display_name":"WORKWEAR ARCHIVE"},
{"id":"outdoor","display_name":"OUTDOOR ARCHIVE"},
{"id":"japanese","display_name":"JAPANESE ARCHIVE"},
{"id":"heritage_europe","display_name":"HERITAGE EUROPE"},
{"id":"british","display_name":"BRITISH ARCHIVE"},
{"id":"unisex","display_name":"UNISEX ARCHIVE"}
]"#;

/// Open (creating if needed) the database and bring the schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed default settings (idempotent)
///
/// Exposed separately from [`init_database`] so tests can run it against an
/// in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_items_table(pool).await?;
    create_audit_tables(pool).await?;

    init_default_settings(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores operator-tunable parameters as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the catalog items table
///
/// `tier`/`subtier` hold the durable placement; NULL tier means the
/// lifecycle stage decides. A subtier is only legal for ARCHIVE.
pub async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            brand TEXT NOT NULL DEFAULT '',
            brand_tier TEXT,
            sell_price INTEGER NOT NULL DEFAULT 0,
            condition_grade TEXT,
            registration_date TEXT,
            lifecycle_anchor TEXT,
            thumbnail_url TEXT,
            tier TEXT CHECK (tier IS NULL OR tier IN ('NEW', 'CURATED', 'ARCHIVE', 'CLEARANCE', 'CLEARANCE_DISPOSE')),
            subtier TEXT,
            manual_override INTEGER NOT NULL DEFAULT 0,
            suggested_subtier TEXT,
            suggestion_confidence INTEGER CHECK (suggestion_confidence IS NULL OR (suggestion_confidence >= 0 AND suggestion_confidence <= 100)),
            detail_name TEXT,
            detail_image_url TEXT,
            detail_content TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (subtier IS NULL OR tier = 'ARCHIVE')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_tier ON items(tier, subtier)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the audit tables
///
/// `audit_checks` records when every item was last checked (drives the
/// freshness skip); `audit_findings` only holds items with issues.
pub async fn create_audit_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_checks (
            item_id INTEGER PRIMARY KEY REFERENCES items(id),
            checked_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_findings (
            item_id INTEGER PRIMARY KEY REFERENCES items(id),
            issues TEXT NOT NULL,
            checked_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or repair default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Lifecycle thresholds (days since registration)
    ensure_setting(pool, "lifecycle_new_days", "30").await?;
    ensure_setting(pool, "lifecycle_curated_days", "60").await?;
    ensure_setting(pool, "lifecycle_archive_days", "150").await?;

    // Discount rates (percent) per tier
    ensure_setting(pool, "discount_new_pct", "0").await?;
    ensure_setting(pool, "discount_curated_pct", "20").await?;
    ensure_setting(pool, "discount_archive_pct", "20").await?;
    ensure_setting(pool, "discount_clearance_pct", "20").await?;
    ensure_setting(pool, "discount_clearance_dispose_pct", "20").await?;

    // Rebalance
    ensure_setting(pool, "tier_capacity_default", "200").await?;
    ensure_setting(pool, "clearance_dispose_after_days", "120").await?;
    ensure_setting(pool, "subtier_suggestion_min_confidence", "70").await?;
    ensure_setting(pool, "archive_subtiers", DEFAULT_ARCHIVE_SUBTIERS).await?;

    // Audit scan
    ensure_setting(pool, "audit_batch_size", "150").await?;
    ensure_setting(pool, "audit_freshness_hours", "24").await?;
    ensure_setting(pool, "audit_probe_timeout_ms", "5000").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Insert a setting if missing, or reset it if its value is NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
