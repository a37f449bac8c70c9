//! Settings database operations
//!
//! Typed accessors over the key-value `settings` table. Getters fall back to
//! the compiled default when a key is absent; a present but unparseable value
//! is a configuration error.

use resale_common::{ArchiveSubtier, Error, Placement, Result, Tier};
use sqlx::{Pool, Sqlite};
use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::lifecycle::{DiscountRates, LifecycleConfig, LifecycleThresholds};

pub const DEFAULT_TIER_CAPACITY: usize = 200;

/// Lifecycle thresholds and discount rates, validated
pub async fn get_lifecycle_config(db: &Pool<Sqlite>) -> Result<LifecycleConfig> {
    let defaults = LifecycleConfig::default();
    let thresholds = LifecycleThresholds::new(
        get_setting(db, "lifecycle_new_days").await?.unwrap_or(defaults.thresholds.new_days),
        get_setting(db, "lifecycle_curated_days").await?.unwrap_or(defaults.thresholds.curated_days),
        get_setting(db, "lifecycle_archive_days").await?.unwrap_or(defaults.thresholds.archive_days),
    )?;

    let d = defaults.discounts;
    let discounts = DiscountRates {
        new_pct: get_discount(db, "discount_new_pct", d.new_pct).await?,
        curated_pct: get_discount(db, "discount_curated_pct", d.curated_pct).await?,
        archive_pct: get_discount(db, "discount_archive_pct", d.archive_pct).await?,
        clearance_pct: get_discount(db, "discount_clearance_pct", d.clearance_pct).await?,
        clearance_dispose_pct: get_discount(db, "discount_clearance_dispose_pct", d.clearance_dispose_pct).await?,
    };

    Ok(LifecycleConfig { thresholds, discounts })
}

async fn get_discount(db: &Pool<Sqlite>, key: &str, default: u8) -> Result<u8> {
    let pct = get_setting::<u8>(db, key).await?.unwrap_or(default);
    if pct > 100 {
        return Err(Error::Config(format!("{} must be 0-100, got {}", key, pct)));
    }
    Ok(pct)
}

/// Settings key holding the capacity override of one placement
///
/// `capacity_new`, `capacity_archive` (unassigned pool),
/// `capacity_archive_<subtier>`, ...
pub fn capacity_key(placement: &Placement) -> String {
    match &placement.subtier {
        Some(subtier) => format!("capacity_{}_{}", placement.tier.as_str().to_lowercase(), subtier),
        None => format!("capacity_{}", placement.tier.as_str().to_lowercase()),
    }
}

/// Global capacity applied where no per-placement override exists
///
/// **Default:** 200
pub async fn get_default_tier_capacity(db: &Pool<Sqlite>) -> Result<usize> {
    get_setting(db, "tier_capacity_default").await.map(|opt| opt.unwrap_or(DEFAULT_TIER_CAPACITY))
}

/// Capacity of one placement; `None` for the uncapped terminal tier
pub async fn get_tier_capacity(db: &Pool<Sqlite>, placement: &Placement) -> Result<Option<usize>> {
    if placement.tier.is_terminal() {
        return Ok(None);
    }
    match get_setting::<usize>(db, &capacity_key(placement)).await? {
        Some(capacity) => Ok(Some(capacity)),
        None => get_default_tier_capacity(db).await.map(Some),
    }
}

pub async fn set_tier_capacity(db: &Pool<Sqlite>, placement: &Placement, capacity: usize) -> Result<()> {
    set_setting(db, &capacity_key(placement), capacity).await
}

/// Days in CLEARANCE after which an item is moved to CLEARANCE_DISPOSE
///
/// **Default:** 120
pub async fn get_dispose_after_days(db: &Pool<Sqlite>) -> Result<i64> {
    get_setting(db, "clearance_dispose_after_days").await.map(|opt| opt.unwrap_or(120))
}

/// Minimum classifier confidence for a subtier suggestion to be followed
///
/// **Default:** 70
pub async fn get_suggestion_min_confidence(db: &Pool<Sqlite>) -> Result<u8> {
    get_setting(db, "subtier_suggestion_min_confidence").await.map(|opt| opt.unwrap_or(70))
}

/// Items processed per audit scan batch
///
/// **Default:** 150
pub async fn get_audit_batch_size(db: &Pool<Sqlite>) -> Result<usize> {
    let size = get_setting::<usize>(db, "audit_batch_size").await?.unwrap_or(150);
    if size == 0 {
        return Err(Error::Config("audit_batch_size must be positive".to_string()));
    }
    Ok(size)
}

/// Window during which a checked item is skipped by a non-forced scan
///
/// **Default:** 24 hours
pub async fn get_audit_freshness_hours(db: &Pool<Sqlite>) -> Result<i64> {
    get_setting(db, "audit_freshness_hours").await.map(|opt| opt.unwrap_or(24))
}

/// Image HEAD probe timeout
///
/// **Default:** 5000 ms
pub async fn get_probe_timeout_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, "audit_probe_timeout_ms").await.map(|opt| opt.unwrap_or(5000))
}

/// ARCHIVE subtiers defined by the operator
///
/// A missing or unparseable list is a configuration error: rebalancing
/// ARCHIVE without knowing its subtiers would misplace items.
pub async fn get_archive_subtiers(db: &Pool<Sqlite>) -> Result<Vec<ArchiveSubtier>> {
    let raw: Option<String> = get_setting(db, "archive_subtiers").await?;
    let raw = raw.ok_or_else(|| Error::Config("archive_subtiers setting is missing".to_string()))?;
    let subtiers: Vec<ArchiveSubtier> = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("archive_subtiers is not valid JSON: {}", e)))?;
    validate_archive_subtiers(&subtiers).map_err(|e| match e {
        Error::InvalidInput(msg) => Error::Config(msg),
        other => other,
    })?;
    Ok(subtiers)
}

/// Replace the ARCHIVE subtier list
pub async fn set_archive_subtiers(db: &Pool<Sqlite>, subtiers: &[ArchiveSubtier]) -> Result<()> {
    validate_archive_subtiers(subtiers)?;
    let json = serde_json::to_string(subtiers)
        .map_err(|e| Error::Internal(format!("Serialize archive subtiers failed: {}", e)))?;
    set_setting(db, "archive_subtiers", json).await
}

/// Ids must be non-blank, unique and free of '/'
pub fn validate_archive_subtiers(subtiers: &[ArchiveSubtier]) -> Result<()> {
    let mut seen = HashSet::new();
    for subtier in subtiers {
        let id = subtier.id.trim();
        if id.is_empty() || id != subtier.id || id.contains('/') {
            return Err(Error::InvalidInput(format!("Invalid archive subtier id: {:?}", subtier.id)));
        }
        if !seen.insert(id) {
            return Err(Error::InvalidInput(format!("Duplicate archive subtier id: {}", id)));
        }
    }
    Ok(())
}

/// Everything a rebalance pass reads from settings, loaded up front
#[derive(Debug, Clone)]
pub struct RebalanceSettings {
    pub lifecycle: LifecycleConfig,
    pub subtiers: Vec<ArchiveSubtier>,
    pub default_capacity: usize,
    /// Per-placement overrides keyed by [`capacity_key`]
    pub capacity_overrides: HashMap<String, usize>,
    pub dispose_after_days: i64,
    pub suggestion_min_confidence: u8,
}

impl RebalanceSettings {
    pub fn capacity(&self, placement: &Placement) -> Option<usize> {
        if placement.tier.is_terminal() {
            return None;
        }
        Some(
            self.capacity_overrides
                .get(&capacity_key(placement))
                .copied()
                .unwrap_or(self.default_capacity),
        )
    }
}

pub async fn load_rebalance_settings(db: &Pool<Sqlite>) -> Result<RebalanceSettings> {
    let lifecycle = get_lifecycle_config(db).await?;
    let subtiers = get_archive_subtiers(db).await?;

    Ok(RebalanceSettings {
        lifecycle,
        capacity_overrides: load_capacity_overrides(db, &subtiers).await?,
        subtiers,
        default_capacity: get_default_tier_capacity(db).await?,
        dispose_after_days: get_dispose_after_days(db).await?,
        suggestion_min_confidence: get_suggestion_min_confidence(db).await?,
    })
}

/// Settings for read-only views
///
/// Never fails: unusable values fall back to their defaults (an unreadable
/// subtier list means every stored subtier reads as unassigned ARCHIVE).
pub async fn load_view_settings(db: &Pool<Sqlite>) -> RebalanceSettings {
    match load_rebalance_settings(db).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Settings unusable, reading with defaults");
            let subtiers = get_archive_subtiers(db).await.unwrap_or_default();
            RebalanceSettings {
                lifecycle: get_lifecycle_config(db).await.unwrap_or_default(),
                capacity_overrides: load_capacity_overrides(db, &subtiers).await.unwrap_or_default(),
                subtiers,
                default_capacity: get_default_tier_capacity(db).await.unwrap_or(DEFAULT_TIER_CAPACITY),
                dispose_after_days: get_dispose_after_days(db).await.unwrap_or(120),
                suggestion_min_confidence: get_suggestion_min_confidence(db).await.unwrap_or(70),
            }
        }
    }
}

async fn load_capacity_overrides(
    db: &Pool<Sqlite>,
    subtiers: &[ArchiveSubtier],
) -> Result<HashMap<String, usize>> {
    let mut placements: Vec<Placement> = Tier::ALL
        .iter()
        .filter(|t| !t.is_terminal())
        .map(|t| Placement::tier(*t))
        .collect();
    placements.extend(
        subtiers
            .iter()
            .map(|s| Placement::new(Tier::Archive, Some(s.id.clone()))),
    );

    let mut overrides = HashMap::new();
    for placement in &placements {
        let key = capacity_key(placement);
        if let Some(capacity) = get_setting::<usize>(db, &key).await? {
            overrides.insert(key, capacity);
        }
    }
    Ok(overrides)
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        Some((None,)) | None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resale_common::db::init_schema;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// In-memory database with the production schema and seeded defaults
    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_seeded_defaults() {
        let pool = setup_test_db().await;

        let lifecycle = get_lifecycle_config(&pool).await.unwrap();
        assert_eq!(lifecycle, LifecycleConfig::default());
        assert_eq!(get_default_tier_capacity(&pool).await.unwrap(), 200);
        assert_eq!(get_dispose_after_days(&pool).await.unwrap(), 120);
        assert_eq!(get_suggestion_min_confidence(&pool).await.unwrap(), 70);
        assert_eq!(get_audit_batch_size(&pool).await.unwrap(), 150);
        assert_eq!(get_audit_freshness_hours(&pool).await.unwrap(), 24);
        assert_eq!(get_probe_timeout_ms(&pool).await.unwrap(), 5000);
        assert_eq!(get_archive_subtiers(&pool).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_capacity_override() {
        let pool = setup_test_db().await;
        let military = Placement::new(Tier::Archive, Some("military".to_string()));

        assert_eq!(get_tier_capacity(&pool, &military).await.unwrap(), Some(200));
        set_tier_capacity(&pool, &military, 50).await.unwrap();
        assert_eq!(get_tier_capacity(&pool, &military).await.unwrap(), Some(50));
        assert_eq!(get_tier_capacity(&pool, &Placement::tier(Tier::Archive)).await.unwrap(), Some(200));
        assert_eq!(get_tier_capacity(&pool, &Placement::tier(Tier::ClearanceDispose)).await.unwrap(), None);

        let settings = load_rebalance_settings(&pool).await.unwrap();
        assert_eq!(settings.capacity(&military), Some(50));
        assert_eq!(settings.capacity(&Placement::tier(Tier::New)), Some(200));
    }

    #[tokio::test]
    async fn test_invalid_thresholds_are_config_errors() {
        let pool = setup_test_db().await;
        set_setting(&pool, "lifecycle_curated_days", 10).await.unwrap();

        assert!(matches!(get_lifecycle_config(&pool).await, Err(Error::Config(_))));
        assert!(matches!(load_rebalance_settings(&pool).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unparseable_archive_subtiers() {
        let pool = setup_test_db().await;
        set_setting(&pool, "archive_subtiers", "not json").await.unwrap();

        assert!(matches!(get_archive_subtiers(&pool).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_view_settings_fall_back_to_defaults() {
        let pool = setup_test_db().await;
        set_tier_capacity(&pool, &Placement::tier(Tier::New), 12).await.unwrap();
        set_setting(&pool, "archive_subtiers", "not json").await.unwrap();
        set_setting(&pool, "lifecycle_curated_days", 10).await.unwrap();

        let settings = load_view_settings(&pool).await;
        assert!(settings.subtiers.is_empty());
        assert_eq!(settings.lifecycle, LifecycleConfig::default());
        assert_eq!(settings.capacity(&Placement::tier(Tier::New)), Some(12));
        assert_eq!(settings.capacity(&Placement::tier(Tier::Curated)), Some(200));
    }

    #[tokio::test]
    async fn test_set_archive_subtiers_rejects_duplicates() {
        let pool = setup_test_db().await;
        let dup = vec![
            ArchiveSubtier { id: "military".to_string(), display_name: "A".to_string() },
            ArchiveSubtier { id: "military".to_string(), display_name: "B".to_string() },
        ];
        assert!(matches!(set_archive_subtiers(&pool, &dup).await, Err(Error::InvalidInput(_))));

        let ok = vec![ArchiveSubtier { id: "denim".to_string(), display_name: "DENIM ARCHIVE".to_string() }];
        set_archive_subtiers(&pool, &ok).await.unwrap();
        assert_eq!(get_archive_subtiers(&pool).await.unwrap(), ok);
    }
}
