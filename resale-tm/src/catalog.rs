//! Catalog store seam and the in-process read model
//!
//! [`CatalogStore`] is the durable store (SQLite in production, see
//! [`crate::db::items::SqliteCatalogStore`]). [`Catalog`] wraps it with an
//! id-ordered cache that mutations update synchronously after each durable
//! write, so readers see their own writes immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resale_common::{Item, ItemId, Placement, Result, Tier};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::lifecycle::{self, Lifecycle, LifecycleConfig};

/// Durable catalog storage
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every item, ascending by id
    async fn load_all(&self) -> Result<Vec<Item>>;

    async fn load(&self, id: ItemId) -> Result<Option<Item>>;

    /// Subset of `ids` that exist
    async fn existing_ids(&self, ids: &[ItemId]) -> Result<Vec<ItemId>>;

    /// Pin items to a placement and set the manual override
    async fn set_manual_placement(&self, ids: &[ItemId], placement: &Placement) -> Result<()>;

    /// Clear the manual override and the stored placement
    async fn clear_placement(&self, ids: &[ItemId]) -> Result<()>;

    /// Write placements in one transaction, leaving the manual override alone
    async fn write_placements(&self, placements: &[(ItemId, Placement)]) -> Result<()>;

    /// Insert or replace an item (ingestion)
    async fn upsert_item(&self, item: &Item) -> Result<()>;
}

/// Effective placement of an item given its lifecycle stage
///
/// - Manual override: the stored placement wins.
/// - Stored by a rebalance pass: whichever of the stored tier and the
///   lifecycle stage is further along; the stored subtier survives only when
///   both are ARCHIVE.
/// - Nothing stored: the lifecycle stage.
pub fn resolve_placement(item: &Item, stage: Tier) -> Placement {
    match item.stored_tier {
        Some(tier) if item.manual_override => Placement::new(tier, item.stored_subtier.clone()),
        Some(tier) if tier >= stage => Placement::new(tier, item.stored_subtier.clone()),
        Some(_) | None => Placement::tier(stage),
    }
}

/// Lifecycle and effective placement of an item as the rebalancer sees it
///
/// ARCHIVE subtiers missing from `known_subtiers` fall back to the
/// unassigned pool.
pub fn effective_placement(
    item: &Item,
    config: &LifecycleConfig,
    known_subtiers: &HashSet<String>,
    now: DateTime<Utc>,
) -> (Placement, Lifecycle) {
    let lifecycle = lifecycle::classify(item.lifecycle_date(), config, now);
    let mut placement = resolve_placement(item, lifecycle.stage);
    if placement.subtier.as_ref().is_some_and(|s| !known_subtiers.contains(s)) {
        placement.subtier = None;
    }
    (placement, lifecycle)
}

/// Shared read model over a [`CatalogStore`]
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    cache: Arc<RwLock<Option<BTreeMap<ItemId, Item>>>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Reload the cache from the store and return the fresh snapshot
    pub async fn refresh(&self) -> Result<Vec<Item>> {
        let items = self.store.load_all().await?;
        let map: BTreeMap<ItemId, Item> = items.iter().map(|item| (item.id, item.clone())).collect();
        debug!(count = map.len(), "Catalog cache refreshed");
        *self.cache.write().await = Some(map);
        Ok(items)
    }

    /// Current cached snapshot (ascending id), loading it on first use
    pub async fn snapshot(&self) -> Result<Vec<Item>> {
        if let Some(map) = self.cache.read().await.as_ref() {
            return Ok(map.values().cloned().collect());
        }
        self.refresh().await
    }

    /// One page of the cached snapshot plus the total count
    pub async fn page(&self, offset: usize, limit: usize) -> Result<(Vec<Item>, usize)> {
        if self.cache.read().await.is_none() {
            self.refresh().await?;
        }
        let guard = self.cache.read().await;
        let Some(map) = guard.as_ref() else {
            return Ok((Vec::new(), 0));
        };
        let page = map.values().skip(offset).take(limit).cloned().collect();
        Ok((page, map.len()))
    }

    /// Up to `limit` cached items with ids above `after`, plus the number of
    /// items at or below `after` and the total count
    ///
    /// Keyed paging: items inserted below `after` between calls shift the
    /// position but never repeat or skip an item.
    pub async fn page_after(&self, after: ItemId, limit: usize) -> Result<(Vec<Item>, usize, usize)> {
        if self.cache.read().await.is_none() {
            self.refresh().await?;
        }
        let guard = self.cache.read().await;
        let Some(map) = guard.as_ref() else {
            return Ok((Vec::new(), 0, 0));
        };
        let position = map.range(..=after).count();
        let page = map
            .range((Bound::Excluded(after), Bound::Unbounded))
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect();
        Ok((page, position, map.len()))
    }

    pub async fn get(&self, id: ItemId) -> Result<Option<Item>> {
        if let Some(map) = self.cache.read().await.as_ref() {
            if let Some(item) = map.get(&id) {
                return Ok(Some(item.clone()));
            }
        }
        self.store.load(id).await
    }

    /// Apply an in-place edit to cached items; uncached ids are ignored
    pub async fn update_cached<F>(&self, ids: &[ItemId], mut edit: F)
    where
        F: FnMut(&mut Item),
    {
        let mut guard = self.cache.write().await;
        if let Some(map) = guard.as_mut() {
            for id in ids {
                if let Some(item) = map.get_mut(id) {
                    edit(item);
                }
            }
        }
    }

    /// Insert or replace one item durably and in the cache
    pub async fn upsert(&self, item: Item) -> Result<()> {
        self.store.upsert_item(&item).await?;
        let mut guard = self.cache.write().await;
        if let Some(map) = guard.as_mut() {
            map.insert(item.id, item);
        }
        Ok(())
    }
}
