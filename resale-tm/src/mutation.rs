//! Category mutation
//!
//! Every placement change goes through [`CategoryMutationService`]: durable
//! write first, then the in-process cache, then a lossy event so other
//! readers drop their cached views.

use resale_common::events::{CatalogEvent, EventBus};
use resale_common::{Error, ItemId, MoveDirective, Placement, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info};

use crate::catalog::Catalog;

/// Rebalance placements are written this many per transaction
pub const APPLY_CHUNK_SIZE: usize = 50;

/// Per-item result of a bulk mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub updated: Vec<ItemId>,
    /// Requested ids with no catalog item
    pub missing: Vec<ItemId>,
}

#[derive(Clone)]
pub struct CategoryMutationService {
    catalog: Catalog,
    event_bus: EventBus,
}

fn dedup(ids: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl CategoryMutationService {
    pub fn new(catalog: Catalog, event_bus: EventBus) -> Self {
        Self { catalog, event_bus }
    }

    async fn partition(&self, ids: &[ItemId]) -> Result<BulkOutcome> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("No item ids given".to_string()));
        }
        let ids = dedup(ids);
        let existing: HashSet<ItemId> = self.catalog.store().existing_ids(&ids).await?.into_iter().collect();
        let (updated, missing): (Vec<ItemId>, Vec<ItemId>) = ids.into_iter().partition(|id| existing.contains(id));
        Ok(BulkOutcome { updated, missing })
    }

    /// Pin items to `placement` and freeze them against lifecycle aging
    pub async fn bulk_set_category(&self, ids: &[ItemId], placement: Placement) -> Result<BulkOutcome> {
        let outcome = self.partition(ids).await?;
        if outcome.updated.is_empty() {
            return Ok(outcome);
        }

        self.catalog.store().set_manual_placement(&outcome.updated, &placement).await?;
        self.catalog
            .update_cached(&outcome.updated, |item| {
                item.stored_tier = Some(placement.tier);
                item.stored_subtier = placement.subtier.clone();
                item.manual_override = true;
            })
            .await;

        info!(
            count = outcome.updated.len(),
            missing = outcome.missing.len(),
            placement = %placement,
            "Bulk category set"
        );

        self.event_bus.emit_lossy(CatalogEvent::CategoriesChanged {
            ids: outcome.updated.clone(),
            tier: placement.tier,
            subtier: placement.subtier,
            manual: true,
            timestamp: resale_common::time::now(),
        });

        Ok(outcome)
    }

    /// Hand items back to lifecycle-driven placement
    pub async fn bulk_reset_to_automatic(&self, ids: &[ItemId]) -> Result<BulkOutcome> {
        let outcome = self.partition(ids).await?;
        if outcome.updated.is_empty() {
            return Ok(outcome);
        }

        self.catalog.store().clear_placement(&outcome.updated).await?;
        self.catalog
            .update_cached(&outcome.updated, |item| {
                item.stored_tier = None;
                item.stored_subtier = None;
                item.manual_override = false;
            })
            .await;

        info!(count = outcome.updated.len(), missing = outcome.missing.len(), "Bulk placement reset");

        self.event_bus.emit_lossy(CatalogEvent::PlacementReset {
            ids: outcome.updated.clone(),
            timestamp: resale_common::time::now(),
        });

        Ok(outcome)
    }

    /// Write planned moves without touching the manual override
    ///
    /// Chunks of [`APPLY_CHUNK_SIZE`], one transaction each. Every committed
    /// chunk is cached and announced before the next one starts. A failing
    /// chunk aborts the rest; chunks already committed stay applied.
    pub async fn apply_moves(&self, directives: &[MoveDirective]) -> Result<usize> {
        let mut applied = 0;

        for (index, chunk) in directives.chunks(APPLY_CHUNK_SIZE).enumerate() {
            let placements: Vec<(ItemId, Placement)> =
                chunk.iter().map(|d| (d.item_id, d.to.clone())).collect();
            if let Err(e) = self.catalog.store().write_placements(&placements).await {
                error!(
                    chunk = index,
                    applied,
                    remaining = directives.len() - applied,
                    error = %e,
                    "Move chunk failed; earlier chunks stay applied"
                );
                return Err(e);
            }

            for (id, placement) in &placements {
                self.catalog
                    .update_cached(std::slice::from_ref(id), |item| {
                        item.stored_tier = Some(placement.tier);
                        item.stored_subtier = placement.subtier.clone();
                    })
                    .await;
            }
            self.announce_moves(chunk);

            applied += chunk.len();
            debug!(chunk = index, size = chunk.len(), "Applied move chunk");
        }

        Ok(applied)
    }

    /// One CategoriesChanged per target placement
    fn announce_moves(&self, directives: &[MoveDirective]) {
        let mut by_target: BTreeMap<String, (Placement, Vec<ItemId>)> = BTreeMap::new();
        for directive in directives {
            by_target
                .entry(directive.to.to_string())
                .or_insert_with(|| (directive.to.clone(), Vec::new()))
                .1
                .push(directive.item_id);
        }
        for (_, (placement, ids)) in by_target {
            self.event_bus.emit_lossy(CatalogEvent::CategoriesChanged {
                ids,
                tier: placement.tier,
                subtier: placement.subtier,
                manual: false,
                timestamp: resale_common::time::now(),
            });
        }
    }
}
