//! Item and tier read endpoints
//!
//! GET /api/items/{id}, GET /api/tiers/summary

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use resale_common::{AuditFinding, Item, ItemId, Placement, Tier};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::catalog::effective_placement;
use crate::db::{findings, settings};
use crate::error::{ApiError, ApiResult};
use crate::lifecycle::Lifecycle;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub effective_tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_subtier: Option<String>,
    pub lifecycle: Lifecycle,
    /// Discount of the effective tier
    pub discount_rate: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditFinding>,
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<ItemId>) -> ApiResult<Json<ItemView>> {
    let item = state
        .catalog
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item not found: {}", id)))?;

    let view = settings::load_view_settings(&state.db).await;
    let config = view.lifecycle;
    let known: HashSet<String> = view.subtiers.into_iter().map(|s| s.id).collect();
    let (placement, lifecycle) = effective_placement(&item, &config, &known, resale_common::time::now());
    let audit = findings::get_finding(&state.db, id).await?;

    Ok(Json(ItemView {
        item,
        effective_tier: placement.tier,
        effective_subtier: placement.subtier,
        discount_rate: config.discounts.for_tier(placement.tier),
        lifecycle,
        audit,
    }))
}

#[derive(Debug, Serialize)]
pub struct TierCount {
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub count: usize,
    /// `None` for the uncapped terminal tier
    pub capacity: Option<usize>,
    pub overflow: usize,
}

#[derive(Debug, Serialize)]
pub struct TierSummaryResponse {
    pub total: usize,
    pub tiers: Vec<TierCount>,
}

/// Counts per effective placement, in rebalance evaluation order
pub async fn tier_summary(State(state): State<AppState>) -> ApiResult<Json<TierSummaryResponse>> {
    let settings = settings::load_view_settings(&state.db).await;
    let items = state.catalog.snapshot().await?;
    let known: HashSet<String> = settings.subtiers.iter().map(|s| s.id.clone()).collect();
    let now = resale_common::time::now();

    let mut counts: HashMap<Placement, usize> = HashMap::new();
    for item in &items {
        let (placement, _) = effective_placement(item, &settings.lifecycle, &known, now);
        *counts.entry(placement).or_default() += 1;
    }

    let mut rows: Vec<(Placement, Option<String>)> = vec![
        (Placement::tier(Tier::New), None),
        (Placement::tier(Tier::Curated), None),
    ];
    rows.extend(settings.subtiers.iter().map(|s| {
        (
            Placement::new(Tier::Archive, Some(s.id.clone())),
            Some(s.display_name.clone()),
        )
    }));
    rows.push((Placement::tier(Tier::Archive), Some("UNASSIGNED".to_string())));
    rows.push((Placement::tier(Tier::Clearance), None));
    rows.push((Placement::tier(Tier::ClearanceDispose), None));

    let tiers = rows
        .into_iter()
        .map(|(placement, display_name)| {
            let count = counts.get(&placement).copied().unwrap_or(0);
            let capacity = settings.capacity(&placement);
            TierCount {
                tier: placement.tier,
                subtier: placement.subtier,
                display_name,
                count,
                capacity,
                overflow: capacity.map_or(0, |c| count.saturating_sub(c)),
            }
        })
        .collect();

    Ok(Json(TierSummaryResponse {
        total: items.len(),
        tiers,
    }))
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/api/items/:id", get(get_item))
        .route("/api/tiers/summary", get(tier_summary))
}
