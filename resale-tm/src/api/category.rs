//! PUT /api/items/category/bulk
//!
//! Pins items to a tier (manual override) or hands them back to automatic
//! placement.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::put,
    Json, Router,
};
use resale_common::{ItemId, Placement, Tier};
use serde::{Deserialize, Serialize};

use crate::db::settings::get_archive_subtiers;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkCategoryRequest {
    #[serde(default, alias = "productNos")]
    pub ids: Vec<ItemId>,
    /// Tier name, optionally with a subtier: `ARCHIVE/military`
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subtier: Option<String>,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkCategoryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub count: usize,
    pub updated: Vec<ItemId>,
    pub missing: Vec<ItemId>,
    pub message: String,
}

fn rejected(message: impl Into<String>) -> Response {
    let message = message.into();
    (
        StatusCode::BAD_REQUEST,
        Json(BulkCategoryResponse {
            success: false,
            error: Some(message.clone()),
            message,
            ..Default::default()
        }),
    )
        .into_response()
}

/// Split `TIER` / `TIER/subtier` and merge the separate subtier field
fn parse_category(category: &str, subtier: Option<&str>) -> Result<Placement, String> {
    let (tier_part, inline_subtier) = match category.split_once('/') {
        Some((tier, sub)) => (tier, Some(sub.trim())),
        None => (category, None),
    };
    let tier: Tier = tier_part.parse().map_err(|_| format!("Unknown tier: {}", tier_part.trim()))?;

    let subtier = match (inline_subtier, subtier.map(str::trim)) {
        (Some(a), Some(b)) if a != b => return Err(format!("Conflicting subtiers: {} and {}", a, b)),
        (Some(s), _) | (None, Some(s)) => Some(s).filter(|s| !s.is_empty()),
        (None, None) => None,
    };

    if subtier.is_some() && tier != Tier::Archive {
        return Err(format!("Subtiers only exist in ARCHIVE, not {}", tier));
    }
    Ok(Placement::new(tier, subtier.map(str::to_string)))
}

pub async fn bulk_update_category(
    State(state): State<AppState>,
    Json(request): Json<BulkCategoryRequest>,
) -> ApiResult<Response> {
    if request.ids.is_empty() {
        return Ok(rejected("ids must be a non-empty list"));
    }

    if request.reset {
        let outcome = state.mutation.bulk_reset_to_automatic(&request.ids).await?;
        let message = format!("{} item(s) returned to automatic placement", outcome.updated.len());
        return Ok(Json(BulkCategoryResponse {
            success: true,
            error: None,
            count: outcome.updated.len(),
            updated: outcome.updated,
            missing: outcome.missing,
            message,
        })
        .into_response());
    }

    let Some(category) = request.category.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(rejected("category or reset required"));
    };
    let placement = match parse_category(category, request.subtier.as_deref()) {
        Ok(placement) => placement,
        Err(message) => return Ok(rejected(message)),
    };

    if let Some(subtier) = placement.subtier.as_deref() {
        let known = get_archive_subtiers(&state.db).await?;
        if !known.iter().any(|s| s.id == subtier) {
            return Ok(rejected(format!("Unknown archive subtier: {}", subtier)));
        }
    }

    let outcome = state.mutation.bulk_set_category(&request.ids, placement.clone()).await?;
    let message = format!("{} item(s) moved to {}", outcome.updated.len(), placement);
    Ok(Json(BulkCategoryResponse {
        success: true,
        error: None,
        count: outcome.updated.len(),
        updated: outcome.updated,
        missing: outcome.missing,
        message,
    })
    .into_response())
}

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/api/items/category/bulk", put(bulk_update_category))
}
