//! Archive subtier settings
//!
//! GET/PUT /api/settings/archive

use axum::{extract::State, routing::get, Json, Router};
use resale_common::ArchiveSubtier;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::settings::{get_archive_subtiers, set_archive_subtiers};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveSettings {
    pub subtiers: Vec<ArchiveSubtier>,
}

pub async fn get_archive_settings(State(state): State<AppState>) -> ApiResult<Json<ArchiveSettings>> {
    let subtiers = get_archive_subtiers(&state.db).await?;
    Ok(Json(ArchiveSettings { subtiers }))
}

/// Replace the subtier list
///
/// Items stored under a removed subtier are treated as unassigned ARCHIVE
/// from the next read on; nothing is rewritten.
pub async fn update_archive_settings(
    State(state): State<AppState>,
    Json(request): Json<ArchiveSettings>,
) -> ApiResult<Json<ArchiveSettings>> {
    set_archive_subtiers(&state.db, &request.subtiers).await?;
    info!(count = request.subtiers.len(), "Archive subtiers updated");
    Ok(Json(request))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/api/settings/archive",
        get(get_archive_settings).put(update_archive_settings),
    )
}
