//! Audit scan endpoints
//!
//! - POST /api/audit/scan: one batch, streamed as SSE
//! - POST /api/audit/scan/{session_id}/cancel
//! - POST /api/audit/recheck/{id}
//! - GET /api/audit/findings
//!
//! The client drives the scan: it posts offset 0, then the `last_item_id` of
//! each `complete` event as `after_id` (or its `next_offset` as `offset`),
//! reusing the `session_id` from the first `start` event, until `has_more`
//! is false or the batch reports `cancelled`.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use resale_common::sse::{json_event, keep_alive};
use resale_common::{AuditFinding, AuditIssue, ItemId};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::info;
use uuid::Uuid;

use crate::audit::{BatchRequest, ScanEvent};
use crate::db::findings;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Session from an earlier batch; a new one is opened when absent
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub offset: usize,
    /// Resume after this item id instead of at `offset`
    #[serde(default)]
    pub after_id: Option<ItemId>,
    #[serde(default)]
    pub force: bool,
    /// Reload the catalog before paging; defaults to true for offset 0
    #[serde(default)]
    pub refresh: Option<bool>,
}

/// POST /api/audit/scan
pub async fn scan_batch(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
    let token = state.scan_sessions.open(session_id).await;

    let batch = BatchRequest {
        session_id: Some(session_id),
        offset: request.offset,
        after_id: request.after_id,
        force: request.force,
        refresh_catalog: request
            .refresh
            .unwrap_or(request.offset == 0 && request.after_id.is_none()),
    };
    info!(session_id = %session_id, offset = batch.offset, force = batch.force, "Audit batch requested");

    let events = state.scanner.scan_batch(batch, token);
    let sessions = state.scan_sessions.clone();

    let stream = async_stream::stream! {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            let finished = match &event {
                ScanEvent::Complete { has_more, cancelled, .. } => *cancelled || !has_more,
                ScanEvent::Error { .. } => true,
                _ => false,
            };
            yield Ok(json_event(event.event_type(), &event));
            if finished {
                sessions.close(session_id).await;
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}

#[derive(Debug, Serialize)]
pub struct CancelScanResponse {
    pub session_id: Uuid,
    pub cancelled: bool,
}

/// POST /api/audit/scan/{session_id}/cancel
pub async fn cancel_scan(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelScanResponse>> {
    if !state.scan_sessions.cancel(session_id).await {
        return Err(ApiError::NotFound(format!("Scan session not found: {}", session_id)));
    }
    info!(session_id = %session_id, "Audit scan cancellation requested");

    Ok(Json(CancelScanResponse {
        session_id,
        cancelled: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct RecheckResponse {
    pub success: bool,
    pub item_id: ItemId,
    pub issues: Vec<AuditIssue>,
}

/// POST /api/audit/recheck/{id}
pub async fn recheck_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> ApiResult<Json<RecheckResponse>> {
    let issues = state
        .scanner
        .recheck(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item not found: {}", id)))?;

    Ok(Json(RecheckResponse {
        success: true,
        item_id: id,
        issues: issues.into_iter().collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct FindingsResponse {
    pub count: usize,
    pub findings: Vec<AuditFinding>,
}

/// GET /api/audit/findings
pub async fn list_findings(State(state): State<AppState>) -> ApiResult<Json<FindingsResponse>> {
    let findings = findings::list_findings(&state.db).await?;
    Ok(Json(FindingsResponse {
        count: findings.len(),
        findings,
    }))
}

pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/api/audit/scan", post(scan_batch))
        .route("/api/audit/scan/:session_id/cancel", post(cancel_scan))
        .route("/api/audit/recheck/:id", post(recheck_item))
        .route("/api/audit/findings", get(list_findings))
}
