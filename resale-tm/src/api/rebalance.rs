//! POST /api/rebalance

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::error;

use crate::error::ApiError;
use crate::rebalance::RebalanceSummary;
use crate::AppState;

/// Run one rebalance pass
///
/// 409 while another pass is running. Unusable settings abort the pass
/// before any write and answer 500 with `success: false`.
pub async fn run_rebalance(State(state): State<AppState>) -> Response {
    let Ok(_guard) = state.rebalance_lock.try_lock() else {
        return ApiError::Conflict("Rebalance already running".to_string()).into_response();
    };

    match state.rebalancer.run(resale_common::time::now()).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!(error = %e, "Rebalance failed");
            state.record_error(format!("rebalance: {}", e)).await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RebalanceSummary::failed(e.to_string())),
            )
                .into_response()
        }
    }
}

pub fn rebalance_routes() -> Router<AppState> {
    Router::new().route("/api/rebalance", post(run_rebalance))
}
