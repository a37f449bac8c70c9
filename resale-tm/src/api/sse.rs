//! GET /api/events - catalog event stream

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::{AppState, MODULE_NAME};

/// Streams CategoriesChanged, PlacementReset, RebalanceCompleted and
/// AuditFindingRecorded events with a 15 s heartbeat
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    resale_common::sse::create_catalog_event_stream(MODULE_NAME, &state.event_bus)
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/events", get(event_stream))
}
