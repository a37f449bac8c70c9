//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE helpers: JSON event framing, the standard keep-alive, and the
//! catalog event stream forwarded from the [`EventBus`].

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::events::EventBus;

/// Heartbeat interval for all SSE streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Standard keep-alive sending a `heartbeat` comment
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Build a named SSE event with a JSON payload
///
/// Serialization failures are logged and replaced by a comment so a stream
/// is never torn down by one bad payload.
pub fn json_event<T: Serialize>(event_name: &str, payload: &T) -> Event {
    match Event::default().event(event_name).json_data(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!("SSE: Failed to serialize {} event: {}", event_name, e);
            Event::default().comment(format!("unserializable {} event", event_name))
        }
    }
}

/// Forward every [`crate::events::CatalogEvent`] on the bus to one SSE client
pub fn create_catalog_event_stream(
    service_name: &'static str,
    event_bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} catalog events", service_name);
    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!("SSE: Broadcasting catalog event: {}", event.event_type());
                    yield Ok(json_event(event.event_type(), &event));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, {} events dropped", service_name, skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}
