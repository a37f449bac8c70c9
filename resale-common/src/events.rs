//! Catalog event types and the in-process event bus
//!
//! Events are broadcast over a `tokio::sync::broadcast` channel and forwarded
//! to SSE clients. Emission never blocks a writer: a lagging or absent
//! subscriber only loses events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use crate::models::{AuditIssue, ItemId, Tier};

/// Events published by the tier manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    /// Items were placed into a tier; cached catalog views must refresh them
    CategoriesChanged {
        ids: Vec<ItemId>,
        tier: Tier,
        subtier: Option<String>,
        manual: bool,
        timestamp: DateTime<Utc>,
    },

    /// Items were handed back to lifecycle-driven placement
    PlacementReset {
        ids: Vec<ItemId>,
        timestamp: DateTime<Utc>,
    },

    /// A rebalance pass finished
    RebalanceCompleted {
        moved: usize,
        moves_by_target: BTreeMap<String, usize>,
        timestamp: DateTime<Utc>,
    },

    /// An audit check recorded issues for an item
    AuditFindingRecorded {
        item_id: ItemId,
        issues: Vec<AuditIssue>,
        timestamp: DateTime<Utc>,
    },
}

impl CatalogEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::CategoriesChanged { .. } => "CategoriesChanged",
            CatalogEvent::PlacementReset { .. } => "PlacementReset",
            CatalogEvent::RebalanceCompleted { .. } => "RebalanceCompleted",
            CatalogEvent::AuditFindingRecorded { .. } => "AuditFindingRecorded",
        }
    }
}

/// Broadcast bus for [`CatalogEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CatalogEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` if no subscriber is listening
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CatalogEvent,
    ) -> Result<usize, broadcast::error::SendError<CatalogEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CatalogEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
