//! resale-tm library interface
//!
//! Tier manager for an aging resale catalog: lifecycle staging, keepScore
//! ranking, capacity eviction, bulk re-tiering and the audit scan, served
//! over HTTP + SSE.

pub mod api;
pub mod audit;
pub mod catalog;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod mutation;
pub mod planner;
pub mod rebalance;
pub mod scoring;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use resale_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::audit::{AuditScanner, ImageProbe, ScanSessions};
use crate::catalog::Catalog;
use crate::db::SqliteCatalogStore;
use crate::mutation::CategoryMutationService;
use crate::rebalance::RebalanceOrchestrator;

/// Module name reported by /health and used for config lookup
pub const MODULE_NAME: &str = "resale-tm";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Catalog event bus, forwarded to SSE clients
    pub event_bus: EventBus,
    /// In-process catalog read model
    pub catalog: Catalog,
    pub mutation: CategoryMutationService,
    pub rebalancer: RebalanceOrchestrator,
    pub scanner: AuditScanner,
    /// Cancellation tokens for open audit scan sessions
    pub scan_sessions: ScanSessions,
    /// Serializes rebalance passes
    pub rebalance_lock: Arc<tokio::sync::Mutex<()>>,
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, probe: Arc<dyn ImageProbe>) -> Self {
        let catalog = Catalog::new(Arc::new(SqliteCatalogStore::new(db.clone())));
        let mutation = CategoryMutationService::new(catalog.clone(), event_bus.clone());
        let rebalancer =
            RebalanceOrchestrator::new(db.clone(), catalog.clone(), mutation.clone(), event_bus.clone());
        let scanner = AuditScanner::new(db.clone(), catalog.clone(), probe, event_bus.clone());

        Self {
            db,
            event_bus,
            catalog,
            mutation,
            rebalancer,
            scanner,
            scan_sessions: ScanSessions::new(),
            rebalance_lock: Arc::new(tokio::sync::Mutex::new(())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::rebalance_routes())
        .merge(api::category_routes())
        .merge(api::audit_routes())
        .merge(api::item_routes())
        .merge(api::settings_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
