//! HTTP API handlers for resale-tm
//!
//! REST endpoints plus two SSE streams: audit batch progress and catalog
//! events.

pub mod audit;
pub mod category;
pub mod health;
pub mod items;
pub mod rebalance;
pub mod settings;
pub mod sse;

pub use audit::audit_routes;
pub use category::category_routes;
pub use health::health_routes;
pub use items::item_routes;
pub use rebalance::rebalance_routes;
pub use settings::settings_routes;
pub use sse::event_routes;
