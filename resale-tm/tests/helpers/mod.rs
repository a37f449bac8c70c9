//! Shared fixtures for resale-tm integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use chrono::{DateTime, Duration, Utc};
use resale_common::events::EventBus;
use resale_common::{ConditionGrade, Item, ItemId, ListingDetail, Placement};
use resale_tm::audit::{ImageProbe, ProbeError};
use resale_tm::catalog::CatalogStore;
use resale_tm::db::SqliteCatalogStore;
use resale_tm::AppState;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

/// Fresh in-memory database with the full schema and default settings
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    resale_common::db::init_schema(&pool)
        .await
        .expect("Should create schema");
    pool
}

/// Image probe answering from a fixed set of broken URLs
pub struct StaticProbe {
    pub broken: HashSet<String>,
    pub failing: HashSet<String>,
}

impl StaticProbe {
    pub fn all_reachable() -> Self {
        Self {
            broken: HashSet::new(),
            failing: HashSet::new(),
        }
    }
}

#[async_trait]
impl ImageProbe for StaticProbe {
    async fn is_reachable(&self, url: &str) -> Result<bool, ProbeError> {
        if self.failing.contains(url) {
            return Err(ProbeError::Transport("connection refused".to_string()));
        }
        Ok(!self.broken.contains(url))
    }
}

pub fn setup_state(db: SqlitePool) -> AppState {
    setup_state_with_probe(db, StaticProbe::all_reachable())
}

pub fn setup_state_with_probe(db: SqlitePool, probe: StaticProbe) -> AppState {
    AppState::new(db, EventBus::new(100), Arc::new(probe))
}

/// An item that passes every structural check
pub fn clean_item(id: ItemId, registered: DateTime<Utc>) -> Item {
    let mut item = Item::new(id, format!("BARBOUR 왁스 자켓 {}", id), "BARBOUR", 100_000 + id);
    item.grade = ConditionGrade::parse(Some("A"));
    item.registration_date = Some(registered);
    item.thumbnail_url = Some(format!("https://img.example.com/items/{}.jpg", id));
    item.detail = Some(ListingDetail {
        name: item.name.clone(),
        image_url: item.thumbnail_url.clone(),
        content: "<p>BARBOUR waxed jacket in very good condition, grade A. Minor wear on cuffs only.</p>".to_string(),
    });
    item
}

/// An item registered `days_ago` days before `now`, priced by id
pub fn aged_item(id: ItemId, days_ago: i64, now: DateTime<Utc>) -> Item {
    let mut item = Item::new(id, format!("ZZ 상품 {}", id), "ZZ", id * 1_000);
    item.registration_date = Some(now - Duration::days(days_ago));
    item
}

pub fn pinned(mut item: Item, placement: Placement) -> Item {
    item.stored_tier = Some(placement.tier);
    item.stored_subtier = placement.subtier;
    item.manual_override = true;
    item
}

pub async fn seed_items(db: &SqlitePool, items: &[Item]) {
    let store = SqliteCatalogStore::new(db.clone());
    for item in items {
        store.upsert_item(item).await.expect("Should insert item");
    }
}

pub async fn set_raw_setting(db: &SqlitePool, key: &str, value: &str) {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await
    .expect("Should write setting");
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8")
}
