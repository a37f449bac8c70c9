//! Audit scan: batching, cancellation, resumption and the SSE endpoint

mod helpers;

use axum::http::StatusCode;
use chrono::Duration;
use helpers::*;
use resale_common::{AuditIssue, Item};
use futures::StreamExt;
use resale_tm::audit::{drive_scan, BatchRequest, ScanEvent, ScanStatus};
use resale_tm::db::findings;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;
use uuid::Uuid;

const BROKEN_IMAGE: &str = "https://img.example.com/items/8.jpg";

/// Nine items in three batches of three; items 2, 5 and 8 have one issue each
fn audit_catalog() -> Vec<Item> {
    let registered = resale_common::time::now() - Duration::days(3);
    (1..=9)
        .map(|id| {
            let mut item = clean_item(id, registered);
            match id {
                2 => item.sell_price = 0,
                5 => item.thumbnail_url = None,
                _ => {}
            }
            item
        })
        .collect()
}

async fn setup_audit() -> (SqlitePool, resale_tm::AppState) {
    let db = setup_test_db().await;
    seed_items(&db, &audit_catalog()).await;
    set_raw_setting(&db, "audit_batch_size", "3").await;

    let probe = StaticProbe {
        broken: HashSet::from([BROKEN_IMAGE.to_string()]),
        failing: HashSet::new(),
    };
    let state = setup_state_with_probe(db.clone(), probe);
    (db, state)
}

fn checked_ids(events: &[ScanEvent], skipped: bool) -> Vec<i64> {
    events
        .iter()
        .filter_map(|event| match event {
            ScanEvent::Progress {
                product_id,
                skipped: s,
                ..
            } if *s == skipped => Some(*product_id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_full_scan_runs_three_batches() {
    let (db, state) = setup_audit().await;
    let cancel = CancellationToken::new();
    let mut events = Vec::new();

    let outcome = drive_scan(&state.scanner, None, false, &cancel, |e| events.push(e.clone()))
        .await
        .unwrap();

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.batches, 3);
    assert_eq!(outcome.checkpoint.offset, 9);
    assert_eq!(outcome.checkpoint.total, 9);
    assert_eq!(outcome.items_with_issues, 3);
    assert_eq!(checked_ids(&events, false), (1..=9).collect::<Vec<_>>());

    let starts = events.iter().filter(|e| matches!(e, ScanEvent::Start { .. })).count();
    let completes = events.iter().filter(|e| matches!(e, ScanEvent::Complete { .. })).count();
    assert_eq!(starts, 3);
    assert_eq!(completes, 3);

    let recorded = findings::list_findings(&db).await.unwrap();
    let mut ids: Vec<i64> = recorded.iter().map(|f| f.item_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 5, 8]);

    let broken = findings::get_finding(&db, 8).await.unwrap().unwrap();
    assert!(broken.issues.contains(&AuditIssue::ImageBroken));
    let no_thumb = findings::get_finding(&db, 5).await.unwrap().unwrap();
    assert!(no_thumb.issues.contains(&AuditIssue::NoThumbnail));
}

#[tokio::test]
async fn test_cancel_between_batches_keeps_first_batch_only() {
    let (db, state) = setup_audit().await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let outcome = drive_scan(&state.scanner, None, false, &cancel, |event| {
        if matches!(event, ScanEvent::Complete { .. }) {
            trigger.cancel();
        }
    })
    .await
    .unwrap();

    assert_eq!(outcome.status, ScanStatus::Stopped);
    assert_eq!(outcome.batches, 1);
    assert_eq!(outcome.checkpoint.offset, 3);

    let recorded = findings::list_findings(&db).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].item_id, 2);
    assert!(findings::last_checked(&db, 4).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_before_start_checks_nothing() {
    let (db, state) = setup_audit().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = drive_scan(&state.scanner, None, false, &cancel, |_| {}).await.unwrap();

    assert_eq!(outcome.status, ScanStatus::Stopped);
    assert_eq!(outcome.batches, 0);
    assert_eq!(findings::count_findings(&db).await.unwrap(), 0);
}

async fn run_batch(state: &resale_tm::AppState, request: BatchRequest) -> Vec<ScanEvent> {
    state
        .scanner
        .scan_batch(request, CancellationToken::new())
        .collect()
        .await
}

fn last_item_id(events: &[ScanEvent]) -> Option<i64> {
    match events.last() {
        Some(ScanEvent::Complete { last_item_id, .. }) => *last_item_id,
        other => panic!("Batch should end with complete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_item_added_mid_scan_shifts_nothing() {
    let (_db, state) = setup_audit().await;
    let mut request = BatchRequest {
        session_id: None,
        offset: 0,
        after_id: None,
        force: false,
        refresh_catalog: true,
    };

    let first = run_batch(&state, request).await;
    assert_eq!(checked_ids(&first, false), vec![1, 2, 3]);

    // Lands below the cursor between batches
    state
        .catalog
        .upsert(clean_item(0, resale_common::time::now()))
        .await
        .unwrap();

    request.refresh_catalog = false;
    request.after_id = last_item_id(&first);
    let second = run_batch(&state, request).await;
    assert_eq!(checked_ids(&second, false), vec![4, 5, 6]);
    match &second[0] {
        ScanEvent::Start { offset, total, .. } => {
            assert_eq!(*offset, 4);
            assert_eq!(*total, 10);
        }
        other => panic!("Batch should open with start, got {:?}", other),
    }

    request.after_id = last_item_id(&second);
    let third = run_batch(&state, request).await;
    assert_eq!(checked_ids(&third, false), vec![7, 8, 9]);
    match third.last() {
        Some(ScanEvent::Complete { has_more, next_offset, .. }) => {
            assert!(!has_more);
            assert_eq!(*next_offset, 10);
        }
        other => panic!("Batch should end with complete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resumed_scan_skips_recently_checked_items() {
    let (_db, state) = setup_audit().await;

    let first = CancellationToken::new();
    let trigger = first.clone();
    drive_scan(&state.scanner, None, false, &first, |event| {
        if matches!(event, ScanEvent::Complete { .. }) {
            trigger.cancel();
        }
    })
    .await
    .unwrap();

    let mut events = Vec::new();
    let outcome = drive_scan(&state.scanner, None, false, &CancellationToken::new(), |e| {
        events.push(e.clone())
    })
    .await
    .unwrap();

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(checked_ids(&events, true), vec![1, 2, 3]);
    assert_eq!(checked_ids(&events, false), (4..=9).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_forced_scan_rechecks_everything() {
    let (_db, state) = setup_audit().await;
    drive_scan(&state.scanner, None, false, &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    let mut events = Vec::new();
    drive_scan(&state.scanner, None, true, &CancellationToken::new(), |e| events.push(e.clone()))
        .await
        .unwrap();

    assert!(checked_ids(&events, true).is_empty());
    assert_eq!(checked_ids(&events, false).len(), 9);
}

#[tokio::test]
async fn test_probe_failure_is_reported_as_scan_error() {
    let db = setup_test_db().await;
    let item = clean_item(1, resale_common::time::now());
    let url = item.thumbnail_url.clone().unwrap();
    seed_items(&db, &[item]).await;
    let probe = StaticProbe {
        broken: HashSet::new(),
        failing: HashSet::from([url]),
    };
    let state = setup_state_with_probe(db, probe);

    let issues = state.scanner.recheck(1).await.unwrap().unwrap();
    assert!(issues.contains(&AuditIssue::ScanError));
    assert!(!issues.contains(&AuditIssue::ImageBroken));
}

#[tokio::test]
async fn test_recheck_clears_fixed_finding() {
    let (db, state) = setup_audit().await;
    state.catalog.refresh().await.unwrap();

    let issues = state.scanner.recheck(2).await.unwrap().unwrap();
    assert!(issues.contains(&AuditIssue::PriceZero));
    assert!(findings::get_finding(&db, 2).await.unwrap().is_some());

    let mut fixed = state.catalog.get(2).await.unwrap().unwrap();
    fixed.sell_price = 89_000;
    state.catalog.upsert(fixed).await.unwrap();

    let issues = state.scanner.recheck(2).await.unwrap().unwrap();
    assert!(issues.is_empty());
    assert!(findings::get_finding(&db, 2).await.unwrap().is_none());
    assert!(findings::last_checked(&db, 2).await.unwrap().is_some());

    assert!(state.scanner.recheck(404).await.unwrap().is_none());
}

// =============================================================================
// HTTP endpoints
// =============================================================================

fn sse_payloads(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("SSE data should be JSON"))
        .collect()
}

#[tokio::test]
async fn test_scan_endpoint_streams_one_batch() {
    let (_db, state) = setup_audit().await;
    let app = resale_tm::build_router(state.clone());

    let response = app
        .oneshot(json_request("POST", "/api/audit/scan", json!({ "offset": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_text(response.into_body()).await;
    let payloads = sse_payloads(&body);
    assert_eq!(payloads.first().unwrap()["type"], "start");
    assert_eq!(payloads.first().unwrap()["total"], 9);
    assert_eq!(payloads.iter().filter(|p| p["type"] == "progress").count(), 3);

    let complete = payloads.last().unwrap();
    assert_eq!(complete["type"], "complete");
    assert_eq!(complete["next_offset"], 3);
    assert_eq!(complete["has_more"], true);
    assert_eq!(complete["cancelled"], false);
    assert_eq!(complete["last_item_id"], 3);

    // An unfinished scan keeps its session open for the next batch
    let session_id: Uuid = serde_json::from_value(payloads[0]["session_id"].clone()).unwrap();
    assert!(state.scan_sessions.contains(session_id).await);
}

#[tokio::test]
async fn test_cancel_endpoint_stops_next_batch() {
    let (_db, state) = setup_audit().await;
    let session_id = Uuid::new_v4();

    let first = resale_tm::build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/audit/scan",
            json!({ "session_id": session_id, "offset": 0 }),
        ))
        .await
        .unwrap();
    extract_text(first.into_body()).await;

    let cancel = resale_tm::build_router(state.clone())
        .oneshot(test_request("POST", &format!("/api/audit/scan/{}/cancel", session_id)))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);
    let body = extract_json(cancel.into_body()).await;
    assert_eq!(body["cancelled"], true);

    let second = resale_tm::build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/audit/scan",
            json!({ "session_id": session_id, "offset": 3 }),
        ))
        .await
        .unwrap();
    let payloads = sse_payloads(&extract_text(second.into_body()).await);
    let complete = payloads.last().unwrap();
    assert_eq!(complete["type"], "complete");
    assert_eq!(complete["cancelled"], true);
    assert_eq!(complete["next_offset"], 3);
    assert_eq!(complete["batch_processed"], 0);

    // The cancelled batch closed the session; reusing the id starts afresh
    assert!(state.scan_sessions.is_empty().await);

    let third = resale_tm::build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/audit/scan",
            json!({ "session_id": session_id, "after_id": 3 }),
        ))
        .await
        .unwrap();
    let payloads = sse_payloads(&extract_text(third.into_body()).await);
    let complete = payloads.last().unwrap();
    assert_eq!(complete["cancelled"], false);
    assert_eq!(complete["batch_processed"], 3);
    assert_eq!(complete["last_item_id"], 6);
}

#[tokio::test]
async fn test_finished_scan_closes_its_session() {
    let (_db, state) = setup_audit().await;
    let session_id = Uuid::new_v4();

    let response = resale_tm::build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/audit/scan",
            json!({ "session_id": session_id, "after_id": 6 }),
        ))
        .await
        .unwrap();
    let payloads = sse_payloads(&extract_text(response.into_body()).await);
    let complete = payloads.last().unwrap();
    assert_eq!(complete["has_more"], false);

    assert!(!state.scan_sessions.contains(session_id).await);
    let cancel = resale_tm::build_router(state)
        .oneshot(test_request("POST", &format!("/api/audit/scan/{}/cancel", session_id)))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_unknown_session_is_not_found() {
    let (_db, state) = setup_audit().await;
    let response = resale_tm::build_router(state)
        .oneshot(test_request("POST", &format!("/api/audit/scan/{}/cancel", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_recheck_and_findings_endpoints() {
    let (_db, state) = setup_audit().await;

    let response = resale_tm::build_router(state.clone())
        .oneshot(test_request("POST", "/api/audit/recheck/5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["issues"], json!(["NO_THUMBNAIL"]));

    let response = resale_tm::build_router(state.clone())
        .oneshot(test_request("GET", "/api/audit/findings"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["findings"][0]["item_id"], 5);

    let response = resale_tm::build_router(state)
        .oneshot(test_request("POST", "/api/audit/recheck/404"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
