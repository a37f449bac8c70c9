//! Resumable scan loop
//!
//! Issues the first batch, then resumes after the last item id each batch
//! covered, until the catalog is exhausted or the token is cancelled.
//! Findings recorded before a cancellation stay.

use futures::StreamExt;
use resale_common::{Error, ItemId, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::scanner::{AuditScanner, BatchRequest};
use super::ScanEvent;

/// Resumption point held by the driving loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanCheckpoint {
    pub offset: usize,
    pub last_item_id: Option<ItemId>,
    pub total: usize,
    /// False until the first batch has reloaded the catalog read model
    pub cache_valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    /// Cancelled; a valid terminal state with partial findings
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub checkpoint: ScanCheckpoint,
    pub batches: usize,
    pub items_with_issues: usize,
}

/// Drive a full scan, reporting every event to `on_event`
pub async fn drive_scan<F>(
    scanner: &AuditScanner,
    session_id: Option<Uuid>,
    force: bool,
    cancel: &CancellationToken,
    mut on_event: F,
) -> Result<ScanOutcome>
where
    F: FnMut(&ScanEvent),
{
    let mut checkpoint = ScanCheckpoint::default();
    let mut batches = 0;
    let mut items_with_issues = 0;

    loop {
        if cancel.is_cancelled() {
            info!(offset = checkpoint.offset, "Audit scan stopped between batches");
            return Ok(ScanOutcome {
                status: ScanStatus::Stopped,
                checkpoint,
                batches,
                items_with_issues,
            });
        }

        let request = BatchRequest {
            session_id,
            offset: checkpoint.offset,
            after_id: checkpoint.last_item_id,
            force,
            refresh_catalog: !checkpoint.cache_valid,
        };
        let stream = scanner.scan_batch(request, cancel.clone());
        futures::pin_mut!(stream);

        let mut completion = None;
        while let Some(event) = stream.next().await {
            on_event(&event);
            match event {
                ScanEvent::Start { total, .. } => checkpoint.total = total,
                ScanEvent::Progress { ref issues, .. } if !issues.is_empty() => items_with_issues += 1,
                ScanEvent::Progress { .. } => {}
                ScanEvent::Complete {
                    next_offset,
                    last_item_id,
                    has_more,
                    cancelled,
                    ..
                } => completion = Some((next_offset, last_item_id, has_more, cancelled)),
                ScanEvent::Error { message } => return Err(Error::Internal(message)),
            }
        }

        let Some((next_offset, last_item_id, has_more, cancelled)) = completion else {
            return Err(Error::Internal("Scan batch ended without completing".to_string()));
        };
        batches += 1;
        checkpoint.offset = next_offset;
        checkpoint.last_item_id = last_item_id;
        checkpoint.cache_valid = true;

        if cancelled {
            info!(offset = checkpoint.offset, "Audit scan stopped mid-batch");
            return Ok(ScanOutcome {
                status: ScanStatus::Stopped,
                checkpoint,
                batches,
                items_with_issues,
            });
        }
        if !has_more {
            info!(batches, items_with_issues, "Audit scan completed");
            return Ok(ScanOutcome {
                status: ScanStatus::Completed,
                checkpoint,
                batches,
                items_with_issues,
            });
        }
    }
}
