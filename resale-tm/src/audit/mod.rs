//! Audit scan pipeline
//!
//! A scan is a sequence of bounded batches over the catalog in ascending id
//! order. [`scanner::AuditScanner`] runs one batch and streams
//! [`ScanEvent`]s; [`driver::drive_scan`] is the resumable loop that issues
//! batches until the catalog is exhausted or the session is cancelled.

pub mod checks;
pub mod driver;
pub mod probe;
pub mod scanner;
pub mod sessions;

use resale_common::{AuditIssue, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub use driver::{drive_scan, ScanCheckpoint, ScanOutcome, ScanStatus};
pub use probe::{HttpImageProbe, ImageProbe, ProbeError};
pub use scanner::{AuditScanner, BatchRequest};
pub use sessions::ScanSessions;

/// Progress of one scan batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    Start {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<Uuid>,
        /// Catalog size
        total: usize,
        offset: usize,
        batch_size: usize,
        message: String,
    },
    Progress {
        /// 1-based position in the catalog
        current: usize,
        total: usize,
        product_id: ItemId,
        issues: Vec<AuditIssue>,
        /// Checked within the freshness window and not re-checked
        skipped: bool,
        message: String,
    },
    Complete {
        current: usize,
        total: usize,
        next_offset: usize,
        /// Last item covered; the next batch resumes after it
        #[serde(skip_serializing_if = "Option::is_none")]
        last_item_id: Option<ItemId>,
        has_more: bool,
        /// Items covered so far, counting earlier batches
        total_processed: usize,
        /// Items covered by this batch
        batch_processed: usize,
        cancelled: bool,
        issue_counts: BTreeMap<AuditIssue, usize>,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ScanEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::Start { .. } => "start",
            ScanEvent::Progress { .. } => "progress",
            ScanEvent::Complete { .. } => "complete",
            ScanEvent::Error { .. } => "error",
        }
    }
}
