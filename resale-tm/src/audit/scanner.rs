//! One audit scan batch
//!
//! A batch pages `batch_size` items from the shared catalog read model,
//! checks them one at a time and records a check timestamp for each. Later
//! batches resume after the last item id covered, so items added to the
//! catalog mid-scan never cause a repeat or a gap. The
//! session's cancellation token is consulted before every item; a cancelled
//! batch still completes, reporting the first unprocessed offset.

use chrono::{DateTime, Duration, Utc};
use futures::stream::Stream;
use resale_common::events::{CatalogEvent, EventBus};
use resale_common::{AuditIssue, Item, ItemId, Result};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checks::structural_issues;
use super::probe::ImageProbe;
use super::ScanEvent;
use crate::catalog::Catalog;
use crate::db::{findings, settings};

/// Parameters of one batch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRequest {
    pub session_id: Option<Uuid>,
    /// Position to start from when `after_id` is absent
    pub offset: usize,
    /// Resume after this item id; wins over `offset`
    pub after_id: Option<ItemId>,
    /// Re-check items even if checked within the freshness window
    pub force: bool,
    /// Reload the catalog read model before paging (first batch of a scan)
    pub refresh_catalog: bool,
}

#[derive(Clone)]
pub struct AuditScanner {
    db: SqlitePool,
    catalog: Catalog,
    probe: Arc<dyn ImageProbe>,
    event_bus: EventBus,
}

impl AuditScanner {
    pub fn new(db: SqlitePool, catalog: Catalog, probe: Arc<dyn ImageProbe>, event_bus: EventBus) -> Self {
        Self {
            db,
            catalog,
            probe,
            event_bus,
        }
    }

    /// Run every check on one item
    ///
    /// Probe failures become [`AuditIssue::ScanError`] instead of errors.
    pub async fn check_item(&self, item: &Item) -> BTreeSet<AuditIssue> {
        let mut issues = structural_issues(item);

        if let Some(url) = item.thumbnail_url.as_deref().filter(|u| !u.trim().is_empty()) {
            match self.probe.is_reachable(url).await {
                Ok(true) => {}
                Ok(false) => {
                    issues.insert(AuditIssue::ImageBroken);
                }
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Image probe failed");
                    issues.insert(AuditIssue::ScanError);
                }
            }
        }

        issues
    }

    /// Check one item and persist the outcome
    pub async fn check_and_record(&self, item: &Item, now: DateTime<Utc>) -> Result<BTreeSet<AuditIssue>> {
        let issues = self.check_item(item).await;
        findings::record_check(&self.db, item.id, &issues, now).await?;

        if !issues.is_empty() {
            self.event_bus.emit_lossy(CatalogEvent::AuditFindingRecorded {
                item_id: item.id,
                issues: issues.iter().copied().collect(),
                timestamp: now,
            });
        }

        Ok(issues)
    }

    /// Force a single-item check, ignoring the freshness window
    pub async fn recheck(&self, id: ItemId) -> Result<Option<BTreeSet<AuditIssue>>> {
        let Some(item) = self.catalog.get(id).await? else {
            return Ok(None);
        };
        let issues = self.check_and_record(&item, resale_common::time::now()).await?;
        info!(item_id = id, issues = issues.len(), "Item re-checked");
        Ok(Some(issues))
    }

    async fn recently_checked(&self, id: ItemId, window: Duration, now: DateTime<Utc>) -> Result<bool> {
        Ok(findings::last_checked(&self.db, id)
            .await?
            .is_some_and(|checked_at| now - checked_at < window))
    }

    /// Stream one batch
    ///
    /// Ends with exactly one `complete` event, or with one `error` event if
    /// settings or storage fail.
    pub fn scan_batch(
        &self,
        request: BatchRequest,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ScanEvent> + Send + 'static {
        let scanner = self.clone();

        async_stream::stream! {
            let (batch_size, freshness_hours) = match (
                settings::get_audit_batch_size(&scanner.db).await,
                settings::get_audit_freshness_hours(&scanner.db).await,
            ) {
                (Ok(size), Ok(hours)) => (size, hours),
                (Err(e), _) | (_, Err(e)) => {
                    yield ScanEvent::Error { message: e.to_string() };
                    return;
                }
            };
            let window = Duration::hours(freshness_hours);

            if request.refresh_catalog {
                if let Err(e) = scanner.catalog.refresh().await {
                    yield ScanEvent::Error { message: e.to_string() };
                    return;
                }
            }

            let paged = match request.after_id {
                Some(after) => scanner.catalog.page_after(after, batch_size).await,
                None => scanner.catalog.page(request.offset, batch_size).await.map(|(page, total)| {
                    let start = request.offset.min(total);
                    (page, start, total)
                }),
            };
            let (page, start, total) = match paged {
                Ok(paged) => paged,
                Err(e) => {
                    yield ScanEvent::Error { message: e.to_string() };
                    return;
                }
            };

            info!(
                offset = start,
                after_id = ?request.after_id,
                batch = page.len(),
                total,
                force = request.force,
                "Audit batch started"
            );
            yield ScanEvent::Start {
                session_id: request.session_id,
                total,
                offset: start,
                batch_size,
                message: format!("Scanning {} of {} items from offset {}", page.len(), total, start),
            };

            let mut next_offset = start;
            let mut last_item_id = request.after_id;
            let mut cancelled = false;
            let mut issue_counts: BTreeMap<AuditIssue, usize> = BTreeMap::new();

            for item in &page {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let current = next_offset + 1;
                let now = resale_common::time::now();

                if !request.force {
                    match scanner.recently_checked(item.id, window, now).await {
                        Ok(true) => {
                            debug!(item_id = item.id, "Skipping recently checked item");
                            next_offset = current;
                            last_item_id = Some(item.id);
                            yield ScanEvent::Progress {
                                current,
                                total,
                                product_id: item.id,
                                issues: Vec::new(),
                                skipped: true,
                                message: "recently checked".to_string(),
                            };
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            yield ScanEvent::Error { message: e.to_string() };
                            return;
                        }
                    }
                }

                let issues = match scanner.check_and_record(item, now).await {
                    Ok(issues) => issues,
                    Err(e) => {
                        yield ScanEvent::Error { message: e.to_string() };
                        return;
                    }
                };
                for issue in &issues {
                    *issue_counts.entry(*issue).or_default() += 1;
                }

                next_offset = current;
                last_item_id = Some(item.id);
                let message = if issues.is_empty() {
                    "ok".to_string()
                } else {
                    let codes: Vec<&str> = issues.iter().map(|i| i.as_str()).collect();
                    format!("{} issue(s): {}", issues.len(), codes.join(", "))
                };
                yield ScanEvent::Progress {
                    current,
                    total,
                    product_id: item.id,
                    issues: issues.into_iter().collect(),
                    skipped: false,
                    message,
                };
            }

            let batch_processed = next_offset - start;
            let has_more = next_offset < total;
            info!(
                next_offset,
                batch_processed,
                has_more,
                cancelled,
                "Audit batch complete"
            );
            yield ScanEvent::Complete {
                current: next_offset,
                total,
                next_offset,
                last_item_id,
                has_more,
                total_processed: next_offset,
                batch_processed,
                cancelled,
                issue_counts,
                message: if cancelled {
                    format!("Cancelled at offset {}", next_offset)
                } else {
                    format!("Scanned {} items ({}/{})", batch_processed, next_offset, total)
                },
            };
        }
    }
}
