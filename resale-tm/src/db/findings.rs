//! Audit finding persistence
//!
//! `audit_checks` remembers when each item was last checked;
//! `audit_findings` only holds items that currently have issues.

use chrono::{DateTime, SecondsFormat, Utc};
use resale_common::time::parse_timestamp;
use resale_common::{AuditFinding, AuditIssue, Error, ItemId, Result};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;

/// Record the outcome of checking one item
///
/// Upserts the finding when `issues` is non-empty and deletes it otherwise,
/// all in one transaction with the check timestamp.
pub async fn record_check(
    pool: &SqlitePool,
    item_id: ItemId,
    issues: &BTreeSet<AuditIssue>,
    checked_at: DateTime<Utc>,
) -> Result<()> {
    let checked_at = checked_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO audit_checks (item_id, checked_at) VALUES (?, ?)
        ON CONFLICT(item_id) DO UPDATE SET checked_at = excluded.checked_at
        "#,
    )
    .bind(item_id)
    .bind(&checked_at)
    .execute(&mut *tx)
    .await?;

    if issues.is_empty() {
        sqlx::query("DELETE FROM audit_findings WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
    } else {
        let issues_json = serde_json::to_string(issues)
            .map_err(|e| Error::Internal(format!("Serialize audit issues failed: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO audit_findings (item_id, issues, checked_at) VALUES (?, ?, ?)
            ON CONFLICT(item_id) DO UPDATE SET
                issues = excluded.issues,
                checked_at = excluded.checked_at
            "#,
        )
        .bind(item_id)
        .bind(issues_json)
        .bind(&checked_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// When the item was last checked, if ever
pub async fn last_checked(pool: &SqlitePool, item_id: ItemId) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = sqlx::query_scalar("SELECT checked_at FROM audit_checks WHERE item_id = ?")
        .bind(item_id)
        .fetch_optional(pool)
        .await?;
    Ok(value.as_deref().and_then(parse_timestamp))
}

fn finding_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditFinding> {
    let item_id: i64 = row.get("item_id");
    let issues_json: String = row.get("issues");
    let checked_at: String = row.get("checked_at");

    let issues: BTreeSet<AuditIssue> = serde_json::from_str(&issues_json)
        .map_err(|e| Error::Internal(format!("Corrupt audit issues for item {}: {}", item_id, e)))?;
    let checked_at = parse_timestamp(&checked_at)
        .ok_or_else(|| Error::Internal(format!("Corrupt checked_at for item {}", item_id)))?;

    Ok(AuditFinding {
        item_id,
        issues,
        checked_at,
    })
}

/// All recorded findings, newest first
pub async fn list_findings(pool: &SqlitePool) -> Result<Vec<AuditFinding>> {
    let rows = sqlx::query("SELECT item_id, issues, checked_at FROM audit_findings ORDER BY checked_at DESC, item_id ASC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(finding_from_row).collect()
}

pub async fn get_finding(pool: &SqlitePool, item_id: ItemId) -> Result<Option<AuditFinding>> {
    let row = sqlx::query("SELECT item_id, issues, checked_at FROM audit_findings WHERE item_id = ?")
        .bind(item_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(finding_from_row).transpose()
}

pub async fn count_findings(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_findings")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
