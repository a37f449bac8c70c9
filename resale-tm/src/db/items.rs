//! Catalog item persistence
//!
//! SQLite implementation of [`CatalogStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resale_common::time::parse_timestamp;
use resale_common::{BrandTier, ConditionGrade, Item, ItemId, ListingDetail, Placement, Result, Tier};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::warn;

use crate::catalog::CatalogStore;

const ITEM_COLUMNS: &str = "id, name, brand, brand_tier, sell_price, condition_grade, registration_date, \
     lifecycle_anchor, thumbnail_url, tier, subtier, manual_override, suggested_subtier, \
     suggestion_confidence, detail_name, detail_image_url, detail_content";

/// [`CatalogStore`] backed by the `items` table
#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

fn item_from_row(row: &SqliteRow) -> Item {
    let id: i64 = row.get("id");

    let tier: Option<String> = row.get("tier");
    let stored_tier = tier.and_then(|t| match t.parse::<Tier>() {
        Ok(tier) => Some(tier),
        Err(e) => {
            warn!(item_id = id, error = %e, "Ignoring unreadable stored tier");
            None
        }
    });

    let brand_tier: Option<String> = row.get("brand_tier");
    let grade: Option<String> = row.get("condition_grade");
    let registration: Option<String> = row.get("registration_date");
    let anchor: Option<String> = row.get("lifecycle_anchor");
    let confidence: Option<i64> = row.get("suggestion_confidence");

    let detail_name: Option<String> = row.get("detail_name");
    let detail_content: Option<String> = row.get("detail_content");
    let detail_image_url: Option<String> = row.get("detail_image_url");
    let detail = match (detail_name, detail_content) {
        (None, None) => None,
        (name, content) => Some(ListingDetail {
            name: name.unwrap_or_default(),
            image_url: detail_image_url,
            content: content.unwrap_or_default(),
        }),
    };

    Item {
        id,
        name: row.get("name"),
        brand: row.get("brand"),
        brand_tier: BrandTier::parse(brand_tier.as_deref()),
        sell_price: row.get("sell_price"),
        grade: ConditionGrade::parse(grade.as_deref()),
        registration_date: registration.as_deref().and_then(parse_timestamp),
        lifecycle_anchor: anchor.as_deref().and_then(parse_timestamp),
        thumbnail_url: row.get("thumbnail_url"),
        stored_tier,
        stored_subtier: row.get("subtier"),
        manual_override: row.get::<i64, _>("manual_override") != 0,
        suggested_subtier: row.get("suggested_subtier"),
        suggestion_confidence: confidence.and_then(|c| u8::try_from(c).ok()),
        detail,
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn load_all(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!("SELECT {} FROM items ORDER BY id ASC", ITEM_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn load(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(item_from_row))
    }

    async fn existing_ids(&self, ids: &[ItemId]) -> Result<Vec<ItemId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM items WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let found: Vec<i64> = builder.build_query_scalar::<i64>().fetch_all(&self.pool).await?;
        Ok(found)
    }

    async fn set_manual_placement(&self, ids: &[ItemId], placement: &Placement) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                "UPDATE items SET tier = ?, subtier = ?, manual_override = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(placement.tier.as_str())
            .bind(placement.subtier.as_deref())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_placement(&self, ids: &[ItemId]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                "UPDATE items SET tier = NULL, subtier = NULL, manual_override = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_placements(&self, placements: &[(ItemId, Placement)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (id, placement) in placements {
            sqlx::query("UPDATE items SET tier = ?, subtier = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
                .bind(placement.tier.as_str())
                .bind(placement.subtier.as_deref())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_item(&self, item: &Item) -> Result<()> {
        let detail = item.detail.as_ref();
        sqlx::query(
            r#"
            INSERT INTO items (
                id, name, brand, brand_tier, sell_price, condition_grade, registration_date,
                lifecycle_anchor, thumbnail_url, tier, subtier, manual_override, suggested_subtier,
                suggestion_confidence, detail_name, detail_image_url, detail_content, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                brand = excluded.brand,
                brand_tier = excluded.brand_tier,
                sell_price = excluded.sell_price,
                condition_grade = excluded.condition_grade,
                registration_date = excluded.registration_date,
                lifecycle_anchor = excluded.lifecycle_anchor,
                thumbnail_url = excluded.thumbnail_url,
                tier = excluded.tier,
                subtier = excluded.subtier,
                manual_override = excluded.manual_override,
                suggested_subtier = excluded.suggested_subtier,
                suggestion_confidence = excluded.suggestion_confidence,
                detail_name = excluded.detail_name,
                detail_image_url = excluded.detail_image_url,
                detail_content = excluded.detail_content,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.brand)
        .bind(item.brand_tier.map(|t| t.as_str()))
        .bind(item.sell_price)
        .bind(item.grade.as_str())
        .bind(format_timestamp(item.registration_date))
        .bind(format_timestamp(item.lifecycle_anchor))
        .bind(item.thumbnail_url.as_deref())
        .bind(item.stored_tier.map(|t| t.as_str()))
        .bind(item.stored_subtier.as_deref())
        .bind(item.manual_override as i64)
        .bind(item.suggested_subtier.as_deref())
        .bind(item.suggestion_confidence.map(i64::from))
        .bind(detail.map(|d| d.name.as_str()))
        .bind(detail.and_then(|d| d.image_url.as_deref()))
        .bind(detail.map(|d| d.content.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resale_common::db::init_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> SqliteCatalogStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        SqliteCatalogStore::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_and_load_roundtrip() {
        let store = setup_store().await;

        let mut item = Item::new(42, "BARBOUR 비데일 자켓", "BARBOUR", 129_000);
        item.grade = ConditionGrade::S;
        item.brand_tier = Some(BrandTier::Premium);
        item.registration_date = parse_timestamp("2026-01-02T03:04:05Z");
        item.stored_tier = Some(Tier::Archive);
        item.stored_subtier = Some("british".to_string());
        item.suggestion_confidence = Some(88);
        item.detail = Some(ListingDetail {
            name: "BARBOUR 비데일 자켓".to_string(),
            image_url: Some("https://img.example/a/b.jpg".to_string()),
            content: "<p>GRADE: S</p>".to_string(),
        });
        store.upsert_item(&item).await.unwrap();

        let loaded = store.load(42).await.unwrap().unwrap();
        assert_eq!(loaded, item);
        assert!(store.load(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_placement_writes() {
        let store = setup_store().await;
        for id in 1..=3 {
            store.upsert_item(&Item::new(id, "X", "Y", 1)).await.unwrap();
        }

        store
            .set_manual_placement(&[1, 2], &Placement::new(Tier::Archive, Some("military".to_string())))
            .await
            .unwrap();
        let one = store.load(1).await.unwrap().unwrap();
        assert!(one.manual_override);
        assert_eq!(one.stored_subtier.as_deref(), Some("military"));

        store.write_placements(&[(2, Placement::tier(Tier::Clearance))]).await.unwrap();
        let two = store.load(2).await.unwrap().unwrap();
        assert_eq!(two.stored_tier, Some(Tier::Clearance));
        assert_eq!(two.stored_subtier, None);
        assert!(two.manual_override, "rebalance writes keep the override flag");

        store.clear_placement(&[1]).await.unwrap();
        let one = store.load(1).await.unwrap().unwrap();
        assert!(!one.manual_override);
        assert_eq!(one.stored_tier, None);

        assert_eq!(store.existing_ids(&[3, 9, 1]).await.unwrap(), vec![1, 3]);
    }
}
