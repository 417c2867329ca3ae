use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::Tier;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackingRow {
    pub item_id: Uuid,
    pub tier: String,
    pub next_update_at: Option<DateTime<Utc>>,
    pub update_count: i64,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub consecutive_zero_deltas: i32,
}

impl TrackingRow {
    pub fn tier(&self) -> Tier {
        Tier::parse(&self.tier).unwrap_or(Tier::Cold)
    }

    pub async fn find(item_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM engagement_tracking WHERE item_id = $1")
            .bind(item_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }
}

/// Create the tracking row for a freshly ingested item. Idempotent: a
/// second ingest of the same item leaves the existing row untouched.
pub async fn ensure_tracking(
    item_id: Uuid,
    tier: Tier,
    next_update_at: Option<DateTime<Utc>>,
    pool: &PgPool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO engagement_tracking (item_id, tier, next_update_at, update_count, consecutive_zero_deltas)
        VALUES ($1, $2, $3, 0, 0)
        ON CONFLICT (item_id) DO NOTHING
        "#,
    )
    .bind(item_id)
    .bind(tier.as_str())
    .bind(next_update_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a completed refresh: bump `update_count` in a single conditional
/// update and store the recomputed tier and schedule. Returns the new
/// `update_count`.
pub async fn complete_refresh(
    item_id: Uuid,
    tier: Tier,
    next_update_at: Option<DateTime<Utc>>,
    consecutive_zero_deltas: i32,
    pool: &PgPool,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        UPDATE engagement_tracking SET
            tier = $2,
            next_update_at = $3,
            update_count = update_count + 1,
            last_updated_at = now(),
            consecutive_zero_deltas = $4
        WHERE item_id = $1
        RETURNING update_count
        "#,
    )
    .bind(item_id)
    .bind(tier.as_str())
    .bind(next_update_at)
    .bind(consecutive_zero_deltas)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Stop tracking an item whose provider record is gone. No snapshot is
/// written; the tier becomes terminal.
pub async fn mark_cold(item_id: Uuid, pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE engagement_tracking SET
            tier = 'cold',
            next_update_at = NULL,
            last_updated_at = now()
        WHERE item_id = $1
        "#,
    )
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(())
}
