use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::CounterSet;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub item_id: Uuid,
    pub snapshot_at: DateTime<Utc>,
    pub view_count: i64,
    pub like_count: i64,
    pub share_count: i64,
    pub comment_count: i64,
    pub quote_count: i64,
    pub bookmark_count: i64,
    pub collect_count: i64,
    pub delta_view: i64,
    pub delta_like: i64,
    pub delta_share: i64,
    pub delta_comment: i64,
    pub delta_quote: i64,
    pub delta_bookmark: i64,
    pub delta_collect: i64,
    pub velocity: f64,
}

impl SnapshotRow {
    pub fn counters(&self) -> CounterSet {
        CounterSet {
            view: self.view_count,
            like: self.like_count,
            share: self.share_count,
            comment: self.comment_count,
            quote: self.quote_count,
            bookmark: self.bookmark_count,
            collect: self.collect_count,
        }
    }

    pub fn deltas(&self) -> CounterSet {
        CounterSet {
            view: self.delta_view,
            like: self.delta_like,
            share: self.delta_share,
            comment: self.delta_comment,
            quote: self.delta_quote,
            bookmark: self.delta_bookmark,
            collect: self.delta_collect,
        }
    }

    /// All snapshots for an item in append order.
    pub async fn list_for_item(item_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM engagement_history WHERE item_id = $1 ORDER BY snapshot_at ASC",
        )
        .bind(item_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn latest_for_item(item_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM engagement_history WHERE item_id = $1
             ORDER BY snapshot_at DESC LIMIT 1",
        )
        .bind(item_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}

/// Append-only snapshot write. Ordering is the append order; callers never
/// update or delete history rows.
pub async fn append_snapshot(
    item_id: Uuid,
    counters: CounterSet,
    deltas: CounterSet,
    velocity: f64,
    pool: &PgPool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO engagement_history (
            item_id, snapshot_at,
            view_count, like_count, share_count, comment_count,
            quote_count, bookmark_count, collect_count,
            delta_view, delta_like, delta_share, delta_comment,
            delta_quote, delta_bookmark, delta_collect,
            velocity
        )
        VALUES ($1, now(), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(item_id)
    .bind(counters.view)
    .bind(counters.like)
    .bind(counters.share)
    .bind(counters.comment)
    .bind(counters.quote)
    .bind(counters.bookmark)
    .bind(counters.collect)
    .bind(deltas.view)
    .bind(deltas.like)
    .bind(deltas.share)
    .bind(deltas.comment)
    .bind(deltas.quote)
    .bind(deltas.bookmark)
    .bind(deltas.collect)
    .bind(velocity)
    .execute(pool)
    .await?;
    Ok(())
}
