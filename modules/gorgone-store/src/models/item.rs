use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::{CanonicalItem, CounterSet};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub provider: String,
    pub provider_item_id: String,
    pub author_id: Option<Uuid>,
    pub text: String,
    pub language: Option<String>,
    pub created_at_source: DateTime<Utc>,
    pub reply_to_item_id: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub share_count: i64,
    pub comment_count: i64,
    pub quote_count: i64,
    pub bookmark_count: i64,
    pub collect_count: i64,
    pub has_links: bool,
    pub raw_payload: serde_json::Value,
    pub predictions: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ItemRow {
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

    pub async fn find(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, zone_id, provider, provider_item_id, author_id, text, language,
                    created_at_source, reply_to_item_id,
                    view_count, like_count, share_count, comment_count,
                    quote_count, bookmark_count, collect_count,
                    has_links, raw_payload, predictions, created_at
             FROM items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}

/// Result of an insert-if-absent. The duplicate case is a normal outcome,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: Uuid,
    pub inserted: bool,
}

/// Insert an item and its entities in one transaction, keyed by
/// `(provider, provider_item_id)`. When the item already exists, returns the
/// existing id with `inserted = false` and writes nothing.
pub async fn insert_item_if_absent(
    zone_id: Uuid,
    item: &CanonicalItem,
    author_id: Option<Uuid>,
    pool: &PgPool,
) -> Result<InsertOutcome> {
    let mut tx = pool.begin().await?;

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO items (
            id, zone_id, provider, provider_item_id, author_id, text, language,
            created_at_source, reply_to_item_id,
            view_count, like_count, share_count, comment_count,
            quote_count, bookmark_count, collect_count,
            has_links, raw_payload, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                $10, $11, $12, $13, $14, $15, $16, $17, $18, now())
        ON CONFLICT (provider, provider_item_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(zone_id)
    .bind(item.provider.as_str())
    .bind(&item.provider_item_id)
    .bind(author_id)
    .bind(&item.text)
    .bind(&item.language)
    .bind(item.created_at_source)
    .bind(&item.reply_to_provider_item_id)
    .bind(item.counters.view)
    .bind(item.counters.like)
    .bind(item.counters.share)
    .bind(item.counters.comment)
    .bind(item.counters.quote)
    .bind(item.counters.bookmark)
    .bind(item.counters.collect)
    .bind(item.has_links)
    .bind(&item.raw_payload)
    .fetch_optional(&mut *tx)
    .await?;

    let outcome = match inserted {
        Some((id,)) => {
            // Dedup entities within the item before writing.
            let mut seen = HashSet::new();
            for entity in &item.entities {
                if !seen.insert((entity.kind, entity.normalized_value.clone())) {
                    continue;
                }
                sqlx::query(
                    r#"
                    INSERT INTO entities (id, item_id, zone_id, kind, value, normalized_value)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (item_id, kind, normalized_value) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(zone_id)
                .bind(entity.kind.as_str())
                .bind(&entity.value)
                .bind(&entity.normalized_value)
                .execute(&mut *tx)
                .await?;
            }
            InsertOutcome { id, inserted: true }
        }
        None => {
            let (id,): (Uuid,) = sqlx::query_as(
                "SELECT id FROM items WHERE provider = $1 AND provider_item_id = $2",
            )
            .bind(item.provider.as_str())
            .bind(&item.provider_item_id)
            .fetch_one(&mut *tx)
            .await?;
            InsertOutcome {
                id,
                inserted: false,
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Overwrite an item's live counters, returning the pre-image in the same
/// statement so delta computation never races a concurrent update.
pub async fn update_item_counters(
    item_id: Uuid,
    counters: CounterSet,
    pool: &PgPool,
) -> Result<CounterSet> {
    let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        UPDATE items SET
            view_count = $2, like_count = $3, share_count = $4, comment_count = $5,
            quote_count = $6, bookmark_count = $7, collect_count = $8
        FROM items AS old
        WHERE items.id = $1 AND old.id = items.id
        RETURNING old.view_count, old.like_count, old.share_count, old.comment_count,
                  old.quote_count, old.bookmark_count, old.collect_count
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
    .fetch_one(pool)
    .await?;

    Ok(CounterSet {
        view: row.0,
        like: row.1,
        share: row.2,
        comment: row.3,
        quote: row.4,
        bookmark: row.5,
        collect: row.6,
    })
}

/// Store the recomputed prediction document on an item.
pub async fn set_predictions(
    item_id: Uuid,
    predictions: &serde_json::Value,
    pool: &PgPool,
) -> Result<()> {
    sqlx::query("UPDATE items SET predictions = $2 WHERE id = $1")
        .bind(item_id)
        .bind(predictions)
        .execute(pool)
        .await?;
    Ok(())
}
