use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::CanonicalAuthor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthorRow {
    pub id: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    pub handle: String,
    pub display_name: String,
    pub verified: bool,
    pub follower_count: i64,
    pub following_count: i64,
    pub heart_count: i64,
    pub post_count: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub total_items_collected: i64,
    pub location: Option<String>,
    pub language: Option<String>,
}

impl AuthorRow {
    pub async fn find(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }
}

/// Upsert an author keyed by `(provider, provider_user_id)`.
///
/// Statistics are last-write-wins; `total_items_collected` is bumped
/// atomically by `items_increment`; `last_updated_at` never moves backward.
/// Retries once on unique violation so two racing ingests both land.
pub async fn upsert_author(
    author: &CanonicalAuthor,
    items_increment: i64,
    pool: &PgPool,
) -> Result<Uuid> {
    match try_upsert(author, items_increment, pool).await {
        Ok(id) => Ok(id),
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(
                provider = %author.provider,
                handle = %author.handle,
                "Author upsert raced, retrying once"
            );
            try_upsert(author, items_increment, pool).await.map_err(Into::into)
        }
        Err(e) => Err(e.into()),
    }
}

async fn try_upsert(
    author: &CanonicalAuthor,
    items_increment: i64,
    pool: &PgPool,
) -> std::result::Result<Uuid, sqlx::Error> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO authors (
            id, provider, provider_user_id, handle, display_name, verified,
            follower_count, following_count, heart_count, post_count,
            first_seen_at, last_seen_at, last_updated_at,
            total_items_collected, location, language
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now(), now(), $11, $12, $13)
        ON CONFLICT (provider, provider_user_id) DO UPDATE SET
            handle = EXCLUDED.handle,
            display_name = EXCLUDED.display_name,
            verified = EXCLUDED.verified,
            follower_count = EXCLUDED.follower_count,
            following_count = EXCLUDED.following_count,
            heart_count = EXCLUDED.heart_count,
            post_count = EXCLUDED.post_count,
            last_seen_at = now(),
            last_updated_at = GREATEST(authors.last_updated_at, now()),
            total_items_collected = authors.total_items_collected + EXCLUDED.total_items_collected,
            location = COALESCE(EXCLUDED.location, authors.location),
            language = COALESCE(EXCLUDED.language, authors.language)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(author.provider.as_str())
    .bind(&author.provider_user_id)
    .bind(author.handle.to_lowercase())
    .bind(&author.display_name)
    .bind(author.verified)
    .bind(author.follower_count)
    .bind(author.following_count)
    .bind(author.heart_count)
    .bind(author.post_count)
    .bind(items_increment)
    .bind(&author.location)
    .bind(&author.language)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
