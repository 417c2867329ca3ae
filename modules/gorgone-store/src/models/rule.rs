use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::{Provider, RuleKind};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RuleRow {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub name: String,
    pub provider: String,
    pub kind: String,
    pub query_spec: String,
    pub interval_seconds: i64,
    pub is_active: bool,
    pub external_rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub total_items_collected: i64,
    pub last_item_count: i32,
}

impl RuleRow {
    pub fn kind(&self) -> Option<RuleKind> {
        RuleKind::parse(&self.kind)
    }

    pub fn provider(&self) -> Option<Provider> {
        Provider::parse(&self.provider)
    }

    pub async fn find(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM rules WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Resolve a webhook delivery back to its rule via the provider-side id.
    pub async fn find_by_external_id(external_id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM rules WHERE external_rule_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list_for_zone(zone_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM rules WHERE zone_id = $1 ORDER BY created_at ASC",
        )
        .bind(zone_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

/// Insert a new rule. `(zone_id, name)` is unique; a conflict surfaces as a
/// database error for the registry to map to a validation failure.
pub async fn insert_rule(
    zone_id: Uuid,
    name: &str,
    provider: Provider,
    kind: RuleKind,
    query_spec: &str,
    interval_seconds: i64,
    pool: &PgPool,
) -> Result<RuleRow> {
    sqlx::query_as::<_, RuleRow>(
        r#"
        INSERT INTO rules (
            id, zone_id, name, provider, kind, query_spec, interval_seconds,
            is_active, created_at, total_items_collected, last_item_count
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, true, now(), 0, 0)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(zone_id)
    .bind(name)
    .bind(provider.as_str())
    .bind(kind.as_str())
    .bind(query_spec)
    .bind(interval_seconds)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn update_rule(
    id: Uuid,
    name: Option<&str>,
    query_spec: Option<&str>,
    interval_seconds: Option<i64>,
    pool: &PgPool,
) -> Result<Option<RuleRow>> {
    sqlx::query_as::<_, RuleRow>(
        r#"
        UPDATE rules SET
            name = COALESCE($2, name),
            query_spec = COALESCE($3, query_spec),
            interval_seconds = COALESCE($4, interval_seconds)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(query_spec)
    .bind(interval_seconds)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn set_active(id: Uuid, active: bool, pool: &PgPool) -> Result<Option<RuleRow>> {
    sqlx::query_as::<_, RuleRow>(
        "UPDATE rules SET is_active = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(active)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn set_external_rule_id(
    id: Uuid,
    external_rule_id: Option<&str>,
    pool: &PgPool,
) -> Result<()> {
    sqlx::query("UPDATE rules SET external_rule_id = $2 WHERE id = $1")
        .bind(id)
        .bind(external_rule_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_rule(id: Uuid, pool: &PgPool) -> Result<bool> {
    let result = sqlx::query("DELETE FROM rules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Record a completed poll: collection stats plus the watermark the next
/// poll is scheduled from.
pub async fn mark_polled(
    id: Uuid,
    polled_at: DateTime<Utc>,
    item_count: i32,
    pool: &PgPool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE rules SET
            last_polled_at = $2,
            total_items_collected = total_items_collected + $3,
            last_item_count = $3
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(polled_at)
    .bind(item_count)
    .execute(pool)
    .await?;
    Ok(())
}
