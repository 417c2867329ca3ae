use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Periods the aggregate views are materialized for.
pub const PERIODS: [&str; 6] = ["3h", "6h", "12h", "24h", "7d", "30d"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopAuthorRow {
    pub zone_id: Uuid,
    pub period: String,
    pub author_id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub item_count: i64,
    pub engagement_total: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverviewStatsRow {
    pub zone_id: Uuid,
    pub period: String,
    pub item_count: i64,
    pub author_count: i64,
    pub engagement_total: i64,
    pub entity_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HeatmapCell {
    pub zone_id: Uuid,
    pub dow: i32,
    pub hour: i32,
    pub item_count: i64,
}

/// Authors ranked by collected engagement within a period, for one zone.
pub async fn top_authors(
    zone_id: Uuid,
    period: &str,
    limit: i64,
    pool: &PgPool,
) -> Result<Vec<TopAuthorRow>> {
    if !PERIODS.contains(&period) {
        anyhow::bail!("unknown aggregate period: {period}");
    }
    sqlx::query_as::<_, TopAuthorRow>(
        r#"
        SELECT * FROM top_authors_by_period
        WHERE zone_id = $1 AND period = $2
        ORDER BY engagement_total DESC
        LIMIT $3
        "#,
    )
    .bind(zone_id)
    .bind(period)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Per-zone totals for one period.
pub async fn overview_stats(
    zone_id: Uuid,
    period: &str,
    pool: &PgPool,
) -> Result<Option<OverviewStatsRow>> {
    if !PERIODS.contains(&period) {
        anyhow::bail!("unknown aggregate period: {period}");
    }
    sqlx::query_as::<_, OverviewStatsRow>(
        "SELECT * FROM zone_overview_stats WHERE zone_id = $1 AND period = $2",
    )
    .bind(zone_id)
    .bind(period)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Day-of-week × hour item counts for a zone, over the trailing 30 days.
pub async fn activity_heatmap(zone_id: Uuid, pool: &PgPool) -> Result<Vec<HeatmapCell>> {
    sqlx::query_as::<_, HeatmapCell>(
        "SELECT * FROM zone_activity_heatmap WHERE zone_id = $1 ORDER BY dow, hour",
    )
    .bind(zone_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Refresh every aggregate view. Driven by the recurring aggregates job;
/// CONCURRENTLY keeps readers unblocked during the rebuild.
pub async fn refresh_all(pool: &PgPool) -> Result<()> {
    for view in [
        "top_authors_by_period",
        "zone_overview_stats",
        "zone_activity_heatmap",
    ] {
        tracing::debug!(view, "Refreshing materialized view");
        sqlx::query(&format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {view}"))
            .execute(pool)
            .await?;
    }
    Ok(())
}
