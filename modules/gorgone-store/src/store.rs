use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::{CanonicalAuthor, CanonicalItem, CounterSet, Provider, RuleKind, Tier, Zone};

use crate::models::{author, item, rule, snapshot, tracking, zone};
use crate::models::item::InsertOutcome;
use crate::models::rule::RuleRow;
use crate::models::snapshot::SnapshotRow;
use crate::models::tracking::TrackingRow;

/// Handle over the canonical write and read path. One instance per process,
/// cheap to clone; all mutations inside are single-statement upserts or
/// short transactions.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- Zones ---

    pub async fn find_zone(&self, id: Uuid) -> Result<Option<Zone>> {
        zone::ZoneRow::find(id, &self.pool).await
    }

    // --- Authors ---

    pub async fn upsert_author(
        &self,
        author: &CanonicalAuthor,
        items_increment: i64,
    ) -> Result<Uuid> {
        author::upsert_author(author, items_increment, &self.pool).await
    }

    // --- Items ---

    pub async fn insert_item_if_absent(
        &self,
        zone_id: Uuid,
        item: &CanonicalItem,
        author_id: Option<Uuid>,
    ) -> Result<InsertOutcome> {
        item::insert_item_if_absent(zone_id, item, author_id, &self.pool).await
    }

    pub async fn find_item(&self, id: Uuid) -> Result<Option<item::ItemRow>> {
        item::ItemRow::find(id, &self.pool).await
    }

    pub async fn update_item_counters(
        &self,
        item_id: Uuid,
        counters: CounterSet,
    ) -> Result<CounterSet> {
        item::update_item_counters(item_id, counters, &self.pool).await
    }

    pub async fn set_predictions(
        &self,
        item_id: Uuid,
        predictions: &serde_json::Value,
    ) -> Result<()> {
        item::set_predictions(item_id, predictions, &self.pool).await
    }

    // --- Snapshots ---

    pub async fn append_snapshot(
        &self,
        item_id: Uuid,
        counters: CounterSet,
        deltas: CounterSet,
        velocity: f64,
    ) -> Result<()> {
        snapshot::append_snapshot(item_id, counters, deltas, velocity, &self.pool).await
    }

    pub async fn snapshots_for_item(&self, item_id: Uuid) -> Result<Vec<SnapshotRow>> {
        SnapshotRow::list_for_item(item_id, &self.pool).await
    }

    // --- Tracking ---

    pub async fn ensure_tracking(
        &self,
        item_id: Uuid,
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        tracking::ensure_tracking(item_id, tier, next_update_at, &self.pool).await
    }

    pub async fn find_tracking(&self, item_id: Uuid) -> Result<Option<TrackingRow>> {
        TrackingRow::find(item_id, &self.pool).await
    }

    pub async fn complete_refresh(
        &self,
        item_id: Uuid,
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
        consecutive_zero_deltas: i32,
    ) -> Result<i64> {
        tracking::complete_refresh(
            item_id,
            tier,
            next_update_at,
            consecutive_zero_deltas,
            &self.pool,
        )
        .await
    }

    pub async fn mark_tracking_cold(&self, item_id: Uuid) -> Result<()> {
        tracking::mark_cold(item_id, &self.pool).await
    }

    // --- Rules ---

    pub async fn find_rule(&self, id: Uuid) -> Result<Option<RuleRow>> {
        RuleRow::find(id, &self.pool).await
    }

    pub async fn find_rule_by_external_id(&self, external_id: &str) -> Result<Option<RuleRow>> {
        RuleRow::find_by_external_id(external_id, &self.pool).await
    }

    pub async fn list_rules(&self, zone_id: Uuid) -> Result<Vec<RuleRow>> {
        RuleRow::list_for_zone(zone_id, &self.pool).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_rule(
        &self,
        zone_id: Uuid,
        name: &str,
        provider: Provider,
        kind: RuleKind,
        query_spec: &str,
        interval_seconds: i64,
    ) -> Result<RuleRow> {
        rule::insert_rule(
            zone_id,
            name,
            provider,
            kind,
            query_spec,
            interval_seconds,
            &self.pool,
        )
        .await
    }

    pub async fn update_rule(
        &self,
        id: Uuid,
        name: Option<&str>,
        query_spec: Option<&str>,
        interval_seconds: Option<i64>,
    ) -> Result<Option<RuleRow>> {
        rule::update_rule(id, name, query_spec, interval_seconds, &self.pool).await
    }

    pub async fn set_rule_active(&self, id: Uuid, active: bool) -> Result<Option<RuleRow>> {
        rule::set_active(id, active, &self.pool).await
    }

    pub async fn set_rule_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<()> {
        rule::set_external_rule_id(id, external_id, &self.pool).await
    }

    pub async fn delete_rule(&self, id: Uuid) -> Result<bool> {
        rule::delete_rule(id, &self.pool).await
    }

    pub async fn mark_rule_polled(
        &self,
        id: Uuid,
        polled_at: DateTime<Utc>,
        item_count: i32,
    ) -> Result<()> {
        rule::mark_polled(id, polled_at, item_count, &self.pool).await
    }
}
