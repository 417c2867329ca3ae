//! TrackerStore over the real Postgres-backed Store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gorgone_common::types::{CounterSet, Provider, Tier};
use gorgone_store::{SnapshotRow, Store};

use crate::refresh::{SnapshotPoint, TrackedItem, TrackerStore, TrackingState};

#[async_trait]
impl TrackerStore for Store {
    async fn load_tracked_item(&self, item_id: Uuid) -> Result<Option<TrackedItem>> {
        let Some(item) = self.find_item(item_id).await? else {
            return Ok(None);
        };
        let Some(provider) = Provider::parse(&item.provider) else {
            anyhow::bail!("item {item_id} has unknown provider {}", item.provider);
        };

        // Promotion thresholds are a zone-level setting with defaults.
        let thresholds = self
            .find_zone(item.zone_id)
            .await?
            .map(|zone| zone.settings.tier_thresholds())
            .unwrap_or_default();

        Ok(Some(TrackedItem {
            id: item.id,
            provider,
            provider_item_id: item.provider_item_id,
            created_at_source: item.created_at_source,
            thresholds,
        }))
    }

    async fn load_tracking(&self, item_id: Uuid) -> Result<Option<TrackingState>> {
        Ok(self.find_tracking(item_id).await?.map(|row| TrackingState {
            tier: row.tier(),
            consecutive_zero_deltas: row.consecutive_zero_deltas,
        }))
    }

    async fn update_counters(&self, item_id: Uuid, counters: CounterSet) -> Result<CounterSet> {
        self.update_item_counters(item_id, counters).await
    }

    async fn last_snapshot_at(&self, item_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        Ok(SnapshotRow::latest_for_item(item_id, self.pool())
            .await?
            .map(|row| row.snapshot_at))
    }

    async fn append_snapshot(
        &self,
        item_id: Uuid,
        counters: CounterSet,
        deltas: CounterSet,
        velocity: f64,
    ) -> Result<()> {
        Store::append_snapshot(self, item_id, counters, deltas, velocity).await
    }

    async fn complete_refresh(
        &self,
        item_id: Uuid,
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
        consecutive_zero_deltas: i32,
    ) -> Result<i64> {
        Store::complete_refresh(self, item_id, tier, next_update_at, consecutive_zero_deltas).await
    }

    async fn mark_cold(&self, item_id: Uuid) -> Result<()> {
        self.mark_tracking_cold(item_id).await
    }

    async fn snapshots(&self, item_id: Uuid) -> Result<Vec<SnapshotPoint>> {
        Ok(self
            .snapshots_for_item(item_id)
            .await?
            .into_iter()
            .map(|row| SnapshotPoint {
                at: row.snapshot_at,
                counters: row.counters(),
            })
            .collect())
    }

    async fn set_predictions(&self, item_id: Uuid, predictions: serde_json::Value) -> Result<()> {
        Store::set_predictions(self, item_id, &predictions).await
    }
}
