// Seam traits for the refresh engine.
//
// CounterFetcher: one live-counter read per provider item.
// TrackerStore: the store subset a refresh tick touches.
//
// Both are implemented over the real clients/store by the ingestion crate
// and mocked in-memory here, so the whole snapshot algorithm runs under
// `cargo test` with no network and no database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use gorgone_common::types::{CounterSet, Provider, Tier, TierThresholds};

use crate::predictions;
use crate::tier::{next_tier, schedule_next_update};

/// Minimum elapsed time used for velocity, preventing divide-by-zero
/// spikes when two refreshes land close together.
fn min_elapsed() -> Duration {
    Duration::minutes(1)
}

#[async_trait]
pub trait CounterFetcher: Send + Sync {
    /// Fetch fresh counters for a provider item. `None` means the item is
    /// gone at the provider (deleted, private, withheld).
    async fn fetch_counters(
        &self,
        provider: Provider,
        provider_item_id: &str,
    ) -> Result<Option<CounterSet>>;
}

/// A snapshot observation as the prediction model sees it.
#[derive(Debug, Clone)]
pub struct SnapshotPoint {
    pub at: DateTime<Utc>,
    pub counters: CounterSet,
}

/// The item fields a refresh tick needs.
#[derive(Debug, Clone)]
pub struct TrackedItem {
    pub id: Uuid,
    pub provider: Provider,
    pub provider_item_id: String,
    pub created_at_source: DateTime<Utc>,
    pub thresholds: TierThresholds,
}

/// Current tracking state for an item.
#[derive(Debug, Clone)]
pub struct TrackingState {
    pub tier: Tier,
    pub consecutive_zero_deltas: i32,
}

#[async_trait]
pub trait TrackerStore: Send + Sync {
    async fn load_tracked_item(&self, item_id: Uuid) -> Result<Option<TrackedItem>>;
    async fn load_tracking(&self, item_id: Uuid) -> Result<Option<TrackingState>>;

    /// Overwrite live counters, returning the pre-image atomically.
    async fn update_counters(&self, item_id: Uuid, counters: CounterSet) -> Result<CounterSet>;

    async fn last_snapshot_at(&self, item_id: Uuid) -> Result<Option<DateTime<Utc>>>;
    async fn append_snapshot(
        &self,
        item_id: Uuid,
        counters: CounterSet,
        deltas: CounterSet,
        velocity: f64,
    ) -> Result<()>;

    /// Bump `update_count` and store the recomputed schedule; returns the
    /// new count.
    async fn complete_refresh(
        &self,
        item_id: Uuid,
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
        consecutive_zero_deltas: i32,
    ) -> Result<i64>;

    async fn mark_cold(&self, item_id: Uuid) -> Result<()>;

    async fn snapshots(&self, item_id: Uuid) -> Result<Vec<SnapshotPoint>>;
    async fn set_predictions(&self, item_id: Uuid, predictions: serde_json::Value) -> Result<()>;
}

/// Outcome of one refresh tick, for logging and rescheduling.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Snapshot appended; next refresh due at the contained time unless the
    /// item went cold.
    Refreshed {
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
        velocity: f64,
    },
    /// Provider no longer has the item; tracking is cold, no snapshot.
    Gone,
    /// Item or tracking row missing locally; nothing to do.
    Skipped,
}

pub struct RefreshEngine<S, F> {
    store: S,
    fetcher: F,
}

impl<S: TrackerStore, F: CounterFetcher> RefreshEngine<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    /// One refresh tick for one item. The job scheduler guarantees a single
    /// in-flight tick per item via its idempotency key, so snapshots never
    /// interleave.
    pub async fn run(&self, item_id: Uuid, now: DateTime<Utc>) -> Result<RefreshOutcome> {
        let Some(item) = self.store.load_tracked_item(item_id).await? else {
            tracing::warn!(%item_id, "Refresh for unknown item, skipping");
            return Ok(RefreshOutcome::Skipped);
        };
        let Some(tracking) = self.store.load_tracking(item_id).await? else {
            tracing::warn!(%item_id, "Refresh for untracked item, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let Some(fresh) = self
            .fetcher
            .fetch_counters(item.provider, &item.provider_item_id)
            .await?
        else {
            tracing::info!(%item_id, provider = %item.provider, "Item gone at provider, tracking goes cold");
            self.store.mark_cold(item_id).await?;
            return Ok(RefreshOutcome::Gone);
        };

        let previous = self.store.update_counters(item_id, fresh).await?;
        let last_at = self.store.last_snapshot_at(item_id).await?;

        let (deltas, velocity) = match last_at {
            // First snapshot: deltas are the counters themselves, velocity 0.
            None => (fresh, 0.0),
            Some(last_at) => {
                let deltas = fresh.delta_since(&previous);
                let elapsed = (now - last_at).max(min_elapsed());
                let elapsed_hours = elapsed.num_seconds() as f64 / 3600.0;
                (deltas, deltas.total() as f64 / elapsed_hours)
            }
        };

        self.store
            .append_snapshot(item_id, fresh, deltas, velocity)
            .await?;

        let zero_streak = if deltas.is_zero() {
            tracking.consecutive_zero_deltas + 1
        } else {
            0
        };
        let age = now - item.created_at_source;
        let tier = next_tier(tracking.tier, age, velocity, zero_streak, &item.thresholds);
        let next_update_at = schedule_next_update(tier, now);

        let update_count = self
            .store
            .complete_refresh(item_id, tier, next_update_at, zero_streak)
            .await?;

        if update_count >= 2 {
            let snapshots = self.store.snapshots(item_id).await?;
            let doc = predictions::compute(&fresh, &snapshots, now);
            self.store
                .set_predictions(item_id, serde_json::to_value(&doc)?)
                .await?;
        }

        tracing::debug!(
            %item_id,
            tier = %tier,
            velocity,
            update_count,
            "Engagement refresh complete"
        );

        Ok(RefreshOutcome::Refreshed {
            tier,
            next_update_at,
            velocity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockStore {
        item: TrackedItem,
        tracking: Mutex<TrackingState>,
        counters: Mutex<CounterSet>,
        snapshots: Mutex<Vec<SnapshotPoint>>,
        update_count: Mutex<i64>,
        predictions: Mutex<Option<serde_json::Value>>,
        cold: Mutex<bool>,
        last_schedule: Mutex<Option<DateTime<Utc>>>,
    }

    impl MockStore {
        fn new(item: TrackedItem, tier: Tier, counters: CounterSet) -> Self {
            Self {
                item,
                tracking: Mutex::new(TrackingState {
                    tier,
                    consecutive_zero_deltas: 0,
                }),
                counters: Mutex::new(counters),
                snapshots: Mutex::new(Vec::new()),
                update_count: Mutex::new(0),
                predictions: Mutex::new(None),
                cold: Mutex::new(false),
                last_schedule: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TrackerStore for &MockStore {
        async fn load_tracked_item(&self, _item_id: Uuid) -> Result<Option<TrackedItem>> {
            Ok(Some(self.item.clone()))
        }

        async fn load_tracking(&self, _item_id: Uuid) -> Result<Option<TrackingState>> {
            let t = self.tracking.lock().unwrap();
            Ok(Some(TrackingState {
                tier: t.tier,
                consecutive_zero_deltas: t.consecutive_zero_deltas,
            }))
        }

        async fn update_counters(
            &self,
            _item_id: Uuid,
            counters: CounterSet,
        ) -> Result<CounterSet> {
            let mut current = self.counters.lock().unwrap();
            let previous = *current;
            *current = counters;
            Ok(previous)
        }

        async fn last_snapshot_at(&self, _item_id: Uuid) -> Result<Option<DateTime<Utc>>> {
            Ok(self.snapshots.lock().unwrap().last().map(|s| s.at))
        }

        async fn append_snapshot(
            &self,
            _item_id: Uuid,
            counters: CounterSet,
            _deltas: CounterSet,
            _velocity: f64,
        ) -> Result<()> {
            self.snapshots.lock().unwrap().push(SnapshotPoint {
                at: Utc::now(),
                counters,
            });
            Ok(())
        }

        async fn complete_refresh(
            &self,
            _item_id: Uuid,
            tier: Tier,
            next_update_at: Option<DateTime<Utc>>,
            consecutive_zero_deltas: i32,
        ) -> Result<i64> {
            let mut tracking = self.tracking.lock().unwrap();
            tracking.tier = tier;
            tracking.consecutive_zero_deltas = consecutive_zero_deltas;
            *self.last_schedule.lock().unwrap() = next_update_at;
            let mut count = self.update_count.lock().unwrap();
            *count += 1;
            Ok(*count)
        }

        async fn mark_cold(&self, _item_id: Uuid) -> Result<()> {
            *self.cold.lock().unwrap() = true;
            Ok(())
        }

        async fn snapshots(&self, _item_id: Uuid) -> Result<Vec<SnapshotPoint>> {
            Ok(self.snapshots.lock().unwrap().clone())
        }

        async fn set_predictions(
            &self,
            _item_id: Uuid,
            predictions: serde_json::Value,
        ) -> Result<()> {
            *self.predictions.lock().unwrap() = Some(predictions);
            Ok(())
        }
    }

    struct MockFetcher {
        responses: Mutex<Vec<Option<CounterSet>>>,
    }

    impl MockFetcher {
        fn new(mut responses: Vec<Option<CounterSet>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl CounterFetcher for &MockFetcher {
        async fn fetch_counters(
            &self,
            _provider: Provider,
            _provider_item_id: &str,
        ) -> Result<Option<CounterSet>> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .expect("unexpected extra fetch"))
        }
    }

    fn fresh_item(age: Duration) -> TrackedItem {
        TrackedItem {
            id: Uuid::new_v4(),
            provider: Provider::Tweet,
            provider_item_id: "T1".to_string(),
            created_at_source: Utc::now() - age,
            thresholds: TierThresholds::default(),
        }
    }

    fn likes(n: i64) -> CounterSet {
        CounterSet {
            like: n,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn provider_404_marks_cold_without_snapshot() {
        let item = fresh_item(Duration::minutes(30));
        let item_id = item.id;
        let store = MockStore::new(item, Tier::UltraHot, likes(10));
        let fetcher = MockFetcher::new(vec![None]);

        let engine = RefreshEngine::new(&store, &fetcher);
        let outcome = engine.run(item_id, Utc::now()).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Gone);
        assert!(*store.cold.lock().unwrap());
        assert!(store.snapshots.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn two_zero_delta_refreshes_demote_to_warm() {
        let item = fresh_item(Duration::minutes(30));
        let item_id = item.id;
        let store = MockStore::new(item, Tier::UltraHot, likes(10));
        // Three fetches, all returning the same counters: the first
        // snapshot is the baseline, then two zero-delta refreshes.
        let fetcher = MockFetcher::new(vec![Some(likes(10)), Some(likes(10)), Some(likes(10))]);
        let engine = RefreshEngine::new(&store, &fetcher);

        let now = Utc::now();
        engine.run(item_id, now).await.unwrap();
        engine.run(item_id, now).await.unwrap();
        let outcome = engine.run(item_id, now).await.unwrap();

        match outcome {
            RefreshOutcome::Refreshed {
                tier,
                next_update_at,
                ..
            } => {
                assert_eq!(tier, Tier::Warm, "double zero delta skips hot");
                let due = next_update_at.expect("warm items stay scheduled");
                let offset = due - now;
                assert!(
                    (offset - Duration::minutes(60)).num_seconds().abs() <= 5,
                    "warm period is 60 minutes, got {offset}"
                );
                assert_eq!(*store.last_schedule.lock().unwrap(), Some(due));
            }
            other => panic!("expected refresh, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_snapshot_uses_counters_as_deltas_with_zero_velocity() {
        let item = fresh_item(Duration::minutes(10));
        let item_id = item.id;
        let store = MockStore::new(item, Tier::UltraHot, likes(5));
        let fetcher = MockFetcher::new(vec![Some(likes(25))]);
        let engine = RefreshEngine::new(&store, &fetcher);

        let outcome = engine.run(item_id, Utc::now()).await.unwrap();
        match outcome {
            RefreshOutcome::Refreshed { velocity, .. } => assert_eq!(velocity, 0.0),
            other => panic!("expected refresh, got {other:?}"),
        }
        assert_eq!(store.snapshots.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn predictions_written_from_second_refresh_onward() {
        let item = fresh_item(Duration::minutes(10));
        let item_id = item.id;
        let store = MockStore::new(item, Tier::UltraHot, likes(0));
        let fetcher = MockFetcher::new(vec![Some(likes(10)), Some(likes(30))]);
        let engine = RefreshEngine::new(&store, &fetcher);

        engine.run(item_id, Utc::now()).await.unwrap();
        assert!(store.predictions.lock().unwrap().is_none());

        engine.run(item_id, Utc::now()).await.unwrap();
        let doc = store.predictions.lock().unwrap().clone().expect("predictions stored");
        assert_eq!(doc["model"], "velocity_linear_v1");
    }

    #[tokio::test]
    async fn growth_resets_zero_streak() {
        let item = fresh_item(Duration::minutes(10));
        let item_id = item.id;
        let store = MockStore::new(item, Tier::UltraHot, likes(0));
        let fetcher = MockFetcher::new(vec![
            Some(likes(10)), // baseline
            Some(likes(10)), // zero delta -> streak 1
            Some(likes(40)), // growth -> streak resets
        ]);
        let engine = RefreshEngine::new(&store, &fetcher);

        engine.run(item_id, Utc::now()).await.unwrap();
        engine.run(item_id, Utc::now()).await.unwrap();
        assert_eq!(store.tracking.lock().unwrap().consecutive_zero_deltas, 1);

        engine.run(item_id, Utc::now()).await.unwrap();
        assert_eq!(store.tracking.lock().unwrap().consecutive_zero_deltas, 0);
    }
}
