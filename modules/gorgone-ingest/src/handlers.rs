//! Job topic handlers wiring the orchestrator, tracker, and vectorizer
//! into the durable queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use gorgone_jobs::topics::{
    poll_key, snapshot_key, PollRulePayload, RefreshEngagementPayload, SnapshotItemPayload,
    VectorizePayload,
};
use gorgone_jobs::{
    FollowUp, JobHandler, JobQueue, TOPIC_POLL_RULE, TOPIC_REFRESH_AGGREGATES,
    TOPIC_REFRESH_ENGAGEMENT, TOPIC_SNAPSHOT_ITEM, TOPIC_VECTORIZE,
};
use gorgone_store::Store;
use gorgone_tracker::refresh::RefreshOutcome;
use gorgone_tracker::RefreshEngine;
use gorgone_vector::{ensure_embeddings, PgVectorStore, TextEmbedder};

use crate::orchestrator::Ingestor;
use crate::providers::ProviderClients;

/// The orchestrator as assembled in production.
pub type AppIngestor = Ingestor<Store, JobQueue, ProviderClients>;
/// The refresh engine as assembled in production.
pub type AppRefreshEngine = RefreshEngine<Store, ProviderClients>;

/// Cadence of the aggregate-view rebuild, seconds.
const AGGREGATES_INTERVAL_SECONDS: i64 = 15 * 60;
const AGGREGATES_KEY: &str = "aggregates";

// ---------------------------------------------------------------------------
// poll_rule
// ---------------------------------------------------------------------------

pub struct PollRuleHandler {
    ingestor: Arc<AppIngestor>,
}

impl PollRuleHandler {
    pub fn new(ingestor: Arc<AppIngestor>) -> Self {
        Self { ingestor }
    }
}

#[async_trait]
impl JobHandler for PollRuleHandler {
    fn topic(&self) -> &'static str {
        TOPIC_POLL_RULE
    }

    fn concurrency(&self) -> usize {
        4
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<Vec<FollowUp>> {
        let payload: PollRulePayload = serde_json::from_value(payload)?;
        let poll = self.ingestor.poll_rule(payload.rule_id).await?;

        // The next poll in the chain is enqueued after this job completes,
        // so the per-rule idempotency key stays free to take it.
        let Some(next_poll_at) = poll.next_poll_at else {
            return Ok(Vec::new());
        };
        Ok(vec![FollowUp {
            topic: TOPIC_POLL_RULE,
            payload: serde_json::to_value(&PollRulePayload {
                rule_id: payload.rule_id,
            })?,
            run_after: Some(next_poll_at),
            idempotency_key: Some(poll_key(payload.rule_id)),
        }])
    }
}

// ---------------------------------------------------------------------------
// refresh_engagement / snapshot_item
// ---------------------------------------------------------------------------

/// Shared implementation for the first engagement tick and the periodic
/// snapshot refresh; both run the same engine and reschedule via
/// `snapshot_item`.
async fn run_refresh_tick(
    engine: &AppRefreshEngine,
    item_id: uuid::Uuid,
) -> Result<Vec<FollowUp>> {
    let outcome = engine.run(item_id, Utc::now()).await?;

    let RefreshOutcome::Refreshed {
        next_update_at: Some(next_update_at),
        ..
    } = outcome
    else {
        return Ok(Vec::new());
    };

    Ok(vec![FollowUp {
        topic: TOPIC_SNAPSHOT_ITEM,
        payload: serde_json::to_value(&SnapshotItemPayload {
            item_db_id: item_id,
        })?,
        run_after: Some(next_update_at),
        idempotency_key: Some(snapshot_key(item_id)),
    }])
}

pub struct RefreshEngagementHandler {
    engine: Arc<AppRefreshEngine>,
}

impl RefreshEngagementHandler {
    pub fn new(engine: Arc<AppRefreshEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl JobHandler for RefreshEngagementHandler {
    fn topic(&self) -> &'static str {
        TOPIC_REFRESH_ENGAGEMENT
    }

    fn concurrency(&self) -> usize {
        8
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<Vec<FollowUp>> {
        let payload: RefreshEngagementPayload = serde_json::from_value(payload)?;
        run_refresh_tick(&self.engine, payload.item_id).await
    }
}

pub struct SnapshotItemHandler {
    engine: Arc<AppRefreshEngine>,
}

impl SnapshotItemHandler {
    pub fn new(engine: Arc<AppRefreshEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl JobHandler for SnapshotItemHandler {
    fn topic(&self) -> &'static str {
        TOPIC_SNAPSHOT_ITEM
    }

    fn concurrency(&self) -> usize {
        8
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<Vec<FollowUp>> {
        let payload: SnapshotItemPayload = serde_json::from_value(payload)?;
        run_refresh_tick(&self.engine, payload.item_db_id).await
    }
}

// ---------------------------------------------------------------------------
// vectorize
// ---------------------------------------------------------------------------

pub struct VectorizeHandler {
    store: Arc<PgVectorStore>,
    embedder: Arc<dyn TextEmbedder>,
}

impl VectorizeHandler {
    pub fn new(store: Arc<PgVectorStore>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl JobHandler for VectorizeHandler {
    fn topic(&self) -> &'static str {
        TOPIC_VECTORIZE
    }

    /// Narrow on purpose: the embedding provider throttles aggressively.
    fn concurrency(&self) -> usize {
        2
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<Vec<FollowUp>> {
        let payload: VectorizePayload = serde_json::from_value(payload)?;
        let report =
            ensure_embeddings(self.store.as_ref(), self.embedder.as_ref(), &payload.item_ids)
                .await?;
        tracing::info!(
            zone_id = %payload.zone_id,
            total = report.total,
            newly = report.newly_vectorized,
            failed = report.failed,
            "Vectorize job done"
        );
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// refresh_aggregates
// ---------------------------------------------------------------------------

pub struct RefreshAggregatesHandler {
    pool: PgPool,
}

impl RefreshAggregatesHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seed the recurring chain at boot. The idempotency key makes this a
    /// no-op when a chain already exists.
    pub async fn seed(queue: &JobQueue) -> Result<()> {
        queue
            .enqueue(TOPIC_REFRESH_AGGREGATES, &serde_json::json!({}), None, Some(AGGREGATES_KEY))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for RefreshAggregatesHandler {
    fn topic(&self) -> &'static str {
        TOPIC_REFRESH_AGGREGATES
    }

    fn concurrency(&self) -> usize {
        1
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(300)
    }

    async fn handle(&self, _payload: serde_json::Value) -> Result<Vec<FollowUp>> {
        gorgone_store::aggregates::refresh_all(&self.pool).await?;
        Ok(vec![FollowUp {
            topic: TOPIC_REFRESH_AGGREGATES,
            payload: serde_json::json!({}),
            run_after: Some(Utc::now() + chrono::Duration::seconds(AGGREGATES_INTERVAL_SECONDS)),
            idempotency_key: Some(AGGREGATES_KEY.to_string()),
        }])
    }
}
