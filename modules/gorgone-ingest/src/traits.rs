// Trait abstractions for the ingestion orchestrator's dependencies.
//
// ContentStore: the store subset ingestion writes through.
// JobEnqueuer: delayed-job scheduling.
// ProviderSearch: one bounded page of canonical items for a pull rule.
// RuleMirror: rule lifecycle on the push provider.
//
// These enable deterministic testing with in-memory mocks: no network, no
// database. The real implementations live in `handlers` and `providers`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gorgone_common::types::{CanonicalAuthor, CanonicalItem, Tier, Zone};
use gorgone_store::models::item::InsertOutcome;
use gorgone_store::RuleRow;

// ---------------------------------------------------------------------------
// ContentStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_zone(&self, id: Uuid) -> Result<Option<Zone>>;

    async fn upsert_author(&self, author: &CanonicalAuthor, items_increment: i64) -> Result<Uuid>;

    async fn insert_item_if_absent(
        &self,
        zone_id: Uuid,
        item: &CanonicalItem,
        author_id: Option<Uuid>,
    ) -> Result<InsertOutcome>;

    async fn ensure_tracking(
        &self,
        item_id: Uuid,
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn find_rule(&self, id: Uuid) -> Result<Option<RuleRow>>;

    async fn find_rule_by_external_id(&self, external_id: &str) -> Result<Option<RuleRow>>;

    async fn mark_rule_polled(
        &self,
        id: Uuid,
        polled_at: DateTime<Utc>,
        item_count: i32,
    ) -> Result<()>;
}

#[async_trait]
impl ContentStore for gorgone_store::Store {
    async fn find_zone(&self, id: Uuid) -> Result<Option<Zone>> {
        gorgone_store::Store::find_zone(self, id).await
    }

    async fn upsert_author(&self, author: &CanonicalAuthor, items_increment: i64) -> Result<Uuid> {
        gorgone_store::Store::upsert_author(self, author, items_increment).await
    }

    async fn insert_item_if_absent(
        &self,
        zone_id: Uuid,
        item: &CanonicalItem,
        author_id: Option<Uuid>,
    ) -> Result<InsertOutcome> {
        gorgone_store::Store::insert_item_if_absent(self, zone_id, item, author_id).await
    }

    async fn ensure_tracking(
        &self,
        item_id: Uuid,
        tier: Tier,
        next_update_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        gorgone_store::Store::ensure_tracking(self, item_id, tier, next_update_at).await
    }

    async fn find_rule(&self, id: Uuid) -> Result<Option<RuleRow>> {
        gorgone_store::Store::find_rule(self, id).await
    }

    async fn find_rule_by_external_id(&self, external_id: &str) -> Result<Option<RuleRow>> {
        gorgone_store::Store::find_rule_by_external_id(self, external_id).await
    }

    async fn mark_rule_polled(
        &self,
        id: Uuid,
        polled_at: DateTime<Utc>,
        item_count: i32,
    ) -> Result<()> {
        gorgone_store::Store::mark_rule_polled(self, id, polled_at, item_count).await
    }
}

// ---------------------------------------------------------------------------
// JobEnqueuer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobEnqueuer: Send + Sync {
    async fn enqueue(
        &self,
        topic: &str,
        payload: serde_json::Value,
        run_after: Option<DateTime<Utc>>,
        idempotency_key: Option<String>,
    ) -> Result<()>;
}

#[async_trait]
impl JobEnqueuer for gorgone_jobs::JobQueue {
    async fn enqueue(
        &self,
        topic: &str,
        payload: serde_json::Value,
        run_after: Option<DateTime<Utc>>,
        idempotency_key: Option<String>,
    ) -> Result<()> {
        gorgone_jobs::JobQueue::enqueue(self, topic, &payload, run_after, idempotency_key.as_deref())
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProviderSearch
// ---------------------------------------------------------------------------

/// One parsed entry from a pull page: the canonical item plus its author
/// when the provider reports one.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub item: CanonicalItem,
    pub author: Option<CanonicalAuthor>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub entries: Vec<ParsedEntry>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait ProviderSearch: Send + Sync {
    /// Fetch one bounded page for a rule. Parse failures inside the page
    /// are skipped and counted by the caller via the entry count versus
    /// the raw count in logs; they never fail the page.
    async fn fetch_page(
        &self,
        rule: &RuleRow,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<SearchPage>;
}

// ---------------------------------------------------------------------------
// RuleMirror
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RuleMirror: Send + Sync {
    /// Create the remote rule; returns the provider-side rule id.
    async fn create(&self, rule: &RuleRow) -> Result<String>;

    /// Push query/interval changes and the activation flag.
    async fn update(&self, external_id: &str, rule: &RuleRow, active: bool) -> Result<()>;

    async fn delete(&self, external_id: &str) -> Result<()>;
}
