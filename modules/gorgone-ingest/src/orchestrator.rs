use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use gorgone_common::types::{CanonicalAuthor, CanonicalItem, RequestContext};
use gorgone_common::GorgoneError;
use gorgone_jobs::topics::{refresh_key, RefreshEngagementPayload, VectorizePayload};
use gorgone_jobs::{TOPIC_REFRESH_ENGAGEMENT, TOPIC_VECTORIZE};
use gorgone_tracker::{initial_tier, schedule_next_update};

use crate::adapters::tweet;
use crate::traits::{ContentStore, JobEnqueuer, ProviderSearch};

/// Delay before vectorizing freshly ingested items, seconds.
const VECTORIZE_DELAY_SECONDS: i64 = 5;
/// Delay before the first engagement tick, seconds.
const FIRST_REFRESH_DELAY_SECONDS: i64 = 3600;
/// Page size requested from pull providers.
const POLL_PAGE_SIZE: u32 = 100;
/// Hard ceiling on backfill pagination, whatever the requested count.
const BACKFILL_MAX_PAGES: u32 = 50;

/// Per-batch ingestion counts, returned verbatim to the webhook caller.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IngestReport {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: usize,
    #[serde(skip)]
    pub new_item_ids: Vec<Uuid>,
}

/// Outcome of one poll tick or backfill.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    pub report: IngestReport,
    pub zone_id: Option<Uuid>,
    /// When the next poll is due; `None` when the rule is gone or inactive.
    pub next_poll_at: Option<DateTime<Utc>>,
}

/// Drives provider events through adapters into the store, and schedules
/// the downstream vectorization and engagement work.
pub struct Ingestor<S, Q, P> {
    store: S,
    queue: Q,
    search: P,
}

impl<S, Q, P> Ingestor<S, Q, P>
where
    S: ContentStore,
    Q: JobEnqueuer,
    P: ProviderSearch,
{
    pub fn new(store: S, queue: Q, search: P) -> Self {
        Self {
            store,
            queue,
            search,
        }
    }

    /// Ingest a push-provider webhook delivery. One bad item never fails
    /// the batch; the report carries per-item outcomes.
    pub async fn ingest_webhook(
        &self,
        ctx: &RequestContext,
        body: &serde_json::Value,
    ) -> Result<IngestReport, GorgoneError> {
        let batch = tweet::parse_webhook(body).map_err(|e| GorgoneError::Parse(e.to_string()))?;

        let mut report = IngestReport {
            received: batch.tweets.len(),
            ..Default::default()
        };
        tracing::debug!(
            request_id = %ctx.request_id,
            received = report.received,
            "Webhook batch received"
        );

        // Without a rule id the zone cannot be determined deterministically;
        // the items are dropped, loudly.
        let Some(external_rule_id) = batch.rule_id else {
            tracing::warn!(
                received = report.received,
                "Webhook payload carried no rule id; dropping items"
            );
            report.errors = report.received;
            return Ok(report);
        };

        let Some(rule) = self
            .store
            .find_rule_by_external_id(&external_rule_id)
            .await?
        else {
            tracing::warn!(
                external_rule_id,
                received = report.received,
                "Webhook rule id resolves to no rule; dropping items"
            );
            report.errors = report.received;
            return Ok(report);
        };

        if !rule.is_active {
            // The webhook reached us; silently dropping would be lossy.
            tracing::info!(rule_id = %rule.id, "Rule deactivated since dispatch; ingesting anyway");
        }

        let now = Utc::now();
        for payload in &batch.tweets {
            let item = match tweet::parse_item(payload) {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable tweet");
                    report.errors += 1;
                    continue;
                }
            };
            let author = tweet::parse_author(payload).ok();
            self.ingest_entry(rule.zone_id, &item, author.as_ref(), now, &mut report)
                .await?;
        }

        self.enqueue_followups(rule.zone_id, &report.new_item_ids)
            .await;
        Ok(report)
    }

    /// One poll tick for a pull rule, driven by the `poll_rule` topic.
    pub async fn poll_rule(&self, rule_id: Uuid) -> Result<PollReport, GorgoneError> {
        let Some(rule) = self.store.find_rule(rule_id).await? else {
            tracing::warn!(%rule_id, "Poll for deleted rule, dropping");
            return Ok(PollReport::default());
        };
        if !rule.is_active {
            tracing::info!(%rule_id, "Poll for deactivated rule; chain stops here");
            return Ok(PollReport::default());
        }

        let page = self
            .search
            .fetch_page(&rule, None, POLL_PAGE_SIZE)
            .await
            .map_err(GorgoneError::Anyhow)?;

        let now = Utc::now();
        let mut report = IngestReport {
            received: page.entries.len(),
            ..Default::default()
        };
        for entry in &page.entries {
            self.ingest_entry(rule.zone_id, &entry.item, entry.author.as_ref(), now, &mut report)
                .await?;
        }

        self.store
            .mark_rule_polled(rule.id, now, report.inserted as i32)
            .await?;
        self.enqueue_followups(rule.zone_id, &report.new_item_ids)
            .await;

        tracing::info!(
            rule_id = %rule.id,
            received = report.received,
            inserted = report.inserted,
            "Rule poll complete"
        );

        Ok(PollReport {
            report,
            zone_id: Some(rule.zone_id),
            next_poll_at: Some(now + Duration::seconds(rule.interval_seconds)),
        })
    }

    /// On-demand backfill: paginate until `requested_count` items were
    /// received or the provider runs dry.
    pub async fn backfill(
        &self,
        rule_id: Uuid,
        requested_count: usize,
    ) -> Result<IngestReport, GorgoneError> {
        let Some(rule) = self.store.find_rule(rule_id).await? else {
            return Err(GorgoneError::NotFound(format!("rule {rule_id}")));
        };

        let now = Utc::now();
        let mut report = IngestReport::default();
        let mut cursor: Option<String> = None;

        for _page_no in 0..BACKFILL_MAX_PAGES {
            if report.received >= requested_count {
                break;
            }
            let page = self
                .search
                .fetch_page(&rule, cursor.as_deref(), POLL_PAGE_SIZE)
                .await
                .map_err(GorgoneError::Anyhow)?;
            if page.entries.is_empty() {
                break;
            }

            report.received += page.entries.len();
            for entry in &page.entries {
                self.ingest_entry(rule.zone_id, &entry.item, entry.author.as_ref(), now, &mut report)
                    .await?;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        // `received` was accumulated page by page above, so the per-entry
        // accounting must not double count.
        debug_assert!(report.inserted + report.duplicates + report.errors <= report.received);

        self.store
            .mark_rule_polled(rule.id, now, report.inserted as i32)
            .await?;
        self.enqueue_followups(rule.zone_id, &report.new_item_ids)
            .await;
        Ok(report)
    }

    /// The shared per-item path: upsert author, insert-if-absent, seed
    /// tracking. Store errors propagate; everything else is per-item.
    async fn ingest_entry(
        &self,
        zone_id: Uuid,
        item: &CanonicalItem,
        author: Option<&CanonicalAuthor>,
        now: DateTime<Utc>,
        report: &mut IngestReport,
    ) -> Result<(), GorgoneError> {
        let author_id = match author {
            Some(author) => Some(self.store.upsert_author(author, 1).await?),
            None => None,
        };

        let outcome = self
            .store
            .insert_item_if_absent(zone_id, item, author_id)
            .await?;

        if outcome.inserted {
            let tier = initial_tier(item.created_at_source, now);
            self.store
                .ensure_tracking(outcome.id, tier, schedule_next_update(tier, now))
                .await?;
            report.inserted += 1;
            report.new_item_ids.push(outcome.id);
        } else {
            report.duplicates += 1;
        }
        Ok(())
    }

    /// Schedule vectorization and the first engagement tick for new items.
    /// A scheduling failure is logged and costs only this batch's
    /// downstream work, never the ingest itself.
    async fn enqueue_followups(&self, zone_id: Uuid, new_item_ids: &[Uuid]) {
        if new_item_ids.is_empty() {
            return;
        }

        let vectorize = VectorizePayload {
            item_ids: new_item_ids.to_vec(),
            zone_id,
        };
        if let Err(e) = self
            .queue
            .enqueue(
                TOPIC_VECTORIZE,
                serde_json::to_value(&vectorize).unwrap_or_default(),
                Some(Utc::now() + Duration::seconds(VECTORIZE_DELAY_SECONDS)),
                None,
            )
            .await
        {
            tracing::error!(error = %e, "Failed to schedule vectorization");
        }

        for &item_id in new_item_ids {
            let payload = RefreshEngagementPayload { item_id };
            if let Err(e) = self
                .queue
                .enqueue(
                    TOPIC_REFRESH_ENGAGEMENT,
                    serde_json::to_value(&payload).unwrap_or_default(),
                    Some(Utc::now() + Duration::seconds(FIRST_REFRESH_DELAY_SECONDS)),
                    Some(refresh_key(item_id)),
                )
                .await
            {
                tracing::error!(%item_id, error = %e, "Failed to schedule first engagement tick");
            }
        }
    }
}

#[cfg(test)]
use gorgone_store::RuleRow;

/// Build the rule row a test or fixture needs without a database.
#[cfg(test)]
pub(crate) fn rule_fixture(
    zone_id: Uuid,
    provider: gorgone_common::types::Provider,
    kind: gorgone_common::types::RuleKind,
    query_spec: &str,
    interval_seconds: i64,
    external_rule_id: Option<&str>,
) -> RuleRow {
    RuleRow {
        id: Uuid::new_v4(),
        zone_id,
        name: "test-rule".to_string(),
        provider: provider.as_str().to_string(),
        kind: kind.as_str().to_string(),
        query_spec: query_spec.to_string(),
        interval_seconds,
        is_active: true,
        external_rule_id: external_rule_id.map(str::to_string),
        created_at: Utc::now(),
        last_polled_at: None,
        total_items_collected: 0,
        last_item_count: 0,
    }
}
