pub mod query;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use gorgone_common::types::{Provider, RuleKind};
use gorgone_common::GorgoneError;
use gorgone_jobs::topics::{poll_key, PollRulePayload};
use gorgone_jobs::TOPIC_POLL_RULE;
use gorgone_store::RuleRow;

use crate::traits::{JobEnqueuer, RuleMirror};

/// Interval floor for push rules, seconds.
const PUSH_MIN_INTERVAL: i64 = 60;
/// Interval floor for news rules, seconds.
const NEWS_MIN_INTERVAL: i64 = 15 * 60;
/// The only intervals the video provider accepts, seconds.
const VIDEO_INTERVALS: [i64; 3] = [60 * 60, 180 * 60, 360 * 60];

/// Per-zone monitoring rules. Rules on the push provider mirror their
/// lifecycle remotely; rules on pull providers drive the poll loop through
/// the job queue.
pub struct RuleRegistry<S, M, Q> {
    store: S,
    mirror: M,
    queue: Q,
}

#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub name: Option<String>,
    pub query_spec: Option<String>,
    pub interval_seconds: Option<i64>,
}

impl<S, M, Q> RuleRegistry<S, M, Q>
where
    S: RuleStoreOps,
    M: RuleMirror,
    Q: JobEnqueuer,
{
    pub fn new(store: S, mirror: M, queue: Q) -> Self {
        Self {
            store,
            mirror,
            queue,
        }
    }

    pub async fn list(&self, zone_id: Uuid) -> Result<Vec<RuleRow>> {
        self.store.list_rules(zone_id).await
    }

    /// Create and activate a rule. Push rules are mirrored remotely before
    /// the call returns; a remote failure rolls the local row back. Pull
    /// rules get their first poll scheduled immediately.
    pub async fn create(
        &self,
        zone_id: Uuid,
        name: &str,
        provider: Provider,
        kind: RuleKind,
        query_spec: &str,
        interval_seconds: i64,
    ) -> Result<RuleRow, GorgoneError> {
        validate_kind_provider(kind, provider)?;
        validate_interval(provider, interval_seconds)?;
        query::validate_query(kind, query_spec)?;

        let rule = self
            .store
            .insert_rule(zone_id, name, provider, kind, query_spec, interval_seconds)
            .await
            .map_err(|e| GorgoneError::Validation(format!("rule insert failed: {e}")))?;

        match provider {
            Provider::Tweet => match self.mirror.create(&rule).await {
                Ok(external_id) => {
                    self.store
                        .set_rule_external_id(rule.id, Some(&external_id))
                        .await?;
                    tracing::info!(rule_id = %rule.id, external_id, "Rule mirrored to push provider");
                }
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Remote rule create failed, rolling back");
                    self.store.delete_rule(rule.id).await?;
                    return Err(GorgoneError::Provider {
                        status: 502,
                        message: format!("push provider rejected rule: {e}"),
                    });
                }
            },
            Provider::Video | Provider::News => {
                self.schedule_poll(rule.id).await?;
            }
        }

        self.store
            .find_rule(rule.id)
            .await?
            .ok_or_else(|| GorgoneError::NotFound(format!("rule {}", rule.id)))
    }

    /// Patch query, name, or interval. Remote-mirrored rules push the
    /// change to the provider.
    pub async fn update(&self, id: Uuid, patch: RulePatch) -> Result<RuleRow, GorgoneError> {
        let existing = self
            .store
            .find_rule(id)
            .await?
            .ok_or_else(|| GorgoneError::NotFound(format!("rule {id}")))?;
        let kind = existing
            .kind()
            .ok_or_else(|| GorgoneError::Validation(format!("rule {id} has unknown kind")))?;
        let provider = existing
            .provider()
            .ok_or_else(|| GorgoneError::Validation(format!("rule {id} has unknown provider")))?;

        if let Some(interval) = patch.interval_seconds {
            validate_interval(provider, interval)?;
        }
        if let Some(query_spec) = patch.query_spec.as_deref() {
            query::validate_query(kind, query_spec)?;
        }

        let updated = self
            .store
            .update_rule(
                id,
                patch.name.as_deref(),
                patch.query_spec.as_deref(),
                patch.interval_seconds,
            )
            .await?
            .ok_or_else(|| GorgoneError::NotFound(format!("rule {id}")))?;

        if let Some(external_id) = updated.external_rule_id.as_deref() {
            self.mirror
                .update(external_id, &updated, updated.is_active)
                .await
                .map_err(|e| GorgoneError::Provider {
                    status: 502,
                    message: format!("push provider rejected rule update: {e}"),
                })?;
        }

        Ok(updated)
    }

    /// Flip activation. Push rules mirror the effect flag remotely; a pull
    /// rule being re-activated gets a fresh poll scheduled.
    pub async fn toggle(&self, id: Uuid, active: bool) -> Result<RuleRow, GorgoneError> {
        let updated = self
            .store
            .set_active(id, active)
            .await?
            .ok_or_else(|| GorgoneError::NotFound(format!("rule {id}")))?;

        if let Some(external_id) = updated.external_rule_id.as_deref() {
            if let Err(e) = self.mirror.update(external_id, &updated, active).await {
                tracing::warn!(rule_id = %id, error = %e, "Remote toggle failed; local state wins");
            }
        } else if active {
            self.schedule_poll(id).await?;
        }

        Ok(updated)
    }

    /// Delete a rule. The remote delete is best-effort: the provider losing
    /// a rule we no longer want is recoverable, a dangling local row is not.
    pub async fn delete(&self, id: Uuid) -> Result<(), GorgoneError> {
        let existing = self
            .store
            .find_rule(id)
            .await?
            .ok_or_else(|| GorgoneError::NotFound(format!("rule {id}")))?;

        if let Some(external_id) = existing.external_rule_id.as_deref() {
            if let Err(e) = self.mirror.delete(external_id).await {
                tracing::warn!(rule_id = %id, external_id, error = %e, "Remote rule delete failed; deleting locally anyway");
            }
        }

        self.store.delete_rule(id).await?;
        Ok(())
    }

    async fn schedule_poll(&self, rule_id: Uuid) -> Result<(), GorgoneError> {
        let payload = serde_json::to_value(PollRulePayload { rule_id })
            .map_err(|e| GorgoneError::Scheduling(e.to_string()))?;
        self.queue
            .enqueue(
                TOPIC_POLL_RULE,
                payload,
                Some(Utc::now()),
                Some(poll_key(rule_id)),
            )
            .await
            .map_err(|e| GorgoneError::Scheduling(e.to_string()))
    }
}

/// Store operations the registry needs beyond `ContentStore`.
#[async_trait::async_trait]
pub trait RuleStoreOps: Send + Sync {
    async fn list_rules(&self, zone_id: Uuid) -> Result<Vec<RuleRow>>;
    async fn find_rule(&self, id: Uuid) -> Result<Option<RuleRow>>;
    async fn insert_rule(
        &self,
        zone_id: Uuid,
        name: &str,
        provider: Provider,
        kind: RuleKind,
        query_spec: &str,
        interval_seconds: i64,
    ) -> Result<RuleRow>;
    async fn update_rule(
        &self,
        id: Uuid,
        name: Option<&str>,
        query_spec: Option<&str>,
        interval_seconds: Option<i64>,
    ) -> Result<Option<RuleRow>>;
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<RuleRow>>;
    async fn set_rule_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<()>;
    async fn delete_rule(&self, id: Uuid) -> Result<bool>;
}

#[async_trait::async_trait]
impl RuleStoreOps for gorgone_store::Store {
    async fn list_rules(&self, zone_id: Uuid) -> Result<Vec<RuleRow>> {
        gorgone_store::Store::list_rules(self, zone_id).await
    }

    async fn find_rule(&self, id: Uuid) -> Result<Option<RuleRow>> {
        gorgone_store::Store::find_rule(self, id).await
    }

    async fn insert_rule(
        &self,
        zone_id: Uuid,
        name: &str,
        provider: Provider,
        kind: RuleKind,
        query_spec: &str,
        interval_seconds: i64,
    ) -> Result<RuleRow> {
        gorgone_store::Store::insert_rule(
            self,
            zone_id,
            name,
            provider,
            kind,
            query_spec,
            interval_seconds,
        )
        .await
    }

    async fn update_rule(
        &self,
        id: Uuid,
        name: Option<&str>,
        query_spec: Option<&str>,
        interval_seconds: Option<i64>,
    ) -> Result<Option<RuleRow>> {
        gorgone_store::Store::update_rule(self, id, name, query_spec, interval_seconds).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<RuleRow>> {
        gorgone_store::Store::set_rule_active(self, id, active).await
    }

    async fn set_rule_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<()> {
        gorgone_store::Store::set_rule_external_id(self, id, external_id).await
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool> {
        gorgone_store::Store::delete_rule(self, id).await
    }
}

fn validate_kind_provider(kind: RuleKind, provider: Provider) -> Result<(), GorgoneError> {
    let ok = match kind {
        RuleKind::NewsQuery => provider == Provider::News,
        RuleKind::Combined => provider == Provider::Tweet,
        RuleKind::Keyword | RuleKind::Hashtag | RuleKind::User => {
            matches!(provider, Provider::Tweet | Provider::Video)
        }
    };
    if ok {
        Ok(())
    } else {
        Err(GorgoneError::Validation(format!(
            "rule kind {kind} is not supported on provider {provider}"
        )))
    }
}

fn validate_interval(provider: Provider, interval_seconds: i64) -> Result<(), GorgoneError> {
    match provider {
        Provider::Tweet => {
            if interval_seconds < PUSH_MIN_INTERVAL {
                return Err(GorgoneError::Validation(format!(
                    "push rules require an interval of at least {PUSH_MIN_INTERVAL}s"
                )));
            }
        }
        Provider::News => {
            if interval_seconds < NEWS_MIN_INTERVAL {
                return Err(GorgoneError::Validation(format!(
                    "news rules require an interval of at least {NEWS_MIN_INTERVAL}s"
                )));
            }
        }
        Provider::Video => {
            if !VIDEO_INTERVALS.contains(&interval_seconds) {
                return Err(GorgoneError::Validation(format!(
                    "video rules accept only intervals of 60, 180, or 360 minutes, got {interval_seconds}s"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::orchestrator::rule_fixture;

    #[derive(Default)]
    struct MockRuleStore {
        rules: Mutex<Vec<RuleRow>>,
    }

    #[async_trait::async_trait]
    impl RuleStoreOps for &MockRuleStore {
        async fn list_rules(&self, zone_id: Uuid) -> Result<Vec<RuleRow>> {
            Ok(self
                .rules
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.zone_id == zone_id)
                .cloned()
                .collect())
        }

        async fn find_rule(&self, id: Uuid) -> Result<Option<RuleRow>> {
            Ok(self
                .rules
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned())
        }

        async fn insert_rule(
            &self,
            zone_id: Uuid,
            name: &str,
            provider: Provider,
            kind: RuleKind,
            query_spec: &str,
            interval_seconds: i64,
        ) -> Result<RuleRow> {
            let mut rule = rule_fixture(zone_id, provider, kind, query_spec, interval_seconds, None);
            rule.name = name.to_string();
            self.rules.lock().unwrap().push(rule.clone());
            Ok(rule)
        }

        async fn update_rule(
            &self,
            id: Uuid,
            name: Option<&str>,
            query_spec: Option<&str>,
            interval_seconds: Option<i64>,
        ) -> Result<Option<RuleRow>> {
            let mut rules = self.rules.lock().unwrap();
            let Some(rule) = rules.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            if let Some(name) = name {
                rule.name = name.to_string();
            }
            if let Some(query_spec) = query_spec {
                rule.query_spec = query_spec.to_string();
            }
            if let Some(interval) = interval_seconds {
                rule.interval_seconds = interval;
            }
            Ok(Some(rule.clone()))
        }

        async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<RuleRow>> {
            let mut rules = self.rules.lock().unwrap();
            let Some(rule) = rules.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            rule.is_active = active;
            Ok(Some(rule.clone()))
        }

        async fn set_rule_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<()> {
            let mut rules = self.rules.lock().unwrap();
            if let Some(rule) = rules.iter_mut().find(|r| r.id == id) {
                rule.external_rule_id = external_id.map(str::to_string);
            }
            Ok(())
        }

        async fn delete_rule(&self, id: Uuid) -> Result<bool> {
            let mut rules = self.rules.lock().unwrap();
            let before = rules.len();
            rules.retain(|r| r.id != id);
            Ok(rules.len() < before)
        }
    }

    #[derive(Default)]
    struct MockMirror {
        fail_create: bool,
        fail_delete: bool,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl RuleMirror for &MockMirror {
        async fn create(&self, _rule: &RuleRow) -> Result<String> {
            if self.fail_create {
                anyhow::bail!("remote says no");
            }
            Ok("EXT-1".to_string())
        }

        async fn update(&self, _external_id: &str, _rule: &RuleRow, _active: bool) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, external_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(external_id.to_string());
            if self.fail_delete {
                anyhow::bail!("remote unavailable");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockQueue {
        enqueued: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait::async_trait]
    impl JobEnqueuer for &MockQueue {
        async fn enqueue(
            &self,
            topic: &str,
            _payload: serde_json::Value,
            _run_after: Option<chrono::DateTime<Utc>>,
            idempotency_key: Option<String>,
        ) -> Result<()> {
            self.enqueued
                .lock()
                .unwrap()
                .push((topic.to_string(), idempotency_key));
            Ok(())
        }
    }

    #[tokio::test]
    async fn push_rule_create_mirrors_and_stores_external_id() {
        let store = MockRuleStore::default();
        let mirror = MockMirror::default();
        let queue = MockQueue::default();
        let registry = RuleRegistry::new(&store, &mirror, &queue);

        let rule = registry
            .create(
                Uuid::new_v4(),
                "ai-watch",
                Provider::Tweet,
                RuleKind::Keyword,
                "ai AND rust",
                120,
            )
            .await
            .unwrap();

        assert_eq!(rule.external_rule_id.as_deref(), Some("EXT-1"));
        // Push rules feed through the webhook, not the poll loop.
        assert!(queue.enqueued.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_create_failure_rolls_back_the_local_rule() {
        let store = MockRuleStore::default();
        let mirror = MockMirror {
            fail_create: true,
            ..Default::default()
        };
        let queue = MockQueue::default();
        let registry = RuleRegistry::new(&store, &mirror, &queue);

        let result = registry
            .create(
                Uuid::new_v4(),
                "ai-watch",
                Provider::Tweet,
                RuleKind::Keyword,
                "ai",
                120,
            )
            .await;

        assert!(result.is_err());
        assert!(store.rules.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pull_rule_create_schedules_the_first_poll() {
        let store = MockRuleStore::default();
        let mirror = MockMirror::default();
        let queue = MockQueue::default();
        let registry = RuleRegistry::new(&store, &mirror, &queue);

        let rule = registry
            .create(
                Uuid::new_v4(),
                "climate-news",
                Provider::News,
                RuleKind::NewsQuery,
                "climate AND policy",
                3600,
            )
            .await
            .unwrap();

        let enqueued = queue.enqueued.lock().unwrap();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].0, TOPIC_POLL_RULE);
        assert_eq!(enqueued[0].1.as_deref(), Some(poll_key(rule.id).as_str()));
    }

    #[tokio::test]
    async fn delete_proceeds_locally_when_remote_delete_fails() {
        let store = MockRuleStore::default();
        let mirror = MockMirror {
            fail_delete: true,
            ..Default::default()
        };
        let queue = MockQueue::default();
        let registry = RuleRegistry::new(&store, &mirror, &queue);

        let rule = registry
            .create(
                Uuid::new_v4(),
                "ai-watch",
                Provider::Tweet,
                RuleKind::Keyword,
                "ai",
                120,
            )
            .await
            .unwrap();

        registry.delete(rule.id).await.unwrap();
        assert!(store.rules.lock().unwrap().is_empty());
        assert_eq!(*mirror.deleted.lock().unwrap(), vec!["EXT-1".to_string()]);
    }

    #[tokio::test]
    async fn create_rejects_bad_interval_and_query() {
        let store = MockRuleStore::default();
        let mirror = MockMirror::default();
        let queue = MockQueue::default();
        let registry = RuleRegistry::new(&store, &mirror, &queue);

        // Interval under the push floor.
        let result = registry
            .create(
                Uuid::new_v4(),
                "r",
                Provider::Tweet,
                RuleKind::Keyword,
                "ai",
                30,
            )
            .await;
        assert!(matches!(result, Err(GorgoneError::Validation(_))));

        // Malformed boolean query.
        let result = registry
            .create(
                Uuid::new_v4(),
                "r",
                Provider::Tweet,
                RuleKind::Keyword,
                "ai AND",
                120,
            )
            .await;
        assert!(matches!(result, Err(GorgoneError::Validation(_))));

        assert!(store.rules.lock().unwrap().is_empty());
    }

    #[test]
    fn interval_floors_per_provider() {
        assert!(validate_interval(Provider::Tweet, 59).is_err());
        assert!(validate_interval(Provider::Tweet, 60).is_ok());

        assert!(validate_interval(Provider::News, 60).is_err());
        assert!(validate_interval(Provider::News, 900).is_ok());

        assert!(validate_interval(Provider::Video, 900).is_err());
        assert!(validate_interval(Provider::Video, 3600).is_ok());
        assert!(validate_interval(Provider::Video, 10800).is_ok());
        assert!(validate_interval(Provider::Video, 21600).is_ok());
        assert!(validate_interval(Provider::Video, 7200).is_err());
    }

    #[test]
    fn kind_provider_compatibility() {
        assert!(validate_kind_provider(RuleKind::NewsQuery, Provider::News).is_ok());
        assert!(validate_kind_provider(RuleKind::NewsQuery, Provider::Tweet).is_err());
        assert!(validate_kind_provider(RuleKind::Combined, Provider::Tweet).is_ok());
        assert!(validate_kind_provider(RuleKind::Combined, Provider::Video).is_err());
        assert!(validate_kind_provider(RuleKind::Hashtag, Provider::Video).is_ok());
        assert!(validate_kind_provider(RuleKind::User, Provider::Tweet).is_ok());
        assert!(validate_kind_provider(RuleKind::Keyword, Provider::News).is_err());
    }
}
