use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOPIC_VECTORIZE: &str = "vectorize";
pub const TOPIC_REFRESH_ENGAGEMENT: &str = "refresh_engagement";
pub const TOPIC_POLL_RULE: &str = "poll_rule";
pub const TOPIC_SNAPSHOT_ITEM: &str = "snapshot_item";
pub const TOPIC_REFRESH_AGGREGATES: &str = "refresh_aggregates";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizePayload {
    pub item_ids: Vec<Uuid>,
    pub zone_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshEngagementPayload {
    pub item_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollRulePayload {
    pub rule_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotItemPayload {
    pub item_db_id: Uuid,
}

/// Idempotency key serializing snapshot refreshes per item.
pub fn snapshot_key(item_id: Uuid) -> String {
    format!("snapshot:{item_id}")
}

/// Idempotency key serializing polls per rule.
pub fn poll_key(rule_id: Uuid) -> String {
    format!("poll_rule:{rule_id}")
}

/// Idempotency key for the first engagement tick after ingest.
pub fn refresh_key(item_id: Uuid) -> String {
    format!("refresh:{item_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_keys_are_stable_per_target() {
        let id = Uuid::new_v4();
        assert_eq!(snapshot_key(id), snapshot_key(id));
        assert_eq!(poll_key(id), format!("poll_rule:{id}"));
        assert_ne!(snapshot_key(id), poll_key(id));
    }
}
