use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// The three external content providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Tweet,
    Video,
    News,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Tweet => "tweet",
            Provider::Video => "video",
            Provider::News => "news",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tweet" => Some(Provider::Tweet),
            "video" => Some(Provider::Video),
            "news" => Some(Provider::News),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Engagement counters
// ---------------------------------------------------------------------------

/// Live engagement counters for an item. Providers that lack a metric
/// report zero for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSet {
    pub view: i64,
    pub like: i64,
    pub share: i64,
    pub comment: i64,
    pub quote: i64,
    pub bookmark: i64,
    pub collect: i64,
}

impl CounterSet {
    pub fn total(&self) -> i64 {
        self.view + self.like + self.share + self.comment + self.quote + self.bookmark
            + self.collect
    }

    /// Per-metric difference against a previous reading, clamped at zero.
    /// Providers occasionally revise counts downward; negative deltas are
    /// never emitted.
    pub fn delta_since(&self, previous: &CounterSet) -> CounterSet {
        CounterSet {
            view: (self.view - previous.view).max(0),
            like: (self.like - previous.like).max(0),
            share: (self.share - previous.share).max(0),
            comment: (self.comment - previous.comment).max(0),
            quote: (self.quote - previous.quote).max(0),
            bookmark: (self.bookmark - previous.bookmark).max(0),
            collect: (self.collect - previous.collect).max(0),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

// ---------------------------------------------------------------------------
// Canonical records produced by provider adapters
// ---------------------------------------------------------------------------

/// A hashtag or mention extracted from item text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Hashtag,
    Mention,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Hashtag => "hashtag",
            EntityKind::Mention => "mention",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hashtag" => Some(EntityKind::Hashtag),
            "mention" => Some(EntityKind::Mention),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalEntity {
    pub kind: EntityKind,
    /// Value as it appeared in the text, without the sigil.
    pub value: String,
    /// Lowercased value used for dedup and lookups.
    pub normalized_value: String,
}

impl CanonicalEntity {
    pub fn new(kind: EntityKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let normalized_value = value.to_lowercase();
        Self {
            kind,
            value,
            normalized_value,
        }
    }
}

/// A provider-agnostic item as emitted by an adapter. Adapters never touch
/// the database; this is the handoff type into the item store.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalItem {
    pub provider: Provider,
    pub provider_item_id: String,
    pub text: String,
    pub language: Option<String>,
    pub created_at_source: DateTime<Utc>,
    pub reply_to_provider_item_id: Option<String>,
    pub counters: CounterSet,
    pub has_links: bool,
    pub raw_payload: serde_json::Value,
    pub entities: Vec<CanonicalEntity>,
}

/// A provider-agnostic author as emitted by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalAuthor {
    pub provider: Provider,
    pub provider_user_id: String,
    /// Always lowercased.
    pub handle: String,
    pub display_name: String,
    pub verified: bool,
    pub follower_count: i64,
    pub following_count: i64,
    pub heart_count: i64,
    pub post_count: i64,
    pub location: Option<String>,
    pub language: Option<String>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Monitoring rule kinds. Search-style kinds carry a boolean query
/// expression; atomic kinds carry a single hashtag or handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Keyword,
    Hashtag,
    User,
    Combined,
    NewsQuery,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Keyword => "keyword",
            RuleKind::Hashtag => "hashtag",
            RuleKind::User => "user",
            RuleKind::Combined => "combined",
            RuleKind::NewsQuery => "news-query",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "keyword" => Some(RuleKind::Keyword),
            "hashtag" => Some(RuleKind::Hashtag),
            "user" => Some(RuleKind::User),
            "combined" => Some(RuleKind::Combined),
            "news-query" => Some(RuleKind::NewsQuery),
            _ => None,
        }
    }

    /// Whether the query spec is a boolean search expression rather than a
    /// single hashtag/handle atom.
    pub fn is_search_style(&self) -> bool {
        matches!(
            self,
            RuleKind::Keyword | RuleKind::Combined | RuleKind::NewsQuery
        )
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Engagement tiers
// ---------------------------------------------------------------------------

/// Refresh cadence class of a tracked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cold,
    Warm,
    Hot,
    UltraHot,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::UltraHot => "ultra_hot",
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Cold => "cold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ultra_hot" => Some(Tier::UltraHot),
            "hot" => Some(Tier::Hot),
            "warm" => Some(Tier::Warm),
            "cold" => Some(Tier::Cold),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone-level velocity thresholds for tier promotion, in summed deltas per
/// hour. The promotion gate into a tier uses that tier's threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub ultra_hot_per_hour: f64,
    pub hot_per_hour: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            ultra_hot_per_hour: 180.0,
            hot_per_hour: 40.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// Recognized zone settings with typed defaults. Unknown keys are preserved
/// on round-trip but ignored by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attila_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultra_hot_velocity_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_velocity_threshold: Option<f64>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

impl ZoneSettings {
    pub fn tier_thresholds(&self) -> TierThresholds {
        let defaults = TierThresholds::default();
        TierThresholds {
            ultra_hot_per_hour: self
                .ultra_hot_velocity_threshold
                .unwrap_or(defaults.ultra_hot_per_hour),
            hot_per_hour: self.hot_velocity_threshold.unwrap_or(defaults.hot_per_hour),
        }
    }
}

/// A tenant-like namespace within a client. Created and updated by external
/// collaborators; the core treats zones as read-only.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: Uuid,
    pub client_id: Uuid,
    pub tweet_enabled: bool,
    pub video_enabled: bool,
    pub news_enabled: bool,
    pub settings: ZoneSettings,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Explicit per-request context threaded through handlers. The core never
/// reads ambient state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub zone_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub request_id: Uuid,
    pub deadline: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(deadline: DateTime<Utc>) -> Self {
        Self {
            zone_id: None,
            user_id: None,
            request_id: Uuid::new_v4(),
            deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_clamps_negative_metrics_to_zero() {
        let previous = CounterSet {
            view: 100,
            like: 50,
            ..Default::default()
        };
        let current = CounterSet {
            view: 90, // provider revised down
            like: 60,
            ..Default::default()
        };
        let delta = current.delta_since(&previous);
        assert_eq!(delta.view, 0);
        assert_eq!(delta.like, 10);
        assert_eq!(delta.total(), 10);
    }

    #[test]
    fn tier_ordering_matches_heat() {
        assert!(Tier::UltraHot > Tier::Hot);
        assert!(Tier::Hot > Tier::Warm);
        assert!(Tier::Warm > Tier::Cold);
    }

    #[test]
    fn tier_round_trips_through_str() {
        for tier in [Tier::UltraHot, Tier::Hot, Tier::Warm, Tier::Cold] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("lukewarm"), None);
    }

    #[test]
    fn zone_settings_preserve_unknown_keys() {
        let raw = serde_json::json!({
            "language": "fr",
            "attila_enabled": true,
            "some_future_flag": {"nested": 1}
        });
        let settings: ZoneSettings = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(settings.language.as_deref(), Some("fr"));
        assert!(settings.unknown.contains_key("some_future_flag"));

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["some_future_flag"], raw["some_future_flag"]);
    }

    #[test]
    fn zone_settings_thresholds_fall_back_to_defaults() {
        let settings = ZoneSettings::default();
        let thresholds = settings.tier_thresholds();
        assert_eq!(thresholds.ultra_hot_per_hour, 180.0);
        assert_eq!(thresholds.hot_per_hour, 40.0);

        let settings = ZoneSettings {
            ultra_hot_velocity_threshold: Some(500.0),
            ..Default::default()
        };
        assert_eq!(settings.tier_thresholds().ultra_hot_per_hour, 500.0);
        assert_eq!(settings.tier_thresholds().hot_per_hour, 40.0);
    }

    #[test]
    fn entity_normalizes_to_lowercase() {
        let entity = CanonicalEntity::new(EntityKind::Hashtag, "MutualAid");
        assert_eq!(entity.value, "MutualAid");
        assert_eq!(entity.normalized_value, "mutualaid");
    }
}
