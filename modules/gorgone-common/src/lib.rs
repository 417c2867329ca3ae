pub mod config;
pub mod error;
pub mod ratelimit;
pub mod types;

pub use config::Config;
pub use error::GorgoneError;
pub use ratelimit::TokenBucket;
pub use types::{
    CanonicalAuthor, CanonicalEntity, CanonicalItem, CounterSet, EntityKind, Provider,
    RequestContext, RuleKind, Tier, TierThresholds, Zone, ZoneSettings,
};
