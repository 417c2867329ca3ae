pub mod predictions;
pub mod refresh;
pub mod store_impl;
pub mod tier;

pub use refresh::{CounterFetcher, RefreshEngine, RefreshOutcome, SnapshotPoint, TrackerStore};
pub use tier::{age_limit, initial_tier, next_tier, refresh_period, schedule_next_update};
