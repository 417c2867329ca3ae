pub mod aggregates;
pub mod models;
pub mod store;

pub use models::author::AuthorRow;
pub use models::item::{InsertOutcome, ItemRow};
pub use models::rule::RuleRow;
pub use models::snapshot::SnapshotRow;
pub use models::tracking::TrackingRow;
pub use store::Store;
