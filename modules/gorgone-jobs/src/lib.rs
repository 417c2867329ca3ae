pub mod queue;
pub mod signature;
pub mod topics;
pub mod worker;

pub use queue::{JobQueue, JobRow, JobState};
pub use signature::CallbackVerifier;
pub use topics::{
    PollRulePayload, RefreshEngagementPayload, SnapshotItemPayload, VectorizePayload,
    TOPIC_POLL_RULE, TOPIC_REFRESH_AGGREGATES, TOPIC_REFRESH_ENGAGEMENT, TOPIC_SNAPSHOT_ITEM,
    TOPIC_VECTORIZE,
};
pub use worker::{FollowUp, HandlerRegistry, JobHandler, WorkerPool};
