pub mod adapters;
pub mod extract;
pub mod handlers;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod traits;

pub use orchestrator::{IngestReport, Ingestor, PollReport};
pub use registry::RuleRegistry;
