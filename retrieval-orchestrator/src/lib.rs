pub mod fanout;
pub mod fusion;
pub mod orchestrator;

pub use fanout::{fanout, FanoutOutcome};
pub use fusion::{fuse, modalities_used, RESPONSE_CAP};
pub use orchestrator::{orchestrate, OrchestrationResult};
