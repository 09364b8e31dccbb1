pub mod backend;
pub mod service;
pub mod types;

pub use backend::{GraphBackend, HttpGraphBackend, WriteSummary};
pub use service::GraphService;
pub use types::{ApiImpact, ComponentNeighborhood, QueryMetadata};
