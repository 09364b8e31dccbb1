pub mod backend;
pub mod options;
pub mod service;

pub use backend::{HttpVectorBackend, VectorBackend};
pub use options::SearchOptions;
pub use service::VectorService;
