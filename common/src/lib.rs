pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod runtime;
pub mod state;
pub mod trace;

pub use chunk::{Chunk, SourceType};
pub use error::AppError;
