pub mod planner;
pub mod registry;
pub mod state;

pub use planner::{plan, PlanHint};
pub use registry::ModalityRegistry;
pub use state::{config_hash, ModalityState, RegistryState};
