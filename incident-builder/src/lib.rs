//! The Incident/Trace Builder (spec.md §4.9, C10): turns a reasoning run's
//! query, summary, evidence, components, and doc priorities into a full
//! incident candidate with blast-radius severity and per-entity rollups.

pub mod blast;
pub mod builder;
pub mod entities;
pub mod persist;
pub mod types;

pub use blast::{compute_blast_radius, severity_for_total, source_trust, BlastRadius};
pub use builder::build_incident;
pub use entities::{average_freshness_hours, build_entities, build_evidence_index, build_scope};
pub use persist::{append_investigation, MAX_INVESTIGATIONS};
pub use types::{DocPriority, Evidence, IncidentCandidate, IncidentCounts, IncidentEntity, IncidentScope, IncidentSeverity, ReasoningResult};
