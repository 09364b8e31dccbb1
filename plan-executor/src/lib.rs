//! The Plan Executor (spec.md §4.7, C8): runs a dependency-ordered DAG of
//! tool-invoking steps, resolving `$step{N}.{path}` references between them
//! and supporting background verification and replan diagnosis.

mod dependency;
mod executor;
mod params;
mod step;
mod tool;
mod verify;

pub use dependency::{as_sole_reference, effective_dependencies, scan_references, build_levels, StepReference};
pub use executor::{ExecutionResult, PlanExecutor, PlanStatus};
pub use params::resolve_parameters;
pub use step::{ExecutionContext, Plan, PlanStep, StepResult, StepResults};
pub use tool::{Tool, ToolCatalog};
pub use verify::{Critic, ReplanReason, VerificationResult, Verifier, VERIFICATION_REPLAN_CONFIDENCE};
