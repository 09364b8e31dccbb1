//! Background verification of critical steps and root-cause annotation on
//! replan (spec.md §4.7 "Verification", §9 "Background verification").

use async_trait::async_trait;
use serde::Serialize;

use crate::step::{PlanStep, StepResult};

/// Outcome of re-reading the user goal, the step definition, and its result
/// (spec.md §4.7).
#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub confidence: f64,
}

impl VerificationResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
            suggestions: Vec::new(),
            confidence: 1.0,
        }
    }
}

/// Re-reads the user goal, the step definition, and its result, and judges
/// whether the step actually achieved what it claims to.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, goal: &str, step: &PlanStep, result: &StepResult) -> VerificationResult;
}

/// A structured reason attached to a `NEEDS_REPLAN` outcome (spec.md §4.7
/// "Failure handling").
#[derive(Clone, Debug, Serialize)]
pub struct ReplanReason {
    pub step_id: i64,
    pub cause: String,
    #[serde(default)]
    pub corrective_actions: Vec<String>,
}

/// Consulted on a retryable failure or a high-confidence negative
/// verification to annotate the replan reason with a root cause
/// (spec.md §4.7 "Failure handling").
#[async_trait]
pub trait Critic: Send + Sync {
    async fn diagnose(&self, goal: &str, step: &PlanStep, result: &StepResult) -> ReplanReason;
}

/// Threshold above which a negative verification forces `NEEDS_REPLAN`
/// (spec.md §4.7: "confidence >0.8").
pub const VERIFICATION_REPLAN_CONFIDENCE: f64 = 0.8;
