use std::{collections::BTreeMap, time::Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single plan step (spec.md §3 "Plan Step"). `dependencies` is the
/// explicit set; the executor's dependency analysis unions it with any
/// `$step{N}.{path}` references discovered in `parameters`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlanStep {
    pub id: i64,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<i64>,
}

/// A plan is an ordered list of steps; order is not execution order, the
/// executor derives execution order from the dependency DAG.
pub type Plan = Vec<PlanStep>;

/// The result of running one step (spec.md §3 "Step Result"). `extra` holds
/// whatever additional tool-specific fields the tool's output carried.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StepResult {
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_possible: Option<bool>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl StepResult {
    #[must_use]
    pub fn success(output: Value) -> Self {
        Self {
            output: Some(output),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failure(error_type: impl Into<String>, message: impl Into<String>, retry_possible: bool) -> Self {
        Self {
            output: None,
            error: true,
            error_type: Some(error_type.into()),
            error_message: Some(message.into()),
            retry_possible: Some(retry_possible),
            extra: Map::new(),
        }
    }
}

/// Optional execution context threaded through `execute_plan`. Plan
/// execution has no global deadline by default (spec.md §5); callers that
/// want one pass it here.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    pub deadline: Option<Instant>,
    pub max_parallel_steps: Option<usize>,
}

/// A ready-to-render map of completed step results, keyed by step id, used
/// by parameter resolution and by callers inspecting partial progress.
pub type StepResults = BTreeMap<i64, StepResult>;
