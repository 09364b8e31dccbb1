//! The DAG executor (spec.md §4.7 "Plan Executor", C8): groups steps into
//! dependency levels, runs each level concurrently bounded by
//! `max_parallel_steps`, resolves templated parameters across step results,
//! validates tool contracts, and supports background verification and
//! failure-driven replanning.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::Instant,
};

use serde::Serialize;
use serde_json::Value;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    dependency::{build_levels, effective_dependencies},
    params::resolve_parameters,
    step::{ExecutionContext, Plan, PlanStep, StepResult, StepResults},
    tool::ToolCatalog,
    verify::{Critic, ReplanReason, VerificationResult, Verifier, VERIFICATION_REPLAN_CONFIDENCE},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Success,
    PartialSuccess,
    Failed,
    NeedsReplan,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub status: PlanStatus,
    pub steps_completed: usize,
    pub steps_total: usize,
    pub step_results: StepResults,
    pub verification_results: BTreeMap<i64, VerificationResult>,
    pub final_output: Option<Value>,
    pub error: Option<String>,
    pub needs_replan: bool,
    pub replan_reason: Option<ReplanReason>,
}

impl ExecutionResult {
    fn validation_failure(steps_total: usize, message: String) -> Self {
        Self {
            status: PlanStatus::Failed,
            steps_completed: 0,
            steps_total,
            step_results: StepResults::new(),
            verification_results: BTreeMap::new(),
            final_output: None,
            error: Some(message),
            needs_replan: false,
            replan_reason: None,
        }
    }
}

/// Runs plans against a [`ToolCatalog`], optionally verifying critical steps
/// and consulting a critic on failure (spec.md §4.7, §9).
pub struct PlanExecutor {
    catalog: Arc<ToolCatalog>,
    verifier: Option<Arc<dyn Verifier>>,
    critic: Option<Arc<dyn Critic>>,
    max_parallel_steps: usize,
}

impl PlanExecutor {
    #[must_use]
    pub fn new(catalog: Arc<ToolCatalog>, max_parallel_steps: usize) -> Self {
        Self {
            catalog,
            verifier: None,
            critic: None,
            max_parallel_steps,
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    #[must_use]
    pub fn with_critic(mut self, critic: Arc<dyn Critic>) -> Self {
        self.critic = Some(critic);
        self
    }

    /// Executes `plan` level by level. Each level is a barrier: it must
    /// finish (successfully or not) before the next level starts, but steps
    /// within a level run concurrently up to `max_parallel_steps`.
    #[tracing::instrument(skip_all, fields(goal, steps_total = plan.len()))]
    pub async fn execute_plan(&self, plan: &Plan, goal: &str, context: Option<ExecutionContext>) -> ExecutionResult {
        let steps_total = plan.len();
        let levels = match build_levels(plan) {
            Ok(levels) => levels,
            Err(err) => return ExecutionResult::validation_failure(steps_total, err.to_string()),
        };

        let steps_by_id: HashMap<i64, PlanStep> = plan.iter().map(|s| (s.id, s.clone())).collect();
        let max_parallel = context
            .as_ref()
            .and_then(|c| c.max_parallel_steps)
            .unwrap_or(self.max_parallel_steps)
            .max(1);
        let deadline = context.and_then(|c| c.deadline);

        let mut step_results = StepResults::new();
        let mut verification_handles: JoinSet<(i64, VerificationResult)> = JoinSet::new();
        let mut failed = false;
        let mut needs_replan = false;
        let mut replan_reason: Option<ReplanReason> = None;
        let mut failure_detail: Option<(i64, String)> = None;

        'levels: for level in &levels {
            let semaphore = Arc::new(Semaphore::new(max_parallel));
            let mut handles: JoinSet<(i64, StepResult)> = JoinSet::new();
            let snapshot = step_results.clone();

            for &id in level {
                let Some(step) = steps_by_id.get(&id).cloned() else {
                    continue;
                };
                let deps = effective_dependencies(&step);
                if let Some(blocked_on) = deps.iter().find(|d| snapshot.get(d).is_some_and(|r| r.error)) {
                    let result = StepResult::failure("DependencyFailed", format!("blocked: dependency {blocked_on} failed"), false);
                    handles.spawn(async move { (id, result) });
                    continue;
                }

                let catalog = Arc::clone(&self.catalog);
                let semaphore = Arc::clone(&semaphore);
                let snapshot = snapshot.clone();
                handles.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let resolved = resolve_parameters(&Value::Object(step.parameters.clone()), &snapshot);
                    let Some(tool) = catalog.get(&step.action) else {
                        return (
                            id,
                            StepResult::failure("ToolNotFound", format!("no tool registered for action `{}`", step.action), false),
                        );
                    };
                    if let Err(err) = tool.validate(&resolved) {
                        return (id, StepResult::failure(err.validation_error_type(), err.to_string(), false));
                    }
                    match tool.call(resolved).await {
                        Ok(output) => (id, StepResult::success(output)),
                        Err(err) => (id, StepResult::failure("ToolExecutionError", err.to_string(), true)),
                    }
                });
            }

            while let Some(joined) = handles.join_next().await {
                let (id, result) = match joined {
                    Ok(pair) => pair,
                    Err(join_err) => {
                        failed = true;
                        failure_detail.get_or_insert((-1, join_err.to_string()));
                        continue;
                    }
                };

                if !result.error {
                    self.maybe_submit_verification(&steps_by_id, &mut verification_handles, goal, id, &result);
                } else if result.retry_possible == Some(true) {
                    needs_replan = true;
                    replan_reason.get_or_insert_with(|| ReplanReason {
                        step_id: id,
                        cause: result.error_message.clone().unwrap_or_default(),
                        corrective_actions: Vec::new(),
                    });
                } else {
                    failed = true;
                    failure_detail.get_or_insert((id, result.error_message.clone().unwrap_or_default()));
                }

                step_results.insert(id, result);
            }

            if failed || needs_replan {
                break 'levels;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break 'levels;
            }
        }

        let mut verification_results = BTreeMap::new();
        while let Some(joined) = verification_handles.join_next().await {
            if let Ok((id, verdict)) = joined {
                if !verdict.valid && verdict.confidence > VERIFICATION_REPLAN_CONFIDENCE {
                    needs_replan = true;
                    replan_reason.get_or_insert_with(|| ReplanReason {
                        step_id: id,
                        cause: format!("verification failed: {}", verdict.issues.join("; ")),
                        corrective_actions: verdict.suggestions.clone(),
                    });
                }
                verification_results.insert(id, verdict);
            }
        }

        if needs_replan && !failed {
            if let (Some(critic), Some(reason)) = (&self.critic, replan_reason.clone()) {
                if let (Some(step), Some(result)) = (steps_by_id.get(&reason.step_id), step_results.get(&reason.step_id)) {
                    replan_reason = Some(critic.diagnose(goal, step, result).await);
                }
            }
        }

        let steps_completed = step_results.values().filter(|r| !r.error).count();
        let status = if failed {
            PlanStatus::Failed
        } else if needs_replan {
            PlanStatus::NeedsReplan
        } else if steps_completed == steps_total {
            PlanStatus::Success
        } else {
            PlanStatus::PartialSuccess
        };

        let error = failure_detail.map(|(id, message)| {
            if id < 0 {
                format!("plan execution panicked: {message}")
            } else {
                format!("step {id} failed: {message}")
            }
        });

        ExecutionResult {
            status,
            steps_completed,
            steps_total,
            final_output: terminal_output(plan, &step_results),
            step_results,
            verification_results,
            error,
            needs_replan,
            replan_reason,
        }
    }

    fn maybe_submit_verification(
        &self,
        steps_by_id: &HashMap<i64, PlanStep>,
        verification_handles: &mut JoinSet<(i64, VerificationResult)>,
        goal: &str,
        id: i64,
        result: &StepResult,
    ) {
        let Some(step) = steps_by_id.get(&id) else { return };
        let Some(tool) = self.catalog.get(&step.action) else { return };
        if !tool.is_critical() {
            return;
        }
        let Some(verifier) = self.verifier.clone() else { return };
        let goal = goal.to_string();
        let step = step.clone();
        let result = result.clone();
        verification_handles.spawn(async move { (id, verifier.verify(&goal, &step, &result).await) });
    }
}

/// The final response's output: the highest-id step that no other step
/// depends on (a "sink" of the DAG) and that completed without error.
fn terminal_output(plan: &Plan, step_results: &StepResults) -> Option<Value> {
    let mut referenced: BTreeSet<i64> = BTreeSet::new();
    for step in plan {
        referenced.extend(effective_dependencies(step));
    }
    let mut terminal_ids: Vec<i64> = plan.iter().map(|s| s.id).filter(|id| !referenced.contains(id)).collect();
    terminal_ids.sort_unstable();
    terminal_ids
        .iter()
        .rev()
        .find_map(|id| step_results.get(id).filter(|r| !r.error).and_then(|r| r.output.clone()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use common::error::AppError;
    use serde_json::json;

    use super::*;
    use crate::tool::Tool;

    struct SleepyEcho {
        delay: Duration,
    }

    #[async_trait]
    impl Tool for SleepyEcho {
        fn name(&self) -> &str {
            "sleepy_echo"
        }
        fn required_parameters(&self) -> &[&str] {
            &[]
        }
        async fn call(&self, parameters: Value) -> Result<Value, AppError> {
            tokio::time::sleep(self.delay).await;
            Ok(parameters)
        }
    }

    struct AlwaysFails {
        retry_possible: bool,
    }

    #[async_trait]
    impl Tool for AlwaysFails {
        fn name(&self) -> &str {
            "always_fails"
        }
        fn required_parameters(&self) -> &[&str] {
            &[]
        }
        async fn call(&self, _parameters: Value) -> Result<Value, AppError> {
            if self.retry_possible {
                Err(AppError::InternalError("boom".to_string()))
            } else {
                Err(AppError::Validation("bad input".to_string()))
            }
        }
    }

    fn step(id: i64, action: &str, deps: Vec<i64>) -> PlanStep {
        PlanStep {
            id,
            action: action.to_string(),
            parameters: serde_json::Map::new(),
            dependencies: deps,
        }
    }

    #[tokio::test]
    async fn independent_steps_run_in_parallel_not_in_series() {
        let catalog = Arc::new(ToolCatalog::new().with_tool(Arc::new(SleepyEcho { delay: Duration::from_millis(100) })));
        let executor = PlanExecutor::new(catalog, 4);
        let plan = vec![
            step(1, "sleepy_echo", vec![]),
            step(2, "sleepy_echo", vec![]),
            step(3, "sleepy_echo", vec![1, 2]),
        ];

        let started = Instant::now();
        let result = executor.execute_plan(&plan, "goal", None).await;
        assert_eq!(result.status, PlanStatus::Success);
        assert_eq!(result.steps_completed, 3);
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    struct AttachTool;

    #[async_trait]
    impl Tool for AttachTool {
        fn name(&self) -> &str {
            "attach"
        }
        fn required_parameters(&self) -> &[&str] {
            &["attachments"]
        }
        fn validate(&self, parameters: &Value) -> Result<(), AppError> {
            match parameters.get("attachments") {
                Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
                Some(_) => Err(AppError::InvalidParameters(
                    "attachments must be a list of file paths, not inlined content".to_string(),
                )),
                None => Err(AppError::Validation("missing required parameter `attachments`".to_string())),
            }
        }
        async fn call(&self, parameters: Value) -> Result<Value, AppError> {
            Ok(parameters)
        }
    }

    #[tokio::test]
    async fn stricter_validator_failure_is_reported_as_invalid_not_missing_parameters() {
        let catalog = Arc::new(ToolCatalog::new().with_tool(Arc::new(AttachTool)));
        let executor = PlanExecutor::new(catalog, 4);
        let mut attach_step = step(1, "attach", vec![]);
        attach_step.parameters.insert("attachments".to_string(), json!("inlined content, not a path"));

        let result = executor.execute_plan(&[attach_step], "goal", None).await;
        assert_eq!(result.status, PlanStatus::Failed);
        assert_eq!(result.step_results[&1].error_type.as_deref(), Some("InvalidParameters"));
    }

    #[tokio::test]
    async fn unknown_tool_blocks_dependents_without_invoking_them() {
        let catalog = Arc::new(ToolCatalog::new());
        let executor = PlanExecutor::new(catalog, 4);
        let plan = vec![step(1, "missing_tool", vec![]), step(2, "missing_tool", vec![1])];

        let result = executor.execute_plan(&plan, "goal", None).await;
        assert_eq!(result.status, PlanStatus::Failed);
        assert_eq!(result.step_results.len(), 1);
        assert_eq!(result.step_results[&1].error_type.as_deref(), Some("ToolNotFound"));
    }

    #[tokio::test]
    async fn retryable_failure_yields_needs_replan() {
        let catalog = Arc::new(ToolCatalog::new().with_tool(Arc::new(AlwaysFails { retry_possible: true })));
        let executor = PlanExecutor::new(catalog, 4);
        let plan = vec![step(1, "always_fails", vec![])];

        let result = executor.execute_plan(&plan, "goal", None).await;
        assert_eq!(result.status, PlanStatus::NeedsReplan);
        assert!(result.needs_replan);
        assert!(result.replan_reason.is_some());
    }

    #[tokio::test]
    async fn non_retryable_failure_yields_failed() {
        let catalog = Arc::new(ToolCatalog::new().with_tool(Arc::new(AlwaysFails { retry_possible: false })));
        let executor = PlanExecutor::new(catalog, 4);
        let plan = vec![step(1, "always_fails", vec![])];

        let result = executor.execute_plan(&plan, "goal", None).await;
        assert_eq!(result.status, PlanStatus::Failed);
        assert!(!result.needs_replan);
    }

    #[tokio::test]
    async fn cyclic_plan_is_rejected_before_any_step_runs() {
        let catalog = Arc::new(ToolCatalog::new());
        let executor = PlanExecutor::new(catalog, 4);
        let plan = vec![step(1, "noop", vec![2]), step(2, "noop", vec![1])];

        let result = executor.execute_plan(&plan, "goal", None).await;
        assert_eq!(result.status, PlanStatus::Failed);
        assert_eq!(result.steps_completed, 0);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn final_output_is_the_terminal_steps_result() {
        let catalog = Arc::new(ToolCatalog::new().with_tool(Arc::new(SleepyEcho { delay: Duration::from_millis(1) })));
        let executor = PlanExecutor::new(catalog, 4);
        let mut step2 = step(2, "sleepy_echo", vec![1]);
        step2.parameters.insert("marker".to_string(), json!("final"));
        let plan = vec![step(1, "sleepy_echo", vec![]), step2];

        let result = executor.execute_plan(&plan, "goal", None).await;
        assert_eq!(result.status, PlanStatus::Success);
        assert_eq!(result.final_output.unwrap()["marker"], json!("final"));
    }
}
