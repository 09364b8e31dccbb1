//! Cross-crate flows that a single crate's unit tests can't exercise:
//! registry → planner → orchestrator fanout/fallback, the plan executor
//! running a multi-level DAG with templated parameters against real tool
//! implementations, and a severity blend feeding the incident builder.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use common::{config::ModalityConfig, error::AppError};
use incident_builder::{build_incident, Evidence, ReasoningResult};
use modality_handlers::{HandlerResult, IngestCounts, ModalityHandler};
use modality_registry::ModalityRegistry;
use plan_executor::{PlanExecutor, PlanStep, Tool, ToolCatalog};
use serde_json::{json, Map, Value};
use severity_engine::{
    blend, ChatFeatureInput, DocFeatureInput, GraphFeatureInput, ScmFeatureInput, SemanticPairResult, SeverityInputs,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("integration-tests-{name}-{}", uuid::Uuid::new_v4()))
}

struct StubHandler {
    id: &'static str,
    results: Vec<HandlerResult>,
}

#[async_trait]
impl ModalityHandler for StubHandler {
    fn modality_id(&self) -> &str {
        self.id
    }
    fn can_ingest(&self) -> bool {
        false
    }
    fn can_query(&self) -> bool {
        true
    }
    async fn ingest(&self, _scope_override: Option<Value>) -> Result<IngestCounts, AppError> {
        Ok(IngestCounts::default())
    }
    async fn query(&self, _text: &str, _limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        Ok(self.results.clone())
    }
}

fn hit(modality: &str, source_type: &str, raw_score: f64) -> HandlerResult {
    HandlerResult {
        modality: modality.to_string(),
        source_type: source_type.to_string(),
        chunk_id: Some(format!("chunk:{modality}")),
        entity_id: Some(format!("{source_type}:{modality}")),
        title: Some(format!("{modality} hit")),
        text: "some retrieved text".to_string(),
        raw_score,
        score: 0.0,
        url: None,
        metadata: json!({ "component_id": "auth" }),
    }
}

/// A query whose primary fanout is empty falls through to exactly one
/// fallback round over the web-fallback modality (spec.md §4.6, scenario 2).
#[tokio::test]
async fn orchestrator_falls_back_when_primary_fanout_is_empty() {
    let mut config = common::config::SearchConfig::default();
    config.modalities.insert("chat".to_string(), ModalityConfig::default());
    config.modalities.insert(
        "web".to_string(),
        ModalityConfig {
            fallback_only: true,
            weight: 0.5,
            ..ModalityConfig::default()
        },
    );

    let handlers: Vec<Arc<dyn ModalityHandler>> = vec![
        Arc::new(StubHandler { id: "chat", results: vec![] }),
        Arc::new(StubHandler { id: "web", results: vec![hit("web", "web", 1.0)] }),
    ];
    let registry = ModalityRegistry::new(config.clone(), handlers, temp_path("registry"));
    let graph = graph_service::GraphService::new(None);
    let trace_path = temp_path("trace.jsonl");

    let result = retrieval_orchestrator::orchestrate("anything at all", None, &registry, &config, &graph, &trace_path, None).await;

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].modality, "web");
    assert_eq!(result.modalities_used, vec!["chat".to_string(), "web".to_string()]);
    assert_eq!(result.trace.chosen_chunks.len(), 1);
    std::fs::remove_file(&trace_path).ok();
}

/// Fused multi-modality results feed a severity blend, which in turn feeds
/// the incident builder; every evidence id referenced by an entity rollup
/// must exist in the candidate's evidence list (spec.md §3, §8).
#[tokio::test]
async fn orchestrated_results_flow_into_a_scored_incident_candidate() {
    let mut config = common::config::SearchConfig::default();
    config.modalities.insert("chat".to_string(), ModalityConfig::default());
    config.modalities.insert("scm".to_string(), ModalityConfig::default());

    let handlers: Vec<Arc<dyn ModalityHandler>> = vec![
        Arc::new(StubHandler { id: "chat", results: vec![hit("chat", "chat", 2.0)] }),
        Arc::new(StubHandler { id: "scm", results: vec![hit("scm", "scm", 3.0)] }),
    ];
    let registry = ModalityRegistry::new(config.clone(), handlers, temp_path("registry"));
    let graph = graph_service::GraphService::new(None);
    let trace_path = temp_path("trace.jsonl");

    let orchestration = retrieval_orchestrator::orchestrate("auth token bug", None, &registry, &config, &graph, &trace_path, None).await;
    assert_eq!(orchestration.results.len(), 2);

    let evidence: Vec<Evidence> = orchestration
        .results
        .iter()
        .map(|r| Evidence {
            evidence_id: r.chunk_id.clone().unwrap_or_default(),
            source: r.source_type.clone(),
            title: r.title.clone(),
            url: r.url.clone(),
            metadata: r.metadata.as_object().cloned().unwrap_or_default(),
            timestamp: Some(Utc::now()),
        })
        .collect();

    let now = Utc::now();
    let inputs = SeverityInputs {
        chat: ChatFeatureInput {
            messages_7d: 12,
            threads_7d: 3,
            unique_authors_7d: 4,
            max_signal_weight: 1.0,
            avg_signal_weight: 1.0,
            hours_since_last_seen: 2.0,
            in_critical_channel: true,
            label_count: 1,
        },
        scm: ScmFeatureInput {
            prs_7d: 2,
            commits_7d: 5,
            doc_changes_7d: 1,
            breaking_labels_7d: 1,
            max_signal_weight: 1.0,
            hours_since_last_seen: 3.0,
        },
        doc: DocFeatureInput {
            base_severity_score: 0.85,
            impact_level_score: 0.6,
            updated_at: now,
            labels: vec!["security".to_string()],
            component_count: 1,
        },
        graph: GraphFeatureInput {
            num_components: 1,
            num_docs: 1,
            num_services: 1,
            num_related_doc_issues: 1,
            activity_signals_7d_chat: 2,
            activity_signals_7d_scm: 2,
            num_support_cases: 1,
            downstream_components_depth2: 1,
        },
        semantic_pairs: SemanticPairResult::default(),
    };
    let severity_payload = blend(&inputs, &common::config::SeverityConfig::default(), now);

    let reasoning_result = ReasoningResult {
        query: "auth token bug".to_string(),
        summary: "Auth tokens intermittently rejected after the refactor.".to_string(),
        evidence,
        components: vec!["auth".to_string()],
        doc_priorities: vec![],
        modalities_used: orchestration.modalities_used.clone(),
        severity_payload: Some(severity_payload),
    };

    let incident = build_incident(&reasoning_result);
    assert_eq!(incident.counts.evidence, 2);
    assert_eq!(incident.counts.components, 1);
    assert!(incident.blast_radius_score > 0.0 && incident.blast_radius_score <= 100.0);

    let known_ids: std::collections::HashSet<&str> = incident.evidence.iter().map(|e| e.evidence_id.as_str()).collect();
    for entity in &incident.incident_entities {
        for evidence_id in &entity.evidence_ids {
            assert!(known_ids.contains(evidence_id.as_str()));
        }
    }
    std::fs::remove_file(&trace_path).ok();
}

struct CountGroupsTool;

#[async_trait]
impl Tool for CountGroupsTool {
    fn name(&self) -> &str {
        "count_groups"
    }
    fn required_parameters(&self) -> &[&str] {
        &[]
    }
    async fn call(&self, _parameters: Value) -> Result<Value, AppError> {
        Ok(json!({ "count": 2, "wasted_mb": 0.38 }))
    }
}

struct SummarizeTool;

#[async_trait]
impl Tool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }
    fn required_parameters(&self) -> &[&str] {
        &["message"]
    }
    async fn call(&self, parameters: Value) -> Result<Value, AppError> {
        Ok(json!({ "message": parameters["message"].clone() }))
    }
}

/// A two-level plan whose second step references the first step's output
/// through the `$step{N}.{path}` template DSL resolves end to end with no
/// orphan braces (spec.md §4.7, scenario 4).
#[tokio::test]
async fn plan_executor_resolves_templated_parameters_across_levels() {
    let catalog = Arc::new(
        ToolCatalog::new()
            .with_tool(Arc::new(CountGroupsTool))
            .with_tool(Arc::new(SummarizeTool)),
    );
    let executor = PlanExecutor::new(catalog, 4);

    let mut params = Map::new();
    params.insert(
        "message".to_string(),
        json!("Found {$step1.count} groups, wasting {$step1.wasted_mb} MB"),
    );
    let plan: Vec<PlanStep> = vec![
        PlanStep { id: 1, action: "count_groups".to_string(), parameters: Map::new(), dependencies: vec![] },
        PlanStep { id: 2, action: "summarize".to_string(), parameters: params, dependencies: vec![1] },
    ];

    let result = executor.execute_plan(&plan, "summarize duplicate groups", None).await;

    assert_eq!(result.steps_completed, 2);
    assert_eq!(
        result.step_results[&2].output.as_ref().unwrap()["message"],
        json!("Found 2 groups, wasting 0.38 MB")
    );
    assert_eq!(result.final_output.unwrap()["message"], json!("Found 2 groups, wasting 0.38 MB"));
}
