use std::path::PathBuf;

use chrono::Utc;
use common::{
    config::SearchConfig,
    state::append_jsonl,
    trace::{ChunkRef, QueryTrace},
};
use graph_service::{types::ComponentNeighborhood, GraphService};
use modality_handlers::HandlerResult;
use modality_registry::{planner, ModalityRegistry, PlanHint};
use tracing::warn;

use crate::{
    fanout::{fanout, FanoutOutcome},
    fusion::{fuse, modalities_used},
};

/// The composed result of one orchestrated query (spec.md §4.6).
#[derive(Clone, Debug)]
pub struct OrchestrationResult {
    pub results: Vec<HandlerResult>,
    pub modalities_used: Vec<String>,
    pub outcomes: Vec<FanoutOutcome>,
    pub graph_context: Option<ComponentNeighborhood>,
    pub trace: QueryTrace,
}

fn to_chunk_ref(result: &HandlerResult) -> ChunkRef {
    ChunkRef {
        chunk_id: result.chunk_id.clone().unwrap_or_default(),
        source_type: result.source_type.clone(),
        source_id: result.entity_id.clone(),
        modality: result.modality.clone(),
        title: result.title.clone(),
        score: result.score,
        url: result.url.clone(),
        metadata: result.metadata.as_object().cloned().unwrap_or_default(),
    }
}

/// Runs planner → registry → fanout → fusion for a single query, re-planning
/// with fallback on a zero-result primary round, then appends a trace record
/// and optionally composes graph context for a targeted component.
pub async fn orchestrate(
    question: &str,
    hint: Option<&PlanHint>,
    registry: &ModalityRegistry,
    config: &SearchConfig,
    graph: &GraphService,
    trace_path: &PathBuf,
    focus_component_id: Option<&str>,
) -> OrchestrationResult {
    let primary_ids = planner::plan(question, config, false, hint);
    let primary_handlers = registry.iter_query_handlers(false, Some(&primary_ids));
    let primary_executed: Vec<String> = primary_handlers.iter().map(|h| h.modality_id().to_string()).collect();
    let (mut results, mut outcomes) = fanout(&primary_handlers, question, config).await;

    let mut fallback_executed = Vec::new();
    if results.is_empty() {
        let fallback_ids = planner::plan(question, config, true, hint);
        let fallback_handlers = registry.iter_query_handlers(true, Some(&fallback_ids));
        fallback_executed = fallback_handlers.iter().map(|h| h.modality_id().to_string()).collect();
        let (fallback_results, fallback_outcomes) = fanout(&fallback_handlers, question, config).await;
        results = fallback_results;
        outcomes.extend(fallback_outcomes);
    }

    let fused = fuse(results.clone());
    // "Actually executed" (spec.md §4.6): derived from the handlers the
    // registry resolved and the fanout ran, not from the planner's id list —
    // a planned-but-unregistered modality is never invoked and must not
    // appear here.
    let used = modalities_used(&[&primary_executed, &fallback_executed]);

    let graph_context = match focus_component_id {
        Some(component_id) if graph.is_configured() => Some(graph.get_component_neighborhood(component_id).await),
        _ => None,
    };

    let retrieved_chunks: Vec<ChunkRef> = results.iter().map(to_chunk_ref).collect();
    let chosen_chunks: Vec<ChunkRef> = fused.iter().map(to_chunk_ref).collect();
    let trace = QueryTrace::new(question.to_string(), used.clone(), retrieved_chunks, chosen_chunks, Utc::now());

    if let Err(err) = append_jsonl(trace_path, &trace).await {
        warn!(error = %err, "failed to append query trace");
    }

    OrchestrationResult {
        results: fused,
        modalities_used: used,
        outcomes,
        graph_context,
        trace,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::{config::ModalityConfig, error::AppError};
    use modality_handlers::{IngestCounts, ModalityHandler};
    use serde_json::json;

    use super::*;

    struct EmptyHandler {
        id: &'static str,
    }

    #[async_trait]
    impl ModalityHandler for EmptyHandler {
        fn modality_id(&self) -> &str {
            self.id
        }
        fn can_ingest(&self) -> bool {
            false
        }
        fn can_query(&self) -> bool {
            true
        }
        async fn ingest(&self, _scope_override: Option<serde_json::Value>) -> Result<IngestCounts, AppError> {
            Ok(IngestCounts::default())
        }
        async fn query(&self, _text: &str, _limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
            Ok(Vec::new())
        }
    }

    struct FallbackHandler;

    #[async_trait]
    impl ModalityHandler for FallbackHandler {
        fn modality_id(&self) -> &str {
            "web"
        }
        fn can_ingest(&self) -> bool {
            false
        }
        fn can_query(&self) -> bool {
            true
        }
        async fn ingest(&self, _scope_override: Option<serde_json::Value>) -> Result<IngestCounts, AppError> {
            Ok(IngestCounts::default())
        }
        async fn query(&self, _text: &str, _limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
            Ok(vec![HandlerResult {
                modality: "web".to_string(),
                source_type: "web".to_string(),
                chunk_id: None,
                entity_id: None,
                title: None,
                text: "fallback hit".to_string(),
                score: 1.0,
                raw_score: 1.0,
                url: None,
                metadata: json!({}),
            }])
        }
    }

    #[tokio::test]
    async fn modalities_used_excludes_enabled_modalities_with_no_registered_handler() {
        let mut config = SearchConfig::default();
        config.modalities.insert("chat".to_string(), ModalityConfig::default());
        // "scm" is enabled in config but no handler is registered for it below,
        // so the registry's iter_query_handlers filters it out before fanout
        // ever runs — it must not show up as "used".
        config.modalities.insert("scm".to_string(), ModalityConfig::default());

        let handlers: Vec<Arc<dyn ModalityHandler>> = vec![Arc::new(EmptyHandler { id: "chat" })];
        let registry = ModalityRegistry::new(config.clone(), handlers, PathBuf::from("/tmp/unused_orchestrator_registry_2.json"));
        let graph = GraphService::new(None);
        let trace_path = std::env::temp_dir().join(format!("orchestrator-trace-{}.jsonl", uuid::Uuid::new_v4()));

        let result = orchestrate("anything", None, &registry, &config, &graph, &trace_path, None).await;
        assert_eq!(result.modalities_used, vec!["chat".to_string()]);
        assert!(!result.modalities_used.contains(&"scm".to_string()));
        std::fs::remove_file(&trace_path).ok();
    }

    #[tokio::test]
    async fn zero_primary_results_triggers_a_fallback_round() {
        let mut config = SearchConfig::default();
        config.modalities.insert("chat".to_string(), ModalityConfig::default());
        config.modalities.insert(
            "web".to_string(),
            ModalityConfig {
                fallback_only: true,
                ..ModalityConfig::default()
            },
        );

        let handlers: Vec<Arc<dyn ModalityHandler>> = vec![Arc::new(EmptyHandler { id: "chat" }), Arc::new(FallbackHandler)];
        let registry = ModalityRegistry::new(config.clone(), handlers, PathBuf::from("/tmp/unused_orchestrator_registry.json"));
        let graph = GraphService::new(None);
        let trace_path = std::env::temp_dir().join(format!("orchestrator-trace-{}.jsonl", uuid::Uuid::new_v4()));

        let result = orchestrate("anything", None, &registry, &config, &graph, &trace_path, None).await;
        assert_eq!(result.results.len(), 1);
        assert!(result.modalities_used.contains(&"web".to_string()));
        std::fs::remove_file(&trace_path).ok();
    }
}
