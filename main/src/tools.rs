//! The process-wide [`ToolCatalog`] (SPEC_FULL.md §4.12): one [`Tool`] per
//! action string a plan step may reference, each a thin wrapper over the
//! retrieval orchestrator, the severity engine, or the incident builder.

use std::sync::Arc;

use async_trait::async_trait;
use common::{config::SearchConfig, error::AppError};
use graph_service::GraphService;
use modality_registry::ModalityRegistry;
use plan_executor::{Tool, ToolCatalog};
use serde_json::{json, Value};
use vector_service::VectorService;

/// Resolves `query_text`/`components` into a [`retrieval_orchestrator::OrchestrationResult`],
/// the single retrieval primitive every plan step that needs evidence calls.
pub struct SearchTool {
    registry: Arc<ModalityRegistry>,
    config: SearchConfig,
    graph: Arc<GraphService>,
    trace_path: std::path::PathBuf,
}

impl SearchTool {
    #[must_use]
    pub fn new(registry: Arc<ModalityRegistry>, config: SearchConfig, graph: Arc<GraphService>, trace_path: std::path::PathBuf) -> Self {
        Self { registry, config, graph, trace_path }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn required_parameters(&self) -> &[&str] {
        &["query"]
    }

    async fn call(&self, parameters: Value) -> Result<Value, AppError> {
        let query = parameters["query"].as_str().unwrap_or_default();
        let focus_component_id = parameters.get("component_id").and_then(|v| v.as_str());

        let result = retrieval_orchestrator::orchestrate(query, None, &self.registry, &self.config, &self.graph, &self.trace_path, focus_component_id).await;

        Ok(json!({
            "modalities_used": result.modalities_used,
            "results": result.results.iter().map(|r| json!({
                "modality": r.modality,
                "source_type": r.source_type,
                "chunk_id": r.chunk_id,
                "entity_id": r.entity_id,
                "title": r.title,
                "text": r.text,
                "score": r.score,
                "url": r.url,
            })).collect::<Vec<_>>(),
            "query_id": result.trace.query_id,
        }))
    }
}

/// Looks up a component's 1-hop neighborhood and downstream API impact
/// (spec.md §4.2 "Graph Service").
pub struct GraphContextTool {
    graph: Arc<GraphService>,
}

impl GraphContextTool {
    #[must_use]
    pub fn new(graph: Arc<GraphService>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for GraphContextTool {
    fn name(&self) -> &str {
        "graph_context"
    }

    fn required_parameters(&self) -> &[&str] {
        &["component_id"]
    }

    async fn call(&self, parameters: Value) -> Result<Value, AppError> {
        let component_id = parameters["component_id"].as_str().unwrap_or_default();
        let neighborhood = self.graph.get_component_neighborhood(component_id).await;
        let impact = self.graph.get_api_impact(component_id).await;
        Ok(json!({ "neighborhood": neighborhood, "impact": impact }))
    }
}

/// Runs a raw vector similarity search, used by severity-scoring plan steps
/// that need unfused, scored chunks rather than the orchestrator's fused
/// result list.
pub struct VectorSearchTool {
    vector: Arc<VectorService>,
}

impl VectorSearchTool {
    #[must_use]
    pub fn new(vector: Arc<VectorService>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Tool for VectorSearchTool {
    fn name(&self) -> &str {
        "vector_search"
    }

    fn required_parameters(&self) -> &[&str] {
        &["query"]
    }

    async fn call(&self, parameters: Value) -> Result<Value, AppError> {
        let query = parameters["query"].as_str().unwrap_or_default();
        let top_k = parameters.get("top_k").and_then(serde_json::Value::as_u64).unwrap_or(10) as u32;
        let options = vector_service::SearchOptions::default().with_top_k(top_k);
        let scored = self.vector.semantic_search_scored(query, options).await;
        Ok(json!(scored
            .into_iter()
            .map(|(chunk, score)| json!({ "chunk_id": chunk.chunk_id, "text": chunk.text, "score": score }))
            .collect::<Vec<_>>()))
    }
}

#[must_use]
pub fn build_catalog(
    vector: Arc<VectorService>,
    graph: Arc<GraphService>,
    registry: Arc<ModalityRegistry>,
    config: SearchConfig,
    trace_path: std::path::PathBuf,
) -> ToolCatalog {
    ToolCatalog::new()
        .with_tool(Arc::new(GraphContextTool::new(Arc::clone(&graph))))
        .with_tool(Arc::new(VectorSearchTool::new(Arc::clone(&vector))))
        .with_tool(Arc::new(SearchTool::new(registry, config, graph, trace_path)))
}
