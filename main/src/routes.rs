//! HTTP surface for the server binary (spec.md §4.6/§4.9): one route that
//! runs a query through the orchestrator and, on request, folds the result
//! into a severity-scored incident candidate.

use std::sync::Arc;

use axum::{extract::State, routing::{get, post}, Json, Router};
use chrono::Utc;
use incident_builder::{append_investigation, build_incident, Evidence, IncidentCandidate, ReasoningResult};
use modality_registry::PlanHint;
use serde::Deserialize;
use severity_engine::{blend, FeatureExtractor, SeverityInputs, SeverityTarget};
use tracing::warn;

use crate::app::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/query", post(query))
        .route("/api/v1/incidents", post(incident))
        .route("/api/v1/memory", post(add_memory))
        .route("/api/v1/memory/query", post(query_memory))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    focus_component_id: Option<String>,
}

async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Json<serde_json::Value> {
    let hint: Option<PlanHint> = None;
    let result = retrieval_orchestrator::orchestrate(
        &request.question,
        hint.as_ref(),
        &state.registry,
        &state.config.search,
        &state.graph,
        &state.trace_path,
        request.focus_component_id.as_deref(),
    )
    .await;

    Json(serde_json::json!({
        "query_id": result.trace.query_id,
        "modalities_used": result.modalities_used,
        "results": result.results,
        "graph_context": result.graph_context,
    }))
}

#[derive(Deserialize)]
struct IncidentRequest {
    question: String,
    summary: String,
    #[serde(default)]
    focus_component_id: Option<String>,
    #[serde(default)]
    critical_channel_ids: Vec<String>,
}

async fn incident(State(state): State<AppState>, Json(request): Json<IncidentRequest>) -> Json<IncidentCandidate> {
    let hint: Option<PlanHint> = None;
    let orchestration = retrieval_orchestrator::orchestrate(
        &request.question,
        hint.as_ref(),
        &state.registry,
        &state.config.search,
        &state.graph,
        &state.trace_path,
        request.focus_component_id.as_deref(),
    )
    .await;

    let components: Vec<String> = request.focus_component_id.iter().cloned().collect();
    let evidence: Vec<Evidence> = orchestration
        .results
        .iter()
        .map(|r| Evidence {
            evidence_id: r.chunk_id.clone().or_else(|| r.entity_id.clone()).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            source: r.source_type.clone(),
            title: r.title.clone(),
            url: r.url.clone(),
            metadata: r.metadata.as_object().cloned().unwrap_or_default(),
            timestamp: None,
        })
        .collect();

    let target = SeverityTarget {
        query_text: request.question.clone(),
        component_ids: components.clone(),
        critical_channel_ids: request.critical_channel_ids,
    };
    let extractor = FeatureExtractor::new(Arc::clone(&state.graph), Arc::clone(&state.vector));
    let now = Utc::now();
    let inputs = SeverityInputs {
        chat: extractor.chat_features(&target, now).await,
        scm: extractor.scm_features(&target, now).await,
        doc: severity_engine::extract::doc_features("medium", "medium", now, Vec::new(), components.len() as u64),
        graph: extractor.graph_features(&target, now).await,
        semantic_pairs: extractor.semantic_pairs(&target).await,
    };
    let severity_payload = blend(&inputs, &state.config.severity, now);

    let reasoning_result = ReasoningResult {
        query: request.question,
        summary: request.summary,
        evidence,
        components,
        doc_priorities: Vec::new(),
        modalities_used: orchestration.modalities_used,
        severity_payload: Some(severity_payload),
    };

    let candidate = build_incident(&reasoning_result);
    if let Err(err) = append_investigation(&state.investigations_path, &candidate).await {
        warn!(error = %err, "failed to persist incident candidate");
    }

    Json(candidate)
}

#[derive(Deserialize)]
struct AddMemoryRequest {
    user_id: String,
    content: String,
    #[serde(default = "default_memory_category")]
    category: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_salience")]
    salience_score: f64,
    #[serde(default)]
    ttl_days: Option<u32>,
}

fn default_memory_category() -> String {
    "general".to_string()
}

fn default_salience() -> f64 {
    0.5
}

/// Adds a persistent [`common::memory::MemoryEntry`] for a user (spec.md
/// §3 "Memory Entry", C13).
async fn add_memory(State(state): State<AppState>, Json(request): Json<AddMemoryRequest>) -> Json<serde_json::Value> {
    let now = Utc::now();
    match state
        .memory
        .add(&request.user_id, request.content, request.category, request.tags, request.salience_score, request.ttl_days, now)
        .await
    {
        Ok(entry) => Json(serde_json::json!({ "memory": entry })),
        Err(err) => {
            warn!(error = %err, "failed to persist memory entry");
            Json(serde_json::json!({ "error": err.to_string() }))
        }
    }
}

#[derive(Deserialize)]
struct QueryMemoryRequest {
    user_id: String,
    #[serde(default)]
    query: String,
    #[serde(default = "default_memory_limit")]
    limit: usize,
}

fn default_memory_limit() -> usize {
    10
}

/// Keyword/tag recall over a user's persistent memories, ranked by decayed
/// salience plus a text-match bonus (spec.md §3 "Memory Entry").
async fn query_memory(State(state): State<AppState>, Json(request): Json<QueryMemoryRequest>) -> Json<serde_json::Value> {
    let now = Utc::now();
    match state.memory.query(&request.user_id, &request.query, request.limit, now).await {
        Ok(entries) => Json(serde_json::json!({ "memories": entries })),
        Err(err) => {
            warn!(error = %err, "failed to query memory store");
            Json(serde_json::json!({ "error": err.to_string() }))
        }
    }
}
