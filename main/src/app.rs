//! Process-wide wiring: builds every service from [`AppConfig`] and holds
//! the handles both binaries share (spec.md §9 "Global state", built once
//! at startup and threaded through explicitly).

use std::{path::PathBuf, sync::Arc};

use async_openai::{config::OpenAIConfig, Client};
use common::{
    config::AppConfig,
    embedding::EmbeddingProvider,
    error::AppError,
    memory::{MemoryStore, SessionStore},
    runtime::RuntimeServices,
};
use graph_service::{GraphService, HttpGraphBackend};
use modality_handlers::{ChatHandler, DocIssuesHandler, DocsHandler, ScmHandler, VideoHandler, WebFallbackHandler};
use modality_registry::ModalityRegistry;
use plan_executor::PlanExecutor;
use vector_service::{HttpVectorBackend, VectorService};

use crate::{stubs, tools};

/// Everything a binary needs to serve queries or run ingestion, built once
/// from config at startup (spec.md §2 "thin `main` crate wiring everything
/// together").
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub runtime: RuntimeServices,
    pub vector: Arc<VectorService>,
    pub graph: Arc<GraphService>,
    pub registry: Arc<ModalityRegistry>,
    pub executor: Arc<PlanExecutor>,
    pub trace_path: PathBuf,
    pub investigations_path: PathBuf,
    pub memory: Arc<MemoryStore>,
    pub session: Arc<SessionStore>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let runtime = RuntimeServices::from_config(&config.performance);

        let openai_client = Client::with_config(OpenAIConfig::new());
        let embeddings = Arc::new(EmbeddingProvider::new(openai_client, config.vectordb.embedding_model.clone(), config.vectordb.dimension));

        let vector_backend: Arc<dyn vector_service::VectorBackend> = Arc::new(HttpVectorBackend::new(
            reqwest::Client::new(),
            config.vectordb.url.clone(),
            config.vectordb.api_key.clone(),
        ));
        let vector = Arc::new(VectorService::new(vector_backend, embeddings, &config.vectordb));

        let graph_backend: Option<Arc<dyn graph_service::GraphBackend>> = if config.graph.enabled {
            Some(Arc::new(HttpGraphBackend::new(
                reqwest::Client::new(),
                config.graph.uri.clone(),
                config.graph.database.clone().unwrap_or_else(|| "neo4j".to_string()),
                config.graph.username.clone().unwrap_or_default(),
                config.graph.password.clone().unwrap_or_default(),
            )))
        } else {
            None
        };
        let graph = Arc::new(GraphService::new(graph_backend));

        let data_dir = PathBuf::from(&config.data_dir);
        let registry_state_path = data_dir.join("state").join("search_registry.json");
        let doc_roots = vec![data_dir.join("docs")];
        let doc_issues_path = data_dir.join("state").join("doc_issues.json");

        let handlers = build_handlers(&config, &vector, &graph, doc_roots, doc_issues_path);
        let registry = Arc::new(ModalityRegistry::new(config.search.clone(), handlers, registry_state_path));
        registry.load().await;

        let trace_path = data_dir.join("state").join("query_traces.jsonl");
        let catalog = Arc::new(tools::build_catalog(
            Arc::clone(&vector),
            Arc::clone(&graph),
            Arc::clone(&registry),
            config.search.clone(),
            trace_path.clone(),
        ));
        let executor = Arc::new(PlanExecutor::new(catalog, config.performance.max_parallel_steps));

        Ok(Self {
            trace_path,
            investigations_path: data_dir.join("state").join("investigations.jsonl"),
            memory: Arc::new(MemoryStore::new(&data_dir)),
            session: Arc::new(SessionStore::new()),
            config,
            runtime,
            vector,
            graph,
            registry,
            executor,
        })
    }
}

fn build_handlers(
    config: &AppConfig,
    vector: &Arc<VectorService>,
    graph: &Arc<GraphService>,
    doc_roots: Vec<PathBuf>,
    doc_issues_path: PathBuf,
) -> Vec<Arc<dyn modality_handlers::ModalityHandler>> {
    let weight_for = |modality_id: &str| config.search.modalities.get(modality_id).map_or(1.0, |m| m.weight);

    vec![
        Arc::new(DocsHandler::new(Arc::clone(vector), Arc::clone(graph), doc_roots, weight_for("docs"))),
        Arc::new(DocIssuesHandler::new(doc_issues_path, weight_for("doc_issues"))),
        Arc::new(ChatHandler::new(Arc::new(stubs::DisabledChatApi), Arc::clone(vector), Arc::clone(graph), Vec::new(), weight_for("chat"))),
        Arc::new(ScmHandler::new(Arc::new(stubs::DisabledScmApi), Arc::clone(vector), Arc::clone(graph), Vec::new(), Vec::new(), weight_for("scm"))),
        Arc::new(VideoHandler::new(Arc::new(stubs::DisabledVideoApi), Arc::clone(vector), Arc::clone(graph), Vec::new(), weight_for("video"))),
        Arc::new(WebFallbackHandler::new(Arc::new(stubs::DisabledWebSearchApi), weight_for("web"))),
    ]
}
