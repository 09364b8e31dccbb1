use std::collections::BTreeMap;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level application configuration, loaded the way `minne` loads its
/// `AppConfig`: a `config.toml` file layered under environment variables.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub vectordb: VectorDbConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub severity: SeverityConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            vectordb: VectorDbConfig::default(),
            graph: GraphConfig::default(),
            performance: PerformanceConfig::default(),
            severity: SeverityConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Blend weights for the Incident Severity Engine (spec.md §4.8). Axis
/// weights need not sum to 1 — the blended score is clamped after summing,
/// so an operator who wants to de-emphasize an axis can simply lower it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SeverityConfig {
    #[serde(default = "default_axis_weight")]
    pub chat_weight: f64,
    #[serde(default = "default_axis_weight")]
    pub scm_weight: f64,
    #[serde(default = "default_axis_weight")]
    pub doc_weight: f64,
    #[serde(default = "default_axis_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_axis_weight")]
    pub graph_weight: f64,
    #[serde(default = "default_doc_vs_chat_weight")]
    pub doc_vs_chat_weight: f64,
    #[serde(default = "default_doc_vs_scm_weight")]
    pub doc_vs_scm_weight: f64,
    #[serde(default = "default_doc_vs_api_weight")]
    pub doc_vs_api_weight: f64,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            chat_weight: default_axis_weight(),
            scm_weight: default_axis_weight(),
            doc_weight: default_axis_weight(),
            semantic_weight: default_axis_weight(),
            graph_weight: default_axis_weight(),
            doc_vs_chat_weight: default_doc_vs_chat_weight(),
            doc_vs_scm_weight: default_doc_vs_scm_weight(),
            doc_vs_api_weight: default_doc_vs_api_weight(),
        }
    }
}

fn default_axis_weight() -> f64 {
    0.2
}
fn default_doc_vs_chat_weight() -> f64 {
    0.3
}
fn default_doc_vs_scm_weight() -> f64 {
    0.3
}
fn default_doc_vs_api_weight() -> f64 {
    0.4
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
    #[serde(default)]
    pub defaults: SearchDefaults,
    #[serde(default)]
    pub modalities: BTreeMap<String, ModalityConfig>,
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workspace_id: default_workspace_id(),
            defaults: SearchDefaults::default(),
            modalities: BTreeMap::new(),
            planner: PlannerConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_workspace_id() -> String {
    "default".to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchDefaults {
    #[serde(default = "default_max_results")]
    pub max_results_per_modality: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms_per_modality: u64,
    #[serde(default = "default_web_fallback_weight")]
    pub web_fallback_weight: f64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            max_results_per_modality: default_max_results(),
            timeout_ms_per_modality: default_timeout_ms(),
            web_fallback_weight: default_web_fallback_weight(),
        }
    }
}

fn default_max_results() -> u32 {
    10
}
fn default_timeout_ms() -> u64 {
    2_000
}
fn default_web_fallback_weight() -> f64 {
    0.3
}

/// Per-modality declarative configuration (spec.md §3 "Modality Config").
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModalityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: serde_json::Value,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub fallback_only: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for ModalityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: serde_json::Value::Null,
            weight: default_weight(),
            timeout_ms: default_timeout_ms(),
            max_results: default_max_results(),
            fallback_only: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlannerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<PlannerRuleConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlannerRuleConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VectorDbConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_vector_url")]
    pub url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dimension")]
    pub dimension: u32,
    #[serde(default = "default_vector_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            url: default_vector_url(),
            api_key: None,
            collection: default_collection(),
            dimension: default_dimension(),
            timeout_seconds: default_vector_timeout(),
            default_top_k: default_top_k(),
            min_score: default_min_score(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_provider() -> String {
    "qdrant".to_string()
}
fn default_vector_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "chunks".to_string()
}
fn default_dimension() -> u32 {
    1536
}
fn default_vector_timeout() -> u64 {
    10
}
fn default_top_k() -> u32 {
    10
}
fn default_min_score() -> f32 {
    0.0
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_graph_uri")]
    pub uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: default_graph_uri(),
            username: None,
            password: None,
            database: None,
        }
    }
}

fn default_graph_uri() -> String {
    "http://localhost:7474".to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_true")]
    pub connection_pooling: bool,
    #[serde(default = "default_true")]
    pub rate_limiting: bool,
    #[serde(default = "default_true")]
    pub parallel_execution: bool,
    #[serde(default)]
    pub batch_embeddings: bool,
    #[serde(default = "default_true")]
    pub caching: bool,
    #[serde(default = "default_true")]
    pub background_tasks: bool,
    #[serde(default)]
    pub session_serialization: bool,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_tpm")]
    pub tokens_per_minute: u32,
    #[serde(default = "default_safety_margin")]
    pub rate_limit_safety_margin: f64,
    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            connection_pooling: true,
            rate_limiting: true,
            parallel_execution: true,
            batch_embeddings: false,
            caching: true,
            background_tasks: true,
            session_serialization: false,
            requests_per_minute: default_rpm(),
            tokens_per_minute: default_tpm(),
            rate_limit_safety_margin: default_safety_margin(),
            max_parallel_steps: default_max_parallel_steps(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_rpm() -> u32 {
    3_000
}
fn default_tpm() -> u32 {
    1_000_000
}
fn default_safety_margin() -> f64 {
    0.9
}
fn default_max_parallel_steps() -> usize {
    4
}
fn default_max_connections() -> usize {
    32
}

/// Loads configuration from `config.toml` (if present), then layers
/// environment variables on top, then applies the legacy/primary env
/// overrides for backend credentials described in spec.md §6.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let mut app_config: AppConfig = config.try_deserialize()?;
    apply_env_overrides(&mut app_config);
    Ok(app_config)
}

fn env_first(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}

/// `QDRANT_URL`/`QDRANT_API_KEY`/`QDRANT_COLLECTION` and `NEO4J_*` override
/// config for credentials, with legacy names falling back when primary names
/// are unset, per spec.md §6.
fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(url) = env_first(&["QDRANT_URL", "VECTOR_DB_URL"]) {
        config.vectordb.url = url;
        config.vectordb.enabled = true;
    }
    if let Some(key) = env_first(&["QDRANT_API_KEY", "VECTOR_DB_API_KEY"]) {
        config.vectordb.api_key = Some(key);
    }
    if let Some(collection) = env_first(&["QDRANT_COLLECTION", "VECTOR_DB_COLLECTION"]) {
        config.vectordb.collection = collection;
    }
    if let Some(uri) = env_first(&["NEO4J_URI", "NEO4J_URL"]) {
        config.graph.uri = uri;
        config.graph.enabled = true;
    }
    if let Some(user) = env_first(&["NEO4J_USERNAME", "NEO4J_USER"]) {
        config.graph.username = Some(user);
    }
    if let Some(pass) = env_first(&["NEO4J_PASSWORD", "NEO4J_PASS"]) {
        config.graph.password = Some(pass);
    }
    if let Some(db) = env_first(&["NEO4J_DATABASE"]) {
        config.graph.database = Some(db);
    }
    if config.graph.username.is_none() || config.graph.password.is_none() {
        config.graph.enabled = false;
    }
}
