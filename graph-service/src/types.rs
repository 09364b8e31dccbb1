use serde::Serialize;

/// Distinct linked doc/issue/PR/chat-thread/API-endpoint ids for a component
/// (spec.md §4.2 "Neighborhood contract").
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ComponentNeighborhood {
    pub doc_ids: Vec<String>,
    pub issue_ids: Vec<String>,
    pub pr_ids: Vec<String>,
    pub chat_thread_ids: Vec<String>,
    pub api_endpoint_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ApiImpact {
    pub api_id: String,
    pub downstream_components: Vec<String>,
    pub downstream_services: Vec<String>,
}

/// Diagnostic metadata about the most recent graph call, surfaced instead of
/// propagating backend errors (spec.md §4.2 "Failure mode").
#[derive(Clone, Debug, Default, Serialize)]
pub struct QueryMetadata {
    pub backend_configured: bool,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<u64>,
}
