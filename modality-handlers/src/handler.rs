use async_trait::async_trait;
use common::error::AppError;
use serde_json::Value;

/// A single weighted retrieval result (spec.md §4.3 "Result shape").
#[derive(Clone, Debug, serde::Serialize)]
pub struct HandlerResult {
    pub modality: String,
    pub source_type: String,
    pub chunk_id: Option<String>,
    pub entity_id: Option<String>,
    pub title: Option<String>,
    pub text: String,
    /// `raw_score * modality.weight`.
    pub score: f64,
    pub raw_score: f64,
    pub url: Option<String>,
    pub metadata: Value,
}

impl HandlerResult {
    #[must_use]
    pub fn weighted(mut self, weight: f64) -> Self {
        self.score = self.raw_score * weight;
        self
    }
}

/// Counts returned by a handler's `ingest` call, plus free-form extra state
/// the registry should remember (e.g. `last_indexed_ts` per channel).
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct IngestCounts {
    pub items_seen: u64,
    pub chunks_written: u64,
    pub errors: u64,
    pub extra: Value,
}

/// Common contract every modality handler satisfies (spec.md §4.3).
#[async_trait]
pub trait ModalityHandler: Send + Sync {
    fn modality_id(&self) -> &str;
    fn can_ingest(&self) -> bool;
    fn can_query(&self) -> bool;
    async fn ingest(&self, scope_override: Option<Value>) -> Result<IngestCounts, AppError>;
    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError>;
}
