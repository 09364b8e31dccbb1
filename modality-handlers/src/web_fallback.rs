use std::sync::Arc;

use async_trait::async_trait;
use common::{chunk::entity_id, error::AppError};
use serde_json::{json, Value};

use crate::handler::{HandlerResult, IngestCounts, ModalityHandler};

/// A generic web search collaborator, out of scope per spec.md §1.
#[async_trait]
pub trait WebSearchApi: Send + Sync {
    async fn search(&self, text: &str, limit: u32) -> Result<Vec<WebResult>, AppError>;
}

#[derive(Clone, Debug)]
pub struct WebResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// The web fallback modality never ingests; it is only consulted by the
/// orchestrator when every primary modality returns zero results (spec.md
/// §4.3 "Web fallback handler").
pub struct WebFallbackHandler {
    api: Arc<dyn WebSearchApi>,
    weight: f64,
}

impl WebFallbackHandler {
    #[must_use]
    pub fn new(api: Arc<dyn WebSearchApi>, weight: f64) -> Self {
        Self { api, weight }
    }
}

#[async_trait]
impl ModalityHandler for WebFallbackHandler {
    fn modality_id(&self) -> &str {
        "web"
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

    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        let limit = limit.unwrap_or(10);
        let results = self.api.search(text, limit).await?;

        Ok(results
            .into_iter()
            .map(|result| {
                HandlerResult {
                    modality: "web".to_string(),
                    source_type: "web".to_string(),
                    chunk_id: None,
                    entity_id: Some(entity_id("web", &result.url)),
                    title: Some(result.title),
                    text: result.snippet,
                    raw_score: 1.0,
                    score: 0.0,
                    url: Some(result.url.clone()),
                    metadata: json!({ "url": result.url }),
                }
                .weighted(self.weight)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubApi;

    #[async_trait]
    impl WebSearchApi for StubApi {
        async fn search(&self, _text: &str, _limit: u32) -> Result<Vec<WebResult>, AppError> {
            Ok(vec![WebResult {
                url: "https://example.com".into(),
                title: "Example".into(),
                snippet: "an example".into(),
            }])
        }
    }

    #[test]
    fn web_fallback_never_ingests() {
        let handler = WebFallbackHandler::new(Arc::new(StubApi), 0.5);
        assert!(!handler.can_ingest());
        assert!(handler.can_query());
    }
}
