use async_trait::async_trait;
use common::error::AppError;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Narrow interface over the external vector backend (spec.md §6), so the
/// fanout-facing [`crate::VectorService`] never depends on a concrete wire
/// format. Errors surface as `AppError`; callers treat any error as "no
/// results" without aborting the retrieval fanout.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn ensure_collection(&self, name: &str, dimension: u32) -> Result<(), AppError>;
    async fn upsert_points(&self, collection: &str, points: Vec<Value>) -> Result<(), AppError>;
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: u32,
        filter: Option<Value>,
    ) -> Result<Vec<Value>, AppError>;
}

/// HTTP JSON client for a Qdrant-shaped vector backend.
pub struct HttpVectorBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVectorBackend {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }
}

#[async_trait]
impl VectorBackend for HttpVectorBackend {
    async fn ensure_collection(&self, name: &str, dimension: u32) -> Result<(), AppError> {
        let existing = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await
            .map_err(AppError::Reqwest)?;

        if existing.status().is_success() {
            if let Ok(body) = existing.json::<Value>().await {
                let already_exists = body["result"]["collections"]
                    .as_array()
                    .map(|collections| {
                        collections
                            .iter()
                            .any(|c| c["name"].as_str() == Some(name))
                    })
                    .unwrap_or(false);
                if already_exists {
                    debug!(collection = name, "vector collection already exists");
                    return Ok(());
                }
            }
        }

        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{name}"))
            .json(&json!({ "vectors": { "size": dimension, "distance": "Cosine" } }))
            .send()
            .await
            .map_err(AppError::Reqwest)?;

        if !response.status().is_success() && response.status().as_u16() != 409 {
            return Err(AppError::BackendUnavailable(format!(
                "failed to create collection {name}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<Value>) -> Result<(), AppError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{collection}/points?wait=true"),
            )
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(AppError::Reqwest)?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "upsert failed for {collection}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: u32,
        filter: Option<Value>,
    ) -> Result<Vec<Value>, AppError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/search"),
            )
            .json(&body)
            .send()
            .await
            .map_err(AppError::Reqwest)?;

        if !response.status().is_success() {
            warn!(collection, status = %response.status(), "vector search returned non-success status");
            return Err(AppError::BackendUnavailable(format!(
                "search failed for {collection}: {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(AppError::Reqwest)?;
        Ok(body["result"].as_array().cloned().unwrap_or_default())
    }
}
