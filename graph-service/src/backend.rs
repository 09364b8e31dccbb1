use async_trait::async_trait;
use common::error::AppError;
use serde_json::{json, Value};

/// Parameterized query execution against the graph backend (spec.md §6).
/// Records are keyed by return-name; write calls expose node/relationship
/// creation counters.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn run_query(&self, cypher: &str, params: Value) -> Result<Vec<Value>, AppError>;
    async fn run_write(&self, cypher: &str, params: Value) -> Result<WriteSummary, AppError>;
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct WriteSummary {
    pub nodes_created: u64,
    pub relationships_created: u64,
}

/// HTTP client for Neo4j's transactional Cypher endpoint
/// (`POST /db/{database}/tx/commit`).
pub struct HttpGraphBackend {
    client: reqwest::Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl HttpGraphBackend {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    async fn commit(&self, cypher: &str, params: Value) -> Result<Value, AppError> {
        let url = format!(
            "{}/db/{}/tx/commit",
            self.base_url.trim_end_matches('/'),
            self.database
        );
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({
                "statements": [{ "statement": cypher, "parameters": params, "resultDataContents": ["row"], "includeStats": true }]
            }))
            .send()
            .await
            .map_err(AppError::Reqwest)?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "graph query failed: {}",
                response.status()
            )));
        }
        let body: Value = response.json().await.map_err(AppError::Reqwest)?;
        if let Some(errors) = body["errors"].as_array() {
            if !errors.is_empty() {
                return Err(AppError::BackendUnavailable(format!("graph errors: {errors:?}")));
            }
        }
        Ok(body)
    }
}

#[async_trait]
impl GraphBackend for HttpGraphBackend {
    async fn run_query(&self, cypher: &str, params: Value) -> Result<Vec<Value>, AppError> {
        let body = self.commit(cypher, params).await?;
        let results = &body["results"][0];
        let columns = results["columns"].as_array().cloned().unwrap_or_default();
        let rows = results["data"].as_array().cloned().unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|row| {
                let values = row["row"].as_array().cloned().unwrap_or_default();
                let mut record = serde_json::Map::new();
                for (column, value) in columns.iter().zip(values) {
                    if let Some(name) = column.as_str() {
                        record.insert(name.to_string(), value);
                    }
                }
                Value::Object(record)
            })
            .collect())
    }

    async fn run_write(&self, cypher: &str, params: Value) -> Result<WriteSummary, AppError> {
        let body = self.commit(cypher, params).await?;
        let stats = &body["results"][0]["stats"];
        Ok(WriteSummary {
            nodes_created: stats["nodes_created"].as_u64().unwrap_or(0),
            relationships_created: stats["relationships_created"].as_u64().unwrap_or(0),
        })
    }
}
