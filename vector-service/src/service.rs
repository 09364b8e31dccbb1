use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

use common::{
    chunk::{clamp_text, stable_point_id, Chunk, SourceType},
    config::VectorDbConfig,
    embedding::{l2_normalize, EmbeddingProvider},
    error::AppError,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{backend::VectorBackend, options::SearchOptions};

/// Embed/upsert/filter-search chunks against a remote vector store
/// (spec.md §4.1, C2). The collection is created lazily on first use and
/// never recreated afterwards.
pub struct VectorService {
    backend: Arc<dyn VectorBackend>,
    embeddings: Arc<EmbeddingProvider>,
    collection: String,
    dimension: u32,
    enabled: bool,
    collection_ready: AtomicBool,
}

impl VectorService {
    #[must_use]
    pub fn new(backend: Arc<dyn VectorBackend>, embeddings: Arc<EmbeddingProvider>, config: &VectorDbConfig) -> Self {
        Self {
            backend,
            embeddings,
            collection: config.collection.clone(),
            dimension: config.dimension,
            enabled: config.enabled,
            collection_ready: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.enabled
    }

    async fn ensure_collection(&self) -> Result<(), AppError> {
        if self.collection_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.backend.ensure_collection(&self.collection, self.dimension).await?;
        self.collection_ready.store(true, Ordering::Release);
        Ok(())
    }

    fn target_collection<'a>(&'a self, chunk: &'a Chunk) -> &'a str {
        chunk.collection.as_deref().unwrap_or(&self.collection)
    }

    /// Embeds and upserts `chunks`. Chunks with empty text are skipped
    /// entirely (spec.md §3 "a chunk with empty text must not be embedded
    /// or persisted").
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<bool, AppError> {
        if !self.enabled {
            return Ok(false);
        }
        let embeddable: Vec<&Chunk> = chunks.iter().filter(|c| c.is_embeddable()).collect();
        if embeddable.is_empty() {
            return Ok(true);
        }

        self.ensure_collection().await?;

        let mut points = Vec::with_capacity(embeddable.len());
        for chunk in &embeddable {
            let mut embedding = self.embeddings.embed(&chunk.text).await?;
            l2_normalize(&mut embedding);
            let point_id = stable_point_id(&chunk.entity_id);
            points.push(json!({
                "id": point_id.to_string(),
                "vector": embedding,
                "payload": chunk_to_payload(chunk),
            }));
        }

        // Points may target different override collections; group by target.
        let mut by_collection: std::collections::HashMap<&str, Vec<Value>> = std::collections::HashMap::new();
        for (chunk, point) in embeddable.iter().zip(points) {
            by_collection.entry(self.target_collection(chunk)).or_default().push(point);
        }
        for (collection, points) in by_collection {
            self.backend.upsert_points(collection, points).await?;
        }

        debug!(count = embeddable.len(), "indexed chunks");
        Ok(true)
    }

    /// Searches the collection for chunks matching `query` under the
    /// conjunction of every populated filter in `options`. On empty query
    /// text, returns without calling the backend (spec.md §8).
    pub async fn semantic_search(&self, query: &str, options: SearchOptions) -> Vec<Chunk> {
        self.semantic_search_scored(query, options)
            .await
            .into_iter()
            .map(|(chunk, _score)| chunk)
            .collect()
    }

    /// Same as [`Self::semantic_search`] but retains each result's
    /// similarity score, for callers (e.g. the severity engine's semantic
    /// drift axis) that need the raw distance rather than just the chunk.
    pub async fn semantic_search_scored(&self, query: &str, options: SearchOptions) -> Vec<(Chunk, f32)> {
        if !self.enabled || query.trim().is_empty() {
            return Vec::new();
        }

        let clamped = clamp_text(query);
        let mut embedding = match self.embeddings.embed(&clamped).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "failed to embed search query");
                return Vec::new();
            }
        };
        l2_normalize(&mut embedding);

        let limit = options.top_k.unwrap_or(10);
        let filter = build_filter(&options);

        match self.backend.search(&self.collection, &embedding, limit, filter).await {
            Ok(points) => points
                .into_iter()
                .filter_map(|point| {
                    let score = point["score"].as_f64().unwrap_or(0.0) as f32;
                    if score < options.min_score.unwrap_or(0.0) {
                        return None;
                    }
                    payload_to_chunk(&point["payload"], &point["id"]).map(|chunk| (chunk, score))
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "vector search failed, returning no results");
                Vec::new()
            }
        }
    }
}

fn chunk_to_payload(chunk: &Chunk) -> Value {
    json!({
        "chunk_id": chunk.chunk_id,
        "entity_id": chunk.entity_id,
        "source_type": chunk.source_type.as_str(),
        "text": chunk.text,
        "component": chunk.component,
        "service": chunk.service,
        "timestamp": chunk.timestamp,
        "tags": chunk.tags,
        "metadata": chunk.metadata,
    })
}

fn payload_to_chunk(payload: &Value, fallback_id: &Value) -> Option<Chunk> {
    let entity_id = payload["entity_id"].as_str()?.to_string();
    let source_type = match payload["source_type"].as_str()? {
        "chat" => SourceType::Chat,
        "scm" => SourceType::Scm,
        "doc" => SourceType::Doc,
        "doc_issue" => SourceType::DocIssue,
        "issue" => SourceType::Issue,
        "file" => SourceType::File,
        "video" => SourceType::Video,
        "web" => SourceType::Web,
        _ => return None,
    };
    let text = payload["text"].as_str()?.to_string();
    let chunk_id = payload["chunk_id"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| fallback_id.as_str().unwrap_or_default().to_string());
    let tags = payload["tags"]
        .as_array()
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let metadata = payload["metadata"]
        .as_object()
        .cloned()
        .map(|m| m.into_iter().collect())
        .unwrap_or_default();

    Some(Chunk {
        chunk_id,
        entity_id,
        source_type,
        text,
        component: payload["component"].as_str().map(str::to_string),
        service: payload["service"].as_str().map(str::to_string),
        timestamp: payload["timestamp"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        tags,
        metadata,
        collection: None,
    })
}

/// Builds the `{must:[...]}` conjunctive filter from every populated option.
fn build_filter(options: &SearchOptions) -> Option<Value> {
    let mut must = Vec::new();

    if !options.source_types.is_empty() {
        must.push(json!({
            "key": "source_type",
            "match": { "any": options.source_types.iter().map(|t| t.as_str()).collect::<Vec<_>>() }
        }));
    }
    if !options.components.is_empty() {
        must.push(json!({ "key": "component", "match": { "any": options.components } }));
    }
    if !options.services.is_empty() {
        must.push(json!({ "key": "service", "match": { "any": options.services } }));
    }
    if !options.tags.is_empty() {
        must.push(json!({ "key": "tags", "match": { "any": options.tags } }));
    }
    if let Some(since) = options.since {
        must.push(json!({ "key": "timestamp", "range": { "gte": since.to_rfc3339() } }));
    }
    for (key, value) in &options.metadata_filters {
        let path = format!("metadata.{key}");
        if let Some(values) = value.as_array() {
            must.push(json!({ "key": path, "match": { "any": values } }));
        } else {
            must.push(json!({ "key": path, "match": { "value": value } }));
        }
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_filter_is_none_when_nothing_is_set() {
        assert!(build_filter(&SearchOptions::default()).is_none());
    }

    #[test]
    fn build_filter_combines_every_populated_clause() {
        let options = SearchOptions::default()
            .with_source_types(vec![SourceType::Doc, SourceType::Chat])
            .with_metadata_filter("workspace_id", "ws-1");
        let filter = build_filter(&options).unwrap();
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
    }

    #[test]
    fn payload_round_trips_entity_id_source_type_and_text() {
        let chunk = Chunk::new("doc:readme.md", SourceType::Doc, "hello world");
        let payload = chunk_to_payload(&chunk);
        let round_tripped = payload_to_chunk(&payload, &json!(chunk.chunk_id)).unwrap();
        assert_eq!(round_tripped.entity_id, chunk.entity_id);
        assert_eq!(round_tripped.source_type, chunk.source_type);
        assert_eq!(round_tripped.text, chunk.text);
    }
}
