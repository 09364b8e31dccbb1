use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{chunk::entity_id, error::AppError, Chunk, SourceType};
use graph_service::GraphService;
use serde_json::{json, Value};
use vector_service::VectorService;

use crate::handler::{HandlerResult, IngestCounts, ModalityHandler};

/// A single chat message as returned by the external chat API (out of
/// scope per spec.md §1; modeled here as a narrow collaborator interface).
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub channel_id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub thread_ts: Option<String>,
    pub text: String,
    pub permalink: Option<String>,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn fetch_messages(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>, AppError>;

    /// A simple full-text search used by `query`, scoped to `channel_ids`.
    async fn search_messages(&self, channel_ids: &[String], text: &str) -> Result<Vec<ChatMessage>, AppError>;
}

pub struct ChatHandler {
    api: Arc<dyn ChatApi>,
    vector: Arc<VectorService>,
    graph: Arc<GraphService>,
    channels: Vec<String>,
    weight: f64,
}

impl ChatHandler {
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>, vector: Arc<VectorService>, graph: Arc<GraphService>, channels: Vec<String>, weight: f64) -> Self {
        Self {
            api,
            vector,
            graph,
            channels,
            weight,
        }
    }

    fn chunk_for(message: &ChatMessage) -> Chunk {
        let thread_key = message.thread_ts.clone().unwrap_or_else(|| message.timestamp.timestamp().to_string());
        let id = entity_id("chat", &format!("{}:{}", message.channel_id, thread_key));
        let header = format!(
            "#{} | {} | {}",
            message.channel_id,
            message.author,
            message.timestamp.to_rfc3339()
        );
        let text = format!("{header}\n{}", message.text);

        let mut chunk = Chunk::new(id, SourceType::Chat, text)
            .with_timestamp(message.timestamp)
            .with_tag("chat")
            .with_tag(format!("channel:{}", message.channel_id))
            .with_metadata("channel_id", message.channel_id.clone())
            .with_metadata("permalink", message.permalink.clone());
        if let Some(thread_ts) = &message.thread_ts {
            chunk = chunk.with_metadata("thread_ts", thread_ts.clone());
        }
        chunk
    }
}

#[async_trait]
impl ModalityHandler for ChatHandler {
    fn modality_id(&self) -> &str {
        "chat"
    }

    fn can_ingest(&self) -> bool {
        true
    }

    fn can_query(&self) -> bool {
        true
    }

    async fn ingest(&self, scope_override: Option<Value>) -> Result<IngestCounts, AppError> {
        let channels: Vec<String> = scope_override
            .as_ref()
            .and_then(|v| v["channels"].as_array())
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| self.channels.clone());

        let mut counts = IngestCounts::default();
        let mut per_channel_ts = serde_json::Map::new();

        for channel in channels {
            let messages = match self.api.fetch_messages(&channel, None).await {
                Ok(messages) => messages,
                Err(_) => {
                    counts.errors += 1;
                    continue;
                }
            };
            counts.items_seen += messages.len() as u64;

            let chunks: Vec<Chunk> = messages
                .iter()
                .filter(|message| !message.text.trim().is_empty())
                .map(Self::chunk_for)
                .collect();
            if !chunks.is_empty() {
                self.vector.index_chunks(&chunks).await?;
                for chunk in &chunks {
                    self.graph.upsert_chunk(&chunk.chunk_id, json!({ "entity_id": chunk.entity_id })).await;
                    self.graph.upsert_source(&channel, json!({ "kind": "chat_channel" })).await;
                    self.graph.link_chunk_to_source(&chunk.chunk_id, &channel).await;
                }
                counts.chunks_written += chunks.len() as u64;
            }

            if let Some(last) = messages.iter().map(|m| m.timestamp).max() {
                per_channel_ts.insert(channel, json!(last.to_rfc3339()));
            }
        }

        counts.extra = json!({ "last_indexed_ts": per_channel_ts });
        Ok(counts)
    }

    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        let messages = self.api.search_messages(&self.channels, text).await?;
        let limit = limit.unwrap_or(10) as usize;

        Ok(messages
            .into_iter()
            .take(limit)
            .map(|message| {
                let chunk = Self::chunk_for(&message);
                HandlerResult {
                    modality: "chat".to_string(),
                    source_type: "chat".to_string(),
                    chunk_id: Some(chunk.chunk_id),
                    entity_id: Some(chunk.entity_id),
                    title: Some(format!("#{}", message.channel_id)),
                    text: chunk.text,
                    raw_score: 1.0,
                    score: 0.0,
                    url: message.permalink,
                    metadata: json!({ "channel_id": message.channel_id }),
                }
                .weighted(self.weight)
            })
            .collect())
    }
}
