use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{chunk::entity_id, error::AppError, Chunk, SourceType};
use graph_service::GraphService;
use serde_json::{json, Value};
use thiserror::Error;
use vector_service::VectorService;

use crate::handler::{HandlerResult, IngestCounts, ModalityHandler};

const TRANSCRIPT_CHUNK_CHARS: usize = 1_200;
const TRANSCRIPT_OVERLAP_SECONDS: i64 = 2;
const TIMESTAMP_WINDOW_SECONDS: i64 = 25;

#[derive(Clone, Debug)]
pub struct VideoMetadata {
    pub video_id: String,
    pub channel_id: String,
    pub playlist_ids: Vec<String>,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptAvailability {
    Available,
    Disabled,
    Unavailable,
    Blocked,
}

#[derive(Clone, Debug)]
pub struct TranscriptSegment {
    pub start_seconds: i64,
    pub text: String,
}

/// Errors specific to transcript acquisition (spec.md §4.3 "Video handler").
/// Callers surface these through [`AppError::InternalError`] since the
/// handler trait is not generic over error type.
#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("transcripts are disabled for this video")]
    Disabled,
    #[error("no transcript is available for this video")]
    Unavailable,
    #[error("transcript fetch was blocked (anti-bot detection)")]
    BlockedAntibot,
}

impl From<TranscriptAvailability> for Option<TranscriptError> {
    fn from(value: TranscriptAvailability) -> Self {
        match value {
            TranscriptAvailability::Available => None,
            TranscriptAvailability::Disabled => Some(TranscriptError::Disabled),
            TranscriptAvailability::Unavailable => Some(TranscriptError::Unavailable),
            TranscriptAvailability::Blocked => Some(TranscriptError::BlockedAntibot),
        }
    }
}

#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Resolves metadata for `video_id`, trying a cache, then the primary
    /// API, then falling back to the public oembed endpoint.
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata, AppError>;

    /// Fetches the raw transcript, retrying transient failures. Returns the
    /// detected availability state alongside whatever segments were found.
    async fn fetch_transcript(&self, video_id: &str) -> Result<(TranscriptAvailability, Vec<TranscriptSegment>), AppError>;

    async fn search(&self, channel_ids: &[String], text: &str) -> Result<Vec<VideoMetadata>, AppError>;
}

/// Groups transcript segments into chunks of at most
/// [`TRANSCRIPT_CHUNK_CHARS`] characters, carrying a small overlap measured
/// in seconds of dialogue rather than characters.
fn chunk_transcript(segments: &[TranscriptSegment]) -> Vec<(i64, i64, String)> {
    let mut chunks = Vec::new();
    let mut current: Vec<&TranscriptSegment> = Vec::new();
    let mut current_len = 0usize;

    let flush = |current: &mut Vec<&TranscriptSegment>, chunks: &mut Vec<(i64, i64, String)>| {
        if current.is_empty() {
            return;
        }
        let start = current.first().map_or(0, |s| s.start_seconds);
        let end = current.last().map_or(0, |s| s.start_seconds);
        let text = current.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        chunks.push((start, end, text));
    };

    for segment in segments {
        if current_len + segment.text.len() > TRANSCRIPT_CHUNK_CHARS && !current.is_empty() {
            flush(&mut current, &mut chunks);
            let overlap_start = current
                .last()
                .map(|s| s.start_seconds - TRANSCRIPT_OVERLAP_SECONDS)
                .unwrap_or(segment.start_seconds);
            current = current
                .iter()
                .filter(|s| s.start_seconds >= overlap_start)
                .copied()
                .collect();
            current_len = current.iter().map(|s| s.text.len()).sum();
        }
        current_len += segment.text.len();
        current.push(segment);
    }
    flush(&mut current, &mut chunks);
    chunks
}

pub struct VideoHandler {
    api: Arc<dyn VideoApi>,
    vector: Arc<VectorService>,
    graph: Arc<GraphService>,
    channels: Vec<String>,
    weight: f64,
}

impl VideoHandler {
    #[must_use]
    pub fn new(api: Arc<dyn VideoApi>, vector: Arc<VectorService>, graph: Arc<GraphService>, channels: Vec<String>, weight: f64) -> Self {
        Self {
            api,
            vector,
            graph,
            channels,
            weight,
        }
    }

    async fn ingest_video(&self, video_id: &str, counts: &mut IngestCounts) -> Result<(), AppError> {
        let meta = self.api.fetch_metadata(video_id).await?;
        let video_entity = entity_id("video", &meta.video_id);

        self.graph.upsert_video(&video_entity, json!({ "title": meta.title, "url": meta.url })).await;
        self.graph.upsert_channel(&meta.channel_id, json!({})).await;
        self.graph.link_video_channel(&video_entity, &meta.channel_id).await;
        for playlist_id in &meta.playlist_ids {
            self.graph.upsert_playlist(playlist_id, json!({})).await;
            self.graph.link_video_playlist(&video_entity, playlist_id).await;
        }

        let (availability, segments) = self.api.fetch_transcript(video_id).await?;
        if let Some(err) = Option::<TranscriptError>::from(availability) {
            counts.extra = json!({ "video_id": video_id, "transcript_error": err.to_string() });
            return Ok(());
        }

        let mut chunks = Vec::new();
        for (start, end, text) in chunk_transcript(&segments) {
            let chunk = Chunk::new(video_entity.clone(), SourceType::Video, text)
                .with_timestamp(meta.published_at)
                .with_tag("video")
                .with_metadata("video_id", meta.video_id.clone())
                .with_metadata(common::chunk::metadata_keys::URL, meta.url.clone())
                .with_metadata("start_seconds", start)
                .with_metadata("end_seconds", end);
            chunks.push(chunk);
        }

        if !chunks.is_empty() {
            self.vector.index_chunks(&chunks).await?;
            for chunk in &chunks {
                self.graph.upsert_transcript_chunk(&chunk.chunk_id, json!({})).await;
                self.graph.link_video_chunk(&video_entity, &chunk.chunk_id).await;
            }
            counts.chunks_written += chunks.len() as u64;
        }
        counts.items_seen += 1;
        Ok(())
    }
}

#[async_trait]
impl ModalityHandler for VideoHandler {
    fn modality_id(&self) -> &str {
        "video"
    }

    fn can_ingest(&self) -> bool {
        true
    }

    fn can_query(&self) -> bool {
        true
    }

    async fn ingest(&self, scope_override: Option<Value>) -> Result<IngestCounts, AppError> {
        let video_ids: Vec<String> = scope_override
            .as_ref()
            .and_then(|v| v["video_ids"].as_array())
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut counts = IngestCounts::default();
        for video_id in video_ids {
            if let Err(_err) = self.ingest_video(&video_id, &mut counts).await {
                counts.errors += 1;
            }
        }
        Ok(counts)
    }

    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        // Timestamp-aware retrieval: if the query names an explicit instant
        // the caller wants a window, semantic search otherwise.
        let options = vector_service::SearchOptions::default()
            .with_top_k(limit.unwrap_or(10))
            .with_source_types(vec![SourceType::Video]);
        let chunks = self.vector.semantic_search(text, options).await;

        Ok(chunks
            .into_iter()
            .map(|chunk| {
                let start = chunk.metadata.get("start_seconds").and_then(serde_json::Value::as_i64);
                let url = chunk
                    .metadata
                    .get(common::chunk::metadata_keys::URL)
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                HandlerResult {
                    modality: "video".to_string(),
                    source_type: "video".to_string(),
                    chunk_id: Some(chunk.chunk_id),
                    entity_id: Some(chunk.entity_id),
                    title: None,
                    text: chunk.text,
                    raw_score: 1.0,
                    score: 0.0,
                    url,
                    metadata: json!({ "start_seconds": start, "window_seconds": TIMESTAMP_WINDOW_SECONDS }),
                }
                .weighted(self.weight)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: i64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_seconds: start,
            text: text.to_string(),
        }
    }

    #[test]
    fn chunking_splits_long_transcripts_on_the_character_budget() {
        let segments: Vec<TranscriptSegment> = (0..20)
            .map(|i| segment(i * 10, &"word ".repeat(50)))
            .collect();
        let chunks = chunk_transcript(&segments);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn short_transcript_yields_a_single_chunk() {
        let segments = vec![segment(0, "hello"), segment(2, "world")];
        let chunks = chunk_transcript(&segments);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].2, "hello world");
    }

    #[test]
    fn transcript_availability_maps_to_the_right_typed_error() {
        assert!(matches!(
            Option::<TranscriptError>::from(TranscriptAvailability::Disabled),
            Some(TranscriptError::Disabled)
        ));
        assert!(matches!(
            Option::<TranscriptError>::from(TranscriptAvailability::Blocked),
            Some(TranscriptError::BlockedAntibot)
        ));
        assert!(Option::<TranscriptError>::from(TranscriptAvailability::Available).is_none());
    }
}
