use std::sync::Arc;

use async_trait::async_trait;
use common::{chunk::entity_id, error::AppError, Chunk, SourceType};
use graph_service::GraphService;
use serde_json::{json, Value};
use vector_service::VectorService;

use crate::handler::{HandlerResult, IngestCounts, ModalityHandler};

const WINDOW: usize = 1_000;
const OVERLAP: usize = 200;

/// Splits `text` into overlapping windows, returning `(start_offset,
/// end_offset, slice)` triples measured in characters.
#[must_use]
pub fn windowed_chunks(text: &str) -> Vec<(usize, usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let stride = WINDOW.saturating_sub(OVERLAP).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + WINDOW).min(chars.len());
        windows.push((start, end, chars[start..end].iter().collect()));
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    windows
}

pub struct DocsHandler {
    vector: Arc<VectorService>,
    graph: Arc<GraphService>,
    roots: Vec<std::path::PathBuf>,
    weight: f64,
}

impl DocsHandler {
    #[must_use]
    pub fn new(vector: Arc<VectorService>, graph: Arc<GraphService>, roots: Vec<std::path::PathBuf>, weight: f64) -> Self {
        Self {
            vector,
            graph,
            roots,
            weight,
        }
    }

    async fn ingest_root(&self, root: &std::path::Path, counts: &mut IngestCounts) -> Result<(), AppError> {
        let mut stack = vec![root.to_path_buf()];
        let mut chunks = Vec::new();

        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => {
                    counts.errors += 1;
                    continue;
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Ok(text) = tokio::fs::read_to_string(&path).await else {
                    counts.errors += 1;
                    continue;
                };
                counts.items_seen += 1;
                let path_str = path.to_string_lossy().to_string();
                let source_id = entity_id("doc", &path_str);

                self.graph.upsert_source(&source_id, json!({ "kind": "doc", "path": path_str })).await;

                for (start, end, slice) in windowed_chunks(&text) {
                    let chunk = Chunk::new(source_id.clone(), SourceType::Doc, slice)
                        .with_metadata("path", path_str.clone())
                        .with_metadata("start_offset", start)
                        .with_metadata("end_offset", end)
                        .with_tag("doc");
                    chunks.push(chunk);
                }
            }
        }

        if !chunks.is_empty() {
            self.vector.index_chunks(&chunks).await?;
            for chunk in &chunks {
                self.graph.upsert_chunk(&chunk.chunk_id, json!({})).await;
                self.graph.link_chunk_to_source(&chunk.chunk_id, &chunk.entity_id).await;
            }
            counts.chunks_written += chunks.len() as u64;
        }
        Ok(())
    }
}

#[async_trait]
impl ModalityHandler for DocsHandler {
    fn modality_id(&self) -> &str {
        "docs"
    }

    fn can_ingest(&self) -> bool {
        true
    }

    fn can_query(&self) -> bool {
        true
    }

    async fn ingest(&self, scope_override: Option<Value>) -> Result<IngestCounts, AppError> {
        let roots: Vec<std::path::PathBuf> = scope_override
            .as_ref()
            .and_then(|v| v["roots"].as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(std::path::PathBuf::from)
                    .collect()
            })
            .unwrap_or_else(|| self.roots.clone());

        let mut counts = IngestCounts::default();
        for root in roots {
            self.ingest_root(&root, &mut counts).await?;
        }
        Ok(counts)
    }

    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        let options = vector_service::SearchOptions::default()
            .with_top_k(limit.unwrap_or(10))
            .with_source_types(vec![SourceType::Doc]);
        let chunks = self.vector.semantic_search(text, options).await;

        Ok(chunks
            .into_iter()
            .map(|chunk| {
                let path = chunk
                    .metadata
                    .get("path")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                HandlerResult {
                    modality: "docs".to_string(),
                    source_type: "doc".to_string(),
                    chunk_id: Some(chunk.chunk_id),
                    entity_id: Some(chunk.entity_id),
                    title: path.clone(),
                    text: chunk.text,
                    raw_score: 1.0,
                    score: 0.0,
                    url: None,
                    metadata: json!({ "path": path }),
                }
                .weighted(self.weight)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap_by_the_configured_amount() {
        let text = "x".repeat(2_500);
        let windows = windowed_chunks(&text);
        assert!(windows.len() >= 2);
        let (_, first_end, _) = windows[0];
        let (second_start, _, _) = windows[1];
        assert_eq!(first_end - second_start, OVERLAP);
    }

    #[test]
    fn short_text_yields_a_single_window() {
        let windows = windowed_chunks("short");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0], (0, 5, "short".to_string()));
    }

    #[test]
    fn empty_text_yields_no_windows() {
        assert!(windowed_chunks("").is_empty());
    }
}
