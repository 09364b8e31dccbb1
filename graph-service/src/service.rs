use std::{sync::Arc, time::Instant};

use common::error::AppError;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::{
    backend::{GraphBackend, WriteSummary},
    types::{ApiImpact, ComponentNeighborhood, QueryMetadata},
};

/// Typed upserts and neighborhood queries against a property graph
/// (spec.md §4.2, C3). When unconfigured, every read returns an empty
/// structured summary and every write is a no-op; errors never propagate,
/// they are logged and recorded in `last_query_metadata`.
pub struct GraphService {
    backend: Option<Arc<dyn GraphBackend>>,
    last_query_metadata: RwLock<QueryMetadata>,
}

impl GraphService {
    #[must_use]
    pub fn new(backend: Option<Arc<dyn GraphBackend>>) -> Self {
        let configured = backend.is_some();
        Self {
            backend,
            last_query_metadata: RwLock::new(QueryMetadata {
                backend_configured: configured,
                last_error: None,
                last_duration_ms: None,
            }),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn last_query_metadata(&self) -> QueryMetadata {
        self.last_query_metadata.read().await.clone()
    }

    async fn record_outcome(&self, duration_ms: u64, error: Option<String>) {
        let mut metadata = self.last_query_metadata.write().await;
        metadata.last_duration_ms = Some(duration_ms);
        metadata.last_error = error;
    }

    /// Generic parameterized read. Returns `Ok(vec![])` (not an error) when
    /// unconfigured, matching spec.md §4.2's failure mode.
    pub async fn run_query(&self, cypher: &str, params: Value) -> Result<Vec<Value>, AppError> {
        let Some(backend) = &self.backend else {
            return Ok(Vec::new());
        };
        let started = Instant::now();
        let result = backend.run_query(cypher, params).await;
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => self.record_outcome(elapsed, None).await,
            Err(err) => {
                warn!(error = %err, "graph query failed");
                self.record_outcome(elapsed, Some(err.to_string())).await;
            }
        }
        Ok(result.unwrap_or_default())
    }

    /// Generic parameterized write. Returns a zeroed summary (not an error)
    /// when unconfigured or when the backend call fails.
    pub async fn run_write(&self, cypher: &str, params: Value) -> WriteSummary {
        let Some(backend) = &self.backend else {
            return WriteSummary::default();
        };
        let started = Instant::now();
        let result = backend.run_write(cypher, params).await;
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(summary) => {
                self.record_outcome(elapsed, None).await;
                summary
            }
            Err(err) => {
                warn!(error = %err, "graph write failed");
                self.record_outcome(elapsed, Some(err.to_string())).await;
                WriteSummary::default()
            }
        }
    }

    /// The one place that knows how a node is idempotently upserted: every
    /// typed `upsert_*` below funnels through this MERGE-by-id write.
    async fn upsert_node(&self, label: &str, id: &str, properties: Value) -> WriteSummary {
        let cypher = format!(
            "MERGE (n:{label} {{id: $id}}) SET n += $properties RETURN n"
        );
        self.run_write(&cypher, json!({ "id": id, "properties": properties })).await
    }

    async fn link(&self, from_label: &str, from_id: &str, edge: &str, to_label: &str, to_id: &str) -> WriteSummary {
        let cypher = format!(
            "MATCH (a:{from_label} {{id: $from_id}}), (b:{to_label} {{id: $to_id}}) MERGE (a)-[:{edge}]->(b)"
        );
        self.run_write(&cypher, json!({ "from_id": from_id, "to_id": to_id })).await
    }

    pub async fn upsert_chunk(&self, chunk_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Chunk", chunk_id, properties).await
    }

    pub async fn upsert_source(&self, source_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Source", source_id, properties).await
    }

    /// Mirrors the Universal Node Writer: a Chunk node linked to its Source
    /// node via `BELONGS_TO` (spec.md §3 "Source Node").
    pub async fn link_chunk_to_source(&self, chunk_id: &str, source_id: &str) -> WriteSummary {
        self.link("Chunk", chunk_id, "BELONGS_TO", "Source", source_id).await
    }

    pub async fn upsert_pr(&self, pr_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("PullRequest", pr_id, properties).await
    }

    pub async fn upsert_commit(&self, sha: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Commit", sha, properties).await
    }

    pub async fn upsert_issue(&self, issue_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Issue", issue_id, properties).await
    }

    pub async fn upsert_video(&self, video_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Video", video_id, properties).await
    }

    pub async fn upsert_channel(&self, channel_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Channel", channel_id, properties).await
    }

    pub async fn upsert_playlist(&self, playlist_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Playlist", playlist_id, properties).await
    }

    pub async fn upsert_activity_signal(&self, signal_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("ActivitySignal", signal_id, properties).await
    }

    pub async fn upsert_support_case(&self, case_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("SupportCase", case_id, properties).await
    }

    pub async fn upsert_concept(&self, concept_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("Concept", concept_id, properties).await
    }

    pub async fn upsert_code_artifact(&self, artifact_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("CodeArtifact", artifact_id, properties).await
    }

    pub async fn upsert_transcript_chunk(&self, chunk_id: &str, properties: Value) -> WriteSummary {
        self.upsert_node("TranscriptChunk", chunk_id, properties).await
    }

    pub async fn link_video_channel(&self, video_id: &str, channel_id: &str) -> WriteSummary {
        self.link("Video", video_id, "PUBLISHED_ON", "Channel", channel_id).await
    }

    pub async fn link_video_chunk(&self, video_id: &str, chunk_id: &str) -> WriteSummary {
        self.link("Video", video_id, "HAS_CHUNK", "TranscriptChunk", chunk_id).await
    }

    pub async fn link_chunk_concept(&self, chunk_id: &str, concept_id: &str) -> WriteSummary {
        self.link("TranscriptChunk", chunk_id, "MENTIONS", "Concept", concept_id).await
    }

    pub async fn link_video_playlist(&self, video_id: &str, playlist_id: &str) -> WriteSummary {
        self.link("Video", video_id, "IN_PLAYLIST", "Playlist", playlist_id).await
    }

    /// Distinct linked doc/issue/PR/chat-thread/API ids for a component.
    pub async fn get_component_neighborhood(&self, component_id: &str) -> ComponentNeighborhood {
        if self.backend.is_none() {
            return ComponentNeighborhood::default();
        }
        let cypher = "MATCH (c:Component {id: $id})<-[:AFFECTS]-(n) RETURN labels(n) AS labels, n.id AS id";
        let rows = self
            .run_query(cypher, json!({ "id": component_id }))
            .await
            .unwrap_or_default();

        let mut neighborhood = ComponentNeighborhood::default();
        for row in rows {
            let Some(id) = row["id"].as_str() else { continue };
            let labels: Vec<&str> = row["labels"]
                .as_array()
                .map(|values| values.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if labels.contains(&"Doc") && !neighborhood.doc_ids.contains(&id.to_string()) {
                neighborhood.doc_ids.push(id.to_string());
            } else if labels.contains(&"Issue") && !neighborhood.issue_ids.contains(&id.to_string()) {
                neighborhood.issue_ids.push(id.to_string());
            } else if labels.contains(&"PullRequest") && !neighborhood.pr_ids.contains(&id.to_string()) {
                neighborhood.pr_ids.push(id.to_string());
            } else if labels.contains(&"ChatThread") && !neighborhood.chat_thread_ids.contains(&id.to_string()) {
                neighborhood.chat_thread_ids.push(id.to_string());
            } else if labels.contains(&"ApiEndpoint") && !neighborhood.api_endpoint_ids.contains(&id.to_string()) {
                neighborhood.api_endpoint_ids.push(id.to_string());
            }
        }
        neighborhood
    }

    pub async fn get_api_impact(&self, api_id: &str) -> ApiImpact {
        if self.backend.is_none() {
            return ApiImpact {
                api_id: api_id.to_string(),
                ..ApiImpact::default()
            };
        }
        let cypher = "MATCH (a:ApiEndpoint {id: $id})<-[:DEPENDS_ON*1..2]-(n) RETURN DISTINCT labels(n) AS labels, n.id AS id";
        let rows = self
            .run_query(cypher, json!({ "id": api_id }))
            .await
            .unwrap_or_default();

        let mut impact = ApiImpact {
            api_id: api_id.to_string(),
            ..ApiImpact::default()
        };
        for row in rows {
            let Some(id) = row["id"].as_str() else { continue };
            let labels: Vec<&str> = row["labels"]
                .as_array()
                .map(|values| values.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if labels.contains(&"Component") {
                impact.downstream_components.push(id.to_string());
            } else if labels.contains(&"Service") {
                impact.downstream_services.push(id.to_string());
            }
        }
        impact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_reads_return_empty_structured_summaries() {
        let service = GraphService::new(None);
        assert_eq!(
            service.get_component_neighborhood("component:auth").await,
            ComponentNeighborhood::default()
        );
        let impact = service.get_api_impact("api:checkout").await;
        assert!(impact.downstream_components.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_writes_are_no_ops_with_zeroed_summary() {
        let service = GraphService::new(None);
        let summary = service.upsert_chunk("chunk-1", json!({})).await;
        assert_eq!(summary.nodes_created, 0);
        assert_eq!(summary.relationships_created, 0);
    }
}
