//! Live feature extraction, wiring each axis's raw inputs to the Graph and
//! Vector services (spec.md §4.8: "an issue identifier and accessors to
//! graph + vector"). Each method below is independently callable and
//! touches exactly one axis's data, matching the "isolated and
//! independently re-runnable" feature-query invariant.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use common::chunk::SourceType;
use graph_service::GraphService;
use serde_json::json;
use vector_service::{SearchOptions, VectorService};

use crate::features::{ChatFeatureInput, DocFeatureInput, GraphFeatureInput, ScmFeatureInput, SemanticPairResult, SemanticPairSample};

const CHAT_LOOKBACK_DAYS: i64 = 7;
const SCM_LOOKBACK_DAYS: i64 = 7;
const SEMANTIC_SAMPLE_SIZE: u32 = 10;

/// Identifies the issue being scored and the scope its feature queries run
/// over. Built by the caller (typically the Incident Builder) from the doc
/// issue it is scoring.
#[derive(Clone, Debug, Default)]
pub struct SeverityTarget {
    pub query_text: String,
    pub component_ids: Vec<String>,
    pub critical_channel_ids: Vec<String>,
}

/// Maps a doc issue's severity/impact label onto the fixed 0-1 scale used
/// by the doc axis (spec.md §4.8 "base severity ... {low:0.3, medium:0.6,
/// high:0.85, critical:1.0}"). Distinct from the doc-issues handler's own
/// recency-multiplier weight scale, which serves a different purpose.
#[must_use]
pub fn severity_label_to_score(label: &str) -> f64 {
    match label.to_ascii_lowercase().as_str() {
        "critical" => 1.0,
        "high" => 0.85,
        "medium" => 0.6,
        _ => 0.3,
    }
}

/// Builds the doc axis's raw feature snapshot directly from a doc issue's
/// own fields; unlike the other axes this never queries graph or vector,
/// the issue already carries everything the formula needs.
#[must_use]
pub fn doc_features(base_severity: &str, impact_level: &str, updated_at: DateTime<Utc>, labels: Vec<String>, component_count: u64) -> DocFeatureInput {
    DocFeatureInput {
        base_severity_score: severity_label_to_score(base_severity),
        impact_level_score: severity_label_to_score(impact_level),
        updated_at,
        labels,
        component_count,
    }
}

pub struct FeatureExtractor {
    graph: Arc<GraphService>,
    vector: Arc<VectorService>,
}

impl FeatureExtractor {
    #[must_use]
    pub fn new(graph: Arc<GraphService>, vector: Arc<VectorService>) -> Self {
        Self { graph, vector }
    }

    /// Chat axis: 7-day message/thread/author counts, recency, peak signal
    /// weight, and critical-channel membership (spec.md §4.8 "Chat
    /// features").
    pub async fn chat_features(&self, target: &SeverityTarget, now: DateTime<Utc>) -> ChatFeatureInput {
        let since = now - chrono::Duration::days(CHAT_LOOKBACK_DAYS);
        let options = SearchOptions::default()
            .with_top_k(50)
            .with_source_types(vec![SourceType::Chat])
            .with_components(target.component_ids.clone())
            .with_since(since);
        let chunks = self.vector.semantic_search(&target.query_text, options).await;

        let mut threads = HashSet::new();
        let mut authors = HashSet::new();
        let mut max_weight = 0.0_f64;
        let mut weight_sum = 0.0_f64;
        let mut most_recent: Option<DateTime<Utc>> = None;
        let mut in_critical_channel = false;
        let mut label_count = 0u64;

        for chunk in &chunks {
            if let Some(thread) = chunk.metadata.get("thread_ts").and_then(|v| v.as_str()) {
                threads.insert(thread.to_string());
            }
            if let Some(author) = chunk.metadata.get("author").and_then(|v| v.as_str()) {
                authors.insert(author.to_string());
            }
            let weight = chunk.metadata.get("signal_weight").and_then(serde_json::Value::as_f64).unwrap_or(1.0);
            max_weight = max_weight.max(weight);
            weight_sum += weight;
            if let Some(ts) = chunk.timestamp {
                most_recent = Some(most_recent.map_or(ts, |current| current.max(ts)));
            }
            if let Some(channel_id) = chunk.metadata.get("channel_id").and_then(|v| v.as_str()) {
                if target.critical_channel_ids.iter().any(|c| c == channel_id) {
                    in_critical_channel = true;
                }
            }
            label_count += chunk.tags.iter().filter(|t| t.starts_with("label:")).count() as u64;
        }

        let messages_7d = chunks.len() as u64;
        ChatFeatureInput {
            messages_7d,
            threads_7d: threads.len() as u64,
            unique_authors_7d: authors.len() as u64,
            max_signal_weight: max_weight,
            avg_signal_weight: if messages_7d > 0 { weight_sum / messages_7d as f64 } else { 0.0 },
            hours_since_last_seen: most_recent.map_or_else(ChatFeatureInput::none_seen, |ts| hours_since(ts, now)),
            in_critical_channel,
            label_count,
        }
    }

    /// SCM axis: 7-day PR/commit/doc-change counts, breaking-label count,
    /// recency, and peak signal weight (spec.md §4.8 "SCM features").
    pub async fn scm_features(&self, target: &SeverityTarget, now: DateTime<Utc>) -> ScmFeatureInput {
        let since = now - chrono::Duration::days(SCM_LOOKBACK_DAYS);
        let options = SearchOptions::default()
            .with_top_k(50)
            .with_source_types(vec![SourceType::Scm])
            .with_components(target.component_ids.clone())
            .with_since(since);
        let chunks = self.vector.semantic_search(&target.query_text, options).await;

        let mut prs = 0u64;
        let mut commits = 0u64;
        let mut doc_changes = 0u64;
        let mut breaking = 0u64;
        let mut max_weight = 0.0_f64;
        let mut most_recent: Option<DateTime<Utc>> = None;

        for chunk in &chunks {
            match chunk.metadata.get("kind").and_then(|v| v.as_str()) {
                Some("pr") => prs += 1,
                Some("commit") => commits += 1,
                Some("doc_change") => doc_changes += 1,
                _ => {}
            }
            if chunk.tags.iter().any(|t| t == "breaking_change") {
                breaking += 1;
            }
            let weight = chunk.metadata.get("signal_weight").and_then(serde_json::Value::as_f64).unwrap_or(1.0);
            max_weight = max_weight.max(weight);
            if let Some(ts) = chunk.timestamp {
                most_recent = Some(most_recent.map_or(ts, |current| current.max(ts)));
            }
        }

        ScmFeatureInput {
            prs_7d: prs,
            commits_7d: commits,
            doc_changes_7d: doc_changes,
            breaking_labels_7d: breaking,
            max_signal_weight: max_weight,
            hours_since_last_seen: most_recent.map_or(24.0 * 30.0, |ts| hours_since(ts, now)),
        }
    }

    /// Graph axis: component/doc/service counts, 2-hop downstream impact,
    /// and 7-day activity/support volume (spec.md §4.8 "Graph features").
    /// Neighborhood and API-impact reads use the typed accessors; activity
    /// and support-case counts go through `run_query` directly, the
    /// generic parameterized read spec.md §4.2 reserves for exactly this.
    pub async fn graph_features(&self, target: &SeverityTarget, now: DateTime<Utc>) -> GraphFeatureInput {
        let mut feature = GraphFeatureInput {
            num_components: target.component_ids.len() as u64,
            ..GraphFeatureInput::default()
        };
        let since = (now - chrono::Duration::days(CHAT_LOOKBACK_DAYS)).to_rfc3339();

        for component_id in &target.component_ids {
            let neighborhood = self.graph.get_component_neighborhood(component_id).await;
            feature.num_docs += neighborhood.doc_ids.len() as u64;
            feature.num_related_doc_issues += neighborhood.issue_ids.len() as u64;

            let impact = self.graph.get_api_impact(component_id).await;
            feature.downstream_components_depth2 += impact.downstream_components.len() as u64;
            feature.num_services += impact.downstream_services.len() as u64;

            let signal_rows = self
                .graph
                .run_query(
                    "MATCH (c:Component {id: $id})<-[:AFFECTS]-(s:ActivitySignal) WHERE s.created_at >= $since RETURN s.kind AS kind",
                    json!({ "id": component_id, "since": since }),
                )
                .await
                .unwrap_or_default();
            for row in signal_rows {
                match row["kind"].as_str() {
                    Some("chat") => feature.activity_signals_7d_chat += 1,
                    Some("pr" | "commit") => feature.activity_signals_7d_scm += 1,
                    _ => {}
                }
            }

            let support_rows = self
                .graph
                .run_query(
                    "MATCH (c:Component {id: $id})<-[:AFFECTS]-(s:SupportCase) RETURN s.id AS id",
                    json!({ "id": component_id }),
                )
                .await
                .unwrap_or_default();
            feature.num_support_cases += support_rows.len() as u64;
        }

        feature
    }

    /// Semantic axis: samples the three configured pairs by searching the
    /// vector store for chunks near the target's text, scoped to the same
    /// components. `doc_vs_api` has no dedicated source type to search, so
    /// it is approximated with SCM chunks tagged `api` — resolved as an
    /// open question in DESIGN.md.
    pub async fn semantic_pairs(&self, target: &SeverityTarget) -> SemanticPairResult {
        let base = SearchOptions::default()
            .with_top_k(SEMANTIC_SAMPLE_SIZE)
            .with_components(target.component_ids.clone());

        let doc_vs_chat = self
            .vector
            .semantic_search_scored(&target.query_text, base.clone().with_source_types(vec![SourceType::Chat]))
            .await;
        let doc_vs_scm = self
            .vector
            .semantic_search_scored(&target.query_text, base.clone().with_source_types(vec![SourceType::Scm]))
            .await;
        let doc_vs_api = self
            .vector
            .semantic_search_scored(
                &target.query_text,
                base.with_source_types(vec![SourceType::Scm]).with_tags(vec!["api".to_string()]),
            )
            .await;

        SemanticPairResult {
            doc_vs_chat: to_samples(doc_vs_chat),
            doc_vs_scm: to_samples(doc_vs_scm),
            doc_vs_api: to_samples(doc_vs_api),
        }
    }
}

fn to_samples(scored: Vec<(common::Chunk, f32)>) -> Vec<SemanticPairSample> {
    scored.into_iter().map(|(_, score)| SemanticPairSample { similarity: f64::from(score) }).collect()
}

fn hours_since(ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - ts).num_seconds().max(0) as f64 / 3600.0
}
