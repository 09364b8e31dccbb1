//! Raw per-axis feature snapshots for the Severity Engine (spec.md §4.8).
//! Each struct is exactly what one isolated, independently re-runnable
//! feature query returns — nothing here is derived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 7-day chat (Slack/Teams-style) activity around an issue's components.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChatFeatureInput {
    pub messages_7d: u64,
    pub threads_7d: u64,
    pub unique_authors_7d: u64,
    pub max_signal_weight: f64,
    pub avg_signal_weight: f64,
    /// Hours since the oldest in-window signal was last seen. A large
    /// sentinel (no recent activity at all) rather than `None` keeps the
    /// recency formula total.
    pub hours_since_last_seen: f64,
    pub in_critical_channel: bool,
    pub label_count: u64,
}

impl ChatFeatureInput {
    #[must_use]
    pub fn none_seen() -> f64 {
        1e9
    }
}

/// 7-day SCM (PR/commit) activity around an issue's components.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ScmFeatureInput {
    pub prs_7d: u64,
    pub commits_7d: u64,
    pub doc_changes_7d: u64,
    pub breaking_labels_7d: u64,
    pub max_signal_weight: f64,
    pub hours_since_last_seen: f64,
}

/// The issue's own documentation-severity fields (spec.md §3 Severity
/// Payload "doc" axis).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DocFeatureInput {
    pub base_severity_score: f64,
    pub impact_level_score: f64,
    pub updated_at: DateTime<Utc>,
    pub labels: Vec<String>,
    pub component_count: u64,
}

impl Default for DocFeatureInput {
    fn default() -> Self {
        Self {
            base_severity_score: 0.6,
            impact_level_score: 0.6,
            updated_at: Utc::now(),
            labels: Vec::new(),
            component_count: 0,
        }
    }
}

/// Graph-derived blast radius and surrounding activity (spec.md §4.8
/// "Graph features").
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GraphFeatureInput {
    pub num_components: u64,
    pub num_docs: u64,
    pub num_services: u64,
    pub num_related_doc_issues: u64,
    pub activity_signals_7d_chat: u64,
    pub activity_signals_7d_scm: u64,
    pub num_support_cases: u64,
    pub downstream_components_depth2: u64,
}

/// One similarity sample from a semantic pair's vector search (already
/// clamped to `[0, 1]` by the caller, as cosine similarity can be negative).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SemanticPairSample {
    pub similarity: f64,
}

/// The three configured semantic pairs (spec.md §4.8 "Semantic features").
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SemanticPairResult {
    pub doc_vs_chat: Vec<SemanticPairSample>,
    pub doc_vs_scm: Vec<SemanticPairSample>,
    pub doc_vs_api: Vec<SemanticPairSample>,
}

/// Severity labels by `score_0_100` threshold (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLabel {
    Low,
    Medium,
    High,
    Critical,
}

#[must_use]
pub fn label_for_score(score_0_100: f64) -> SeverityLabel {
    if score_0_100 >= 85.0 {
        SeverityLabel::Critical
    } else if score_0_100 >= 70.0 {
        SeverityLabel::High
    } else if score_0_100 >= 50.0 {
        SeverityLabel::Medium
    } else {
        SeverityLabel::Low
    }
}
