use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{chunk::entity_id, error::AppError};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::handler::{HandlerResult, IngestCounts, ModalityHandler};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn weight(self) -> f64 {
        match self {
            Severity::Critical => 3.0,
            Severity::High => 2.0,
            Severity::Medium => 1.2,
            Severity::Low => 0.5,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DocIssue {
    pub path: String,
    pub title: String,
    pub summary: String,
    pub severity: Severity,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub component_hints: Vec<String>,
}

fn recency_multiplier(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - updated_at).num_hours();
    if age_hours <= 24 {
        1.0
    } else if age_hours <= 24 * 7 {
        0.7
    } else {
        0.4
    }
}

/// Query-only handler over a persisted JSON list of doc issues (spec.md
/// §4.3 "Doc-issues handler").
pub struct DocIssuesHandler {
    path: PathBuf,
    weight: f64,
}

impl DocIssuesHandler {
    #[must_use]
    pub fn new(path: PathBuf, weight: f64) -> Self {
        Self { path, weight }
    }

    async fn load(&self) -> Vec<DocIssue> {
        tokio::fs::read(&self.path)
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }
}

/// Scores a doc issue against `query` and an optional `component_hint`,
/// matching spec.md §4.3 exactly: severity weight * recency multiplier,
/// plus +0.5 each for a query-text match and a component-hint match.
#[must_use]
pub fn score_doc_issue(issue: &DocIssue, query: &str, component_hint: Option<&str>, now: DateTime<Utc>) -> f64 {
    let mut score = issue.severity.weight() * recency_multiplier(issue.updated_at, now);

    let needle = query.to_lowercase();
    if !needle.is_empty()
        && (issue.summary.to_lowercase().contains(&needle)
            || issue.title.to_lowercase().contains(&needle)
            || issue.path.to_lowercase().contains(&needle))
    {
        score += 0.5;
    }
    if let Some(hint) = component_hint {
        if issue.component_hints.iter().any(|c| c == hint) {
            score += 0.5;
        }
    }
    score
}

#[async_trait]
impl ModalityHandler for DocIssuesHandler {
    fn modality_id(&self) -> &str {
        "doc_issues"
    }

    fn can_ingest(&self) -> bool {
        false
    }

    fn can_query(&self) -> bool {
        true
    }

    async fn ingest(&self, _scope_override: Option<serde_json::Value>) -> Result<IngestCounts, AppError> {
        Ok(IngestCounts::default())
    }

    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        let now = Utc::now();
        let mut issues = self.load().await;
        let limit = limit.unwrap_or(10) as usize;

        let mut scored: Vec<(f64, DocIssue)> = issues
            .drain(..)
            .map(|issue| (score_doc_issue(&issue, text, None, now), issue))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(raw_score, issue)| {
                HandlerResult {
                    modality: "doc_issues".to_string(),
                    source_type: "doc_issue".to_string(),
                    chunk_id: None,
                    entity_id: Some(entity_id("doc_issue", &issue.path)),
                    title: Some(issue.title.clone()),
                    text: issue.summary.clone(),
                    raw_score,
                    score: 0.0,
                    url: None,
                    metadata: json!({ "path": issue.path, "severity": issue.severity }),
                }
                .weighted(self.weight)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity, updated_at: DateTime<Utc>) -> DocIssue {
        DocIssue {
            path: "docs/auth.md".into(),
            title: "Auth doc drift".into(),
            summary: "auth flow changed".into(),
            severity,
            updated_at,
            component_hints: vec!["auth".into()],
        }
    }

    #[test]
    fn score_combines_severity_recency_and_match_bonuses() {
        let now = Utc::now();
        let fresh_critical = issue(Severity::Critical, now);
        let score = score_doc_issue(&fresh_critical, "auth flow", Some("auth"), now);
        // 3.0 * 1.0 + 0.5 (text match) + 0.5 (component hint) = 4.0
        assert!((score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn older_issues_get_a_lower_recency_multiplier() {
        let now = Utc::now();
        let stale = issue(Severity::High, now - chrono::Duration::days(10));
        let score = score_doc_issue(&stale, "", None, now);
        assert!((score - (2.0 * 0.4)).abs() < 1e-9);
    }
}
