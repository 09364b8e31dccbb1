use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{chunk::entity_id, error::AppError, Chunk, SourceType};
use graph_service::GraphService;
use serde_json::{json, Value};
use vector_service::VectorService;

use crate::handler::{HandlerResult, IngestCounts, ModalityHandler};

#[derive(Clone, Debug, Default)]
pub struct PullRequest {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub files_changed: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
    pub labels: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct Commit {
    pub repo: String,
    pub sha: String,
    pub message: String,
    pub files_changed: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
    pub labels: Vec<String>,
    pub committed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct ScmIssue {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub comments: u64,
    pub reactions: u64,
    pub labels: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

const DISSATISFACTION_LABELS: &[&str] = &["regression", "customer-escalation", "dissatisfaction"];
const BREAKING_LABELS: &[&str] = &["breaking_change", "bug"];

#[async_trait]
pub trait ScmApi: Send + Sync {
    async fn list_prs(&self, repo: &str, since: Option<DateTime<Utc>>) -> Result<Vec<PullRequest>, AppError>;
    async fn list_commits(&self, repo: &str, since: Option<DateTime<Utc>>) -> Result<Vec<Commit>, AppError>;
    async fn list_issues(&self, repo: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ScmIssue>, AppError>;
    async fn search(&self, repos: &[String], text: &str) -> Result<Vec<PullRequest>, AppError>;
}

/// Maps a changed file path to component ids via a prefix-match rule list
/// (spec.md §4.3 "SCM handler").
#[derive(Clone, Debug)]
pub struct ComponentRule {
    pub prefix: String,
    pub components: Vec<String>,
    pub endpoint_ids: Vec<String>,
}

fn resolve_components<'a>(path: &str, rules: &'a [ComponentRule]) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut components = Vec::new();
    let mut endpoints = Vec::new();
    for rule in rules {
        if path.starts_with(&rule.prefix) {
            components.extend(rule.components.iter().map(String::as_str));
            endpoints.extend(rule.endpoint_ids.iter().map(String::as_str));
        }
    }
    (components, endpoints)
}

fn has_any_label(labels: &[String], targets: &[&str]) -> bool {
    labels.iter().any(|label| targets.contains(&label.as_str()))
}

fn pr_weight(files: usize, churn: u64) -> f64 {
    1.0 + (files.min(10) as f64) * 0.1 + (churn as f64 / 200.0).min(1.0) * 0.5
}

fn commit_weight(files: usize, churn: u64) -> f64 {
    pr_weight(files, churn)
}

fn issue_weight(comments: u64, reactions: u64, dissatisfied: bool) -> f64 {
    0.05 * (comments.min(20) as f64) + 0.03 * (reactions.min(20) as f64) + if dissatisfied { 0.4 } else { 0.0 }
}

pub struct ScmHandler {
    api: Arc<dyn ScmApi>,
    vector: Arc<VectorService>,
    graph: Arc<GraphService>,
    repos: Vec<String>,
    rules: Vec<ComponentRule>,
    weight: f64,
}

impl ScmHandler {
    #[must_use]
    pub fn new(
        api: Arc<dyn ScmApi>,
        vector: Arc<VectorService>,
        graph: Arc<GraphService>,
        repos: Vec<String>,
        rules: Vec<ComponentRule>,
        weight: f64,
    ) -> Self {
        Self {
            api,
            vector,
            graph,
            repos,
            rules,
            weight,
        }
    }

    async fn ingest_repo(&self, repo: &str, counts: &mut IngestCounts) -> Result<(), AppError> {
        let prs = self.api.list_prs(repo, None).await.unwrap_or_default();
        let commits = self.api.list_commits(repo, None).await.unwrap_or_default();
        let issues = self.api.list_issues(repo, None).await.unwrap_or_default();
        counts.items_seen += (prs.len() + commits.len() + issues.len()) as u64;

        let mut chunks = Vec::new();
        for pr in &prs {
            let churn = pr.additions + pr.deletions;
            let weight = pr_weight(pr.files_changed.len(), churn);
            let id = entity_id("scm", &format!("{repo}:{}", pr.number));
            let text = format!("PR #{}: {}\n\n{}", pr.number, pr.title, pr.body);
            let chunk = Chunk::new(id.clone(), SourceType::Scm, text)
                .with_timestamp(pr.updated_at)
                .with_tag("scm");
            chunks.push(chunk);

            for file in &pr.files_changed {
                let (components, endpoints) = resolve_components(file, &self.rules);
                self.graph
                    .upsert_activity_signal(
                        &format!("{id}:{file}"),
                        json!({
                            "kind": "pr",
                            "weight": weight,
                            "components": components,
                            "endpoint_ids": endpoints,
                            "breaking": has_any_label(&pr.labels, BREAKING_LABELS),
                        }),
                    )
                    .await;
            }
        }

        for commit in &commits {
            let churn = commit.additions + commit.deletions;
            let weight = commit_weight(commit.files_changed.len(), churn);
            let id = entity_id("scm", &format!("{repo}:{}", commit.sha));
            let chunk = Chunk::new(id.clone(), SourceType::Scm, commit.message.clone())
                .with_timestamp(commit.committed_at)
                .with_tag("scm");
            chunks.push(chunk);

            for file in &commit.files_changed {
                let (components, endpoints) = resolve_components(file, &self.rules);
                self.graph
                    .upsert_activity_signal(
                        &format!("{id}:{file}"),
                        json!({
                            "kind": "commit",
                            "weight": weight,
                            "components": components,
                            "endpoint_ids": endpoints,
                            "breaking": has_any_label(&commit.labels, BREAKING_LABELS),
                        }),
                    )
                    .await;
            }
        }

        for issue in &issues {
            let dissatisfied = has_any_label(&issue.labels, DISSATISFACTION_LABELS);
            let weight = issue_weight(issue.comments, issue.reactions, dissatisfied);
            let id = entity_id("issue", &format!("{repo}:{}", issue.number));
            let text = format!("Issue #{}: {}\n\n{}", issue.number, issue.title, issue.body);
            chunks.push(
                Chunk::new(id.clone(), SourceType::Issue, text)
                    .with_timestamp(issue.updated_at)
                    .with_tag("issue"),
            );

            if dissatisfied {
                self.graph
                    .upsert_support_case(&id, json!({ "weight": weight, "labels": issue.labels }))
                    .await;
            }
        }

        if !chunks.is_empty() {
            self.vector.index_chunks(&chunks).await?;
            counts.chunks_written += chunks.len() as u64;
        }
        Ok(())
    }
}

#[async_trait]
impl ModalityHandler for ScmHandler {
    fn modality_id(&self) -> &str {
        "scm"
    }

    fn can_ingest(&self) -> bool {
        true
    }

    fn can_query(&self) -> bool {
        true
    }

    async fn ingest(&self, scope_override: Option<Value>) -> Result<IngestCounts, AppError> {
        let repos: Vec<String> = scope_override
            .as_ref()
            .and_then(|v| v["repos"].as_array())
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| self.repos.clone());

        let mut counts = IngestCounts::default();
        for repo in repos {
            if let Err(_err) = self.ingest_repo(&repo, &mut counts).await {
                counts.errors += 1;
            }
        }
        Ok(counts)
    }

    async fn query(&self, text: &str, limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
        let prs = self.api.search(&self.repos, text).await?;
        let limit = limit.unwrap_or(10) as usize;

        Ok(prs
            .into_iter()
            .take(limit)
            .map(|pr| {
                let churn = pr.additions + pr.deletions;
                let raw_score = pr_weight(pr.files_changed.len(), churn);
                HandlerResult {
                    modality: "scm".to_string(),
                    source_type: "scm".to_string(),
                    chunk_id: None,
                    entity_id: Some(entity_id("scm", &format!("{}:{}", pr.repo, pr.number))),
                    title: Some(format!("PR #{}: {}", pr.number, pr.title)),
                    text: pr.body,
                    raw_score,
                    score: 0.0,
                    url: None,
                    metadata: json!({ "repo": pr.repo, "number": pr.number }),
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
    fn pr_weight_matches_the_documented_formula() {
        // 1 + min(files,10)*0.1 + min(churn/200,1)*0.5
        assert!((pr_weight(5, 100) - (1.0 + 0.5 + 0.25)).abs() < 1e-9);
        assert!((pr_weight(20, 1000) - (1.0 + 1.0 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn issue_weight_adds_dissatisfaction_bump() {
        let base = issue_weight(10, 5, false);
        let bumped = issue_weight(10, 5, true);
        assert!((bumped - base - 0.4).abs() < 1e-9);
    }

    #[test]
    fn component_resolution_matches_the_longest_applicable_prefix_rule() {
        let rules = vec![ComponentRule {
            prefix: "services/auth/".to_string(),
            components: vec!["auth".to_string()],
            endpoint_ids: vec!["auth.login".to_string()],
        }];
        let (components, endpoints) = resolve_components("services/auth/login.rs", &rules);
        assert_eq!(components, vec!["auth"]);
        assert_eq!(endpoints, vec!["auth.login"]);
    }
}
