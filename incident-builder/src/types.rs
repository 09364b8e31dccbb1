//! Data types for the Incident/Trace Builder (spec.md §3 "Incident
//! Candidate", §4.9).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use severity_engine::SeverityPayload;

/// One reference into an upstream record, attached to an incident entity
/// by evidence id (spec.md §3 "evidence": `{evidence_id, source, title,
/// url, metadata}`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_id: String,
    pub source: String,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A doc the reasoning run flagged as worth surfacing, with the reason it
/// was prioritized (spec.md §4.9 step 3 "doc priority reason").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocPriority {
    pub doc_id: String,
    pub doc_url: Option<String>,
    pub reason: String,
}

/// The composed input to the builder: everything one reasoning run (query
/// plus retrieval plus any plan execution) produced (spec.md §4.9: "Given
/// a reasoning result (query, summary, evidence, components, doc
/// priorities, modalities used)").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub query: String,
    pub summary: String,
    pub evidence: Vec<Evidence>,
    pub components: Vec<String>,
    pub doc_priorities: Vec<DocPriority>,
    pub modalities_used: Vec<String>,
    #[serde(default)]
    pub severity_payload: Option<SeverityPayload>,
}

/// Component/doc/issue/thread/scm-ref ids in scope for the incident
/// (spec.md §3 "incident_scope").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IncidentScope {
    pub component_ids: Vec<String>,
    pub doc_ids: Vec<String>,
    pub issue_ids: Vec<String>,
    pub chat_thread_ids: Vec<String>,
    pub scm_refs: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Per-entity rollup (spec.md §3 "incident_entities": "a rolled-up
/// per-entity view with activity/dissatisfaction signal maps and
/// suggested action"). Field names match the camelCase the invariant in
/// spec.md §3 spells out (`evidenceIds`), even though the rest of this
/// crate is snake_case.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncidentEntity {
    pub entity_id: String,
    pub entity_type: String,
    #[serde(rename = "activitySignals")]
    pub activity_signals: BTreeMap<String, u64>,
    #[serde(rename = "dissatisfactionSignals")]
    pub dissatisfaction_signals: BTreeMap<String, u64>,
    #[serde(rename = "evidenceIds")]
    pub evidence_ids: Vec<String>,
    #[serde(rename = "suggestedAction")]
    pub suggested_action: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IncidentCounts {
    pub components: usize,
    pub docs: usize,
    pub issues: usize,
    pub chat_threads: usize,
    pub scm_refs: usize,
    pub evidence: usize,
}

/// Emitted after a reasoning run (spec.md §3 "Incident Candidate").
/// Invariant: every `evidence_id` referenced by
/// `incident_entities[*].evidenceIds` must exist in `evidence`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncidentCandidate {
    pub incident_id: uuid::Uuid,
    pub created_at: DateTime<Utc>,
    pub summary: String,
    pub components: Vec<String>,
    pub doc_priorities: Vec<DocPriority>,
    pub sources_used: Vec<String>,
    pub counts: IncidentCounts,
    pub incident_scope: IncidentScope,
    pub severity: IncidentSeverity,
    pub blast_radius_score: f64,
    pub evidence: Vec<Evidence>,
    pub incident_entities: Vec<IncidentEntity>,
    #[serde(default)]
    pub severity_payload: Option<SeverityPayload>,
}
