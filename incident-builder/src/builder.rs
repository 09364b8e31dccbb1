//! Top-level entry point: turns a [`ReasoningResult`] into an
//! [`IncidentCandidate`] (spec.md §4.9).

use std::collections::BTreeSet;

use chrono::Utc;

use crate::{
    blast::{compute_blast_radius, severity_for_total},
    entities::{average_freshness_hours, build_entities, build_scope},
    types::{IncidentCandidate, IncidentCounts, ReasoningResult},
};

#[must_use]
pub fn build_incident(result: &ReasoningResult) -> IncidentCandidate {
    let now = Utc::now();

    let scope = build_scope(&result.components, &result.evidence);
    let freshness = average_freshness_hours(&result.evidence, now);
    let blast = compute_blast_radius(&result.evidence, &scope, freshness);
    let severity = severity_for_total(blast.total);
    let incident_entities = build_entities(&scope, &result.doc_priorities, &result.evidence);

    let sources_used: Vec<String> = result.evidence.iter().map(|e| e.source.clone()).collect::<BTreeSet<_>>().into_iter().collect();

    let counts = IncidentCounts {
        components: scope.component_ids.len(),
        docs: scope.doc_ids.len(),
        issues: scope.issue_ids.len(),
        chat_threads: scope.chat_thread_ids.len(),
        scm_refs: scope.scm_refs.len(),
        evidence: result.evidence.len(),
    };

    IncidentCandidate {
        incident_id: uuid::Uuid::new_v4(),
        created_at: now,
        summary: result.summary.clone(),
        components: scope.component_ids.clone(),
        doc_priorities: result.doc_priorities.clone(),
        sources_used,
        counts,
        incident_scope: scope,
        severity,
        blast_radius_score: blast.total,
        evidence: result.evidence.clone(),
        incident_entities,
        severity_payload: result.severity_payload.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocPriority, Evidence};

    fn reasoning_result() -> ReasoningResult {
        ReasoningResult {
            query: "auth login failing intermittently".to_string(),
            summary: "Auth service intermittently rejects valid logins after the token refactor.".to_string(),
            evidence: vec![
                Evidence {
                    evidence_id: "ev-doc".to_string(),
                    source: "doc".to_string(),
                    title: Some("Auth token format".to_string()),
                    url: Some("https://docs.example.com/auth".to_string()),
                    metadata: serde_json::json!({ "doc_id": "auth-token-format", "component_id": "auth" }).as_object().cloned().unwrap(),
                    timestamp: Some(Utc::now()),
                },
                Evidence {
                    evidence_id: "ev-pr".to_string(),
                    source: "scm".to_string(),
                    title: Some("PR #42: refactor token validation".to_string()),
                    url: None,
                    metadata: serde_json::json!({ "repo": "core", "number": 42, "component_id": "auth" }).as_object().cloned().unwrap(),
                    timestamp: Some(Utc::now()),
                },
            ],
            components: vec!["auth".to_string()],
            doc_priorities: vec![DocPriority {
                doc_id: "auth-token-format".to_string(),
                doc_url: Some("https://docs.example.com/auth".to_string()),
                reason: "Token format changed in PR #42, doc not yet updated".to_string(),
            }],
            modalities_used: vec!["chat".to_string(), "scm".to_string()],
            severity_payload: None,
        }
    }

    #[test]
    fn every_entity_evidence_id_exists_in_the_candidates_evidence_list() {
        let incident = build_incident(&reasoning_result());
        let known_ids: std::collections::HashSet<&str> = incident.evidence.iter().map(|e| e.evidence_id.as_str()).collect();
        for entity in &incident.incident_entities {
            for evidence_id in &entity.evidence_ids {
                assert!(known_ids.contains(evidence_id.as_str()));
            }
        }
    }

    #[test]
    fn scm_and_doc_evidence_with_recent_timestamps_yields_meaningful_blast_radius() {
        let incident = build_incident(&reasoning_result());
        assert!(incident.blast_radius_score > 0.0);
        assert!(incident.blast_radius_score <= 100.0);
    }

    #[test]
    fn sources_used_is_deduped_and_sorted() {
        let incident = build_incident(&reasoning_result());
        assert_eq!(incident.sources_used, vec!["doc".to_string(), "scm".to_string()]);
    }
}
