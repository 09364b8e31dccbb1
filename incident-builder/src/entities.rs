//! Scope summarization, the evidence index, and per-entity rollups
//! (spec.md §4.9 steps 1 and 3).

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{DocPriority, Evidence, IncidentEntity, IncidentScope};

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Step 1: union the caller's components with component ids discovered in
/// evidence metadata, plus doc/issue/chat-thread/scm-ref ids surfaced by
/// the evidence itself.
#[must_use]
pub fn build_scope(input_components: &[String], evidence: &[Evidence]) -> IncidentScope {
    let mut scope = IncidentScope {
        component_ids: input_components.to_vec(),
        ..IncidentScope::default()
    };

    for item in evidence {
        if let Some(component_id) = item.metadata.get("component_id").and_then(Value::as_str) {
            push_unique(&mut scope.component_ids, component_id);
        }
        if let Some(components) = item.metadata.get("components").and_then(Value::as_array) {
            for component_id in components.iter().filter_map(Value::as_str) {
                push_unique(&mut scope.component_ids, component_id);
            }
        }

        match item.source.as_str() {
            "doc" => {
                let doc_id = item.metadata.get("doc_id").and_then(Value::as_str).unwrap_or(&item.evidence_id);
                push_unique(&mut scope.doc_ids, doc_id);
            }
            "issue" => {
                let issue_id = item.metadata.get("issue_id").and_then(Value::as_str).unwrap_or(&item.evidence_id);
                push_unique(&mut scope.issue_ids, issue_id);
            }
            "chat" => {
                if let (Some(channel_id), Some(thread_ts)) = (
                    item.metadata.get("channel_id").and_then(Value::as_str),
                    item.metadata.get("thread_ts").and_then(Value::as_str),
                ) {
                    push_unique(&mut scope.chat_thread_ids, &format!("{channel_id}:{thread_ts}"));
                }
            }
            "scm" => {
                let reference = item
                    .metadata
                    .get("number")
                    .and_then(Value::as_u64)
                    .map(|n| n.to_string())
                    .or_else(|| item.metadata.get("sha").and_then(Value::as_str).map(str::to_string));
                if let (Some(repo), Some(reference)) = (item.metadata.get("repo").and_then(Value::as_str), reference) {
                    push_unique(&mut scope.scm_refs, &format!("{repo}:{reference}"));
                }
            }
            _ => {}
        }
    }

    scope
}

/// The average age, in hours, of every timestamped piece of evidence
/// (spec.md §4.9 step 2 "average freshness"). `None` when no evidence
/// carries a timestamp.
#[must_use]
pub fn average_freshness_hours(evidence: &[Evidence], now: DateTime<Utc>) -> Option<f64> {
    let ages: Vec<f64> = evidence
        .iter()
        .filter_map(|item| item.timestamp)
        .map(|ts| (now - ts).num_seconds().max(0) as f64 / 3600.0)
        .collect();
    if ages.is_empty() {
        None
    } else {
        Some(ages.iter().sum::<f64>() / ages.len() as f64)
    }
}

/// Keyed by doc_id/doc_url/component_id/evidence_id so per-entity rollups
/// can attach `evidenceIds` by any of the identifiers a caller might know
/// the entity by (spec.md §4.9 step 3 "a pre-built index keyed by
/// doc_id/doc_url/component_id").
#[must_use]
pub fn build_evidence_index(evidence: &[Evidence]) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    let mut index_under = |key: String, evidence_id: &str| {
        let ids = index.entry(key).or_default();
        if !ids.iter().any(|id| id == evidence_id) {
            ids.push(evidence_id.to_string());
        }
    };

    for item in evidence {
        index_under(item.evidence_id.clone(), &item.evidence_id);
        if let Some(doc_id) = item.metadata.get("doc_id").and_then(Value::as_str) {
            index_under(doc_id.to_string(), &item.evidence_id);
        }
        if let Some(doc_url) = item.metadata.get("doc_url").and_then(Value::as_str) {
            index_under(doc_url.to_string(), &item.evidence_id);
        }
        if let Some(url) = &item.url {
            index_under(url.clone(), &item.evidence_id);
        }
        if let Some(component_id) = item.metadata.get("component_id").and_then(Value::as_str) {
            index_under(component_id.to_string(), &item.evidence_id);
        }
        if let Some(components) = item.metadata.get("components").and_then(Value::as_array) {
            for component_id in components.iter().filter_map(Value::as_str) {
                index_under(component_id.to_string(), &item.evidence_id);
            }
        }
    }
    index
}

fn lookup_evidence_ids(keys: &[&str], index: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for key in keys {
        if let Some(found) = index.get(*key) {
            for id in found {
                if seen.insert(id.clone()) {
                    ids.push(id.clone());
                }
            }
        }
    }
    ids
}

fn activity_and_dissatisfaction(
    evidence_ids: &[String],
    evidence: &[Evidence],
    entity_id: &str,
    doc_priorities: &[DocPriority],
) -> (BTreeMap<String, u64>, BTreeMap<String, u64>) {
    let related: HashSet<&str> = evidence_ids.iter().map(String::as_str).collect();
    let mut activity = BTreeMap::new();
    let mut dissatisfaction = BTreeMap::new();

    let mut count_by_source = |source: &str| -> u64 { evidence.iter().filter(|e| related.contains(e.evidence_id.as_str()) && e.source == source).count() as u64 };

    let scm_events = count_by_source("scm");
    if scm_events > 0 {
        activity.insert("scm_events".to_string(), scm_events);
    }
    let doc_issues = count_by_source("doc_issue");
    if doc_issues > 0 {
        activity.insert("doc_issues".to_string(), doc_issues);
        dissatisfaction.insert("doc_issues".to_string(), doc_issues);
    }
    let chat_threads = count_by_source("chat");
    if chat_threads > 0 {
        activity.insert("chat_threads".to_string(), chat_threads);
    }
    let support_cases = count_by_source("support_case");
    if support_cases > 0 {
        dissatisfaction.insert("support_cases".to_string(), support_cases);
    }

    let doc_priority_hits = doc_priorities
        .iter()
        .filter(|dp| dp.doc_id == entity_id || dp.doc_url.as_deref() == Some(entity_id))
        .count() as u64;
    if doc_priority_hits > 0 {
        activity.insert("doc_priorities".to_string(), doc_priority_hits);
    }

    (activity, dissatisfaction)
}

/// The driver behind a suggested action: a matching doc priority's reason,
/// else a dependency-impact summary for components, else a generic default
/// (spec.md §4.9 step 3).
fn suggested_action(entity_type: &str, entity_id: &str, doc_priorities: &[DocPriority]) -> String {
    if let Some(doc_priority) = doc_priorities.iter().find(|dp| dp.doc_id == entity_id || dp.doc_url.as_deref() == Some(entity_id)) {
        return doc_priority.reason.clone();
    }
    match entity_type {
        "component" => format!("Review downstream dependency impact for component {entity_id}"),
        "issue" => format!("Triage issue {entity_id} for closure or escalation"),
        "chat_thread" => format!("Confirm chat thread {entity_id} has a resolution owner"),
        _ => "Review the attached evidence for next steps".to_string(),
    }
}

fn build_entity(entity_type: &str, entity_id: &str, keys: &[&str], evidence: &[Evidence], doc_priorities: &[DocPriority], index: &HashMap<String, Vec<String>>) -> IncidentEntity {
    let evidence_ids = lookup_evidence_ids(keys, index);
    let (activity_signals, dissatisfaction_signals) = activity_and_dissatisfaction(&evidence_ids, evidence, entity_id, doc_priorities);
    IncidentEntity {
        entity_id: entity_id.to_string(),
        entity_type: entity_type.to_string(),
        activity_signals,
        dissatisfaction_signals,
        evidence_ids,
        suggested_action: suggested_action(entity_type, entity_id, doc_priorities),
    }
}

/// Step 3: one entity per affected component, per doc referenced by
/// doc-priorities, per support/issue evidence, per chat-thread evidence.
#[must_use]
pub fn build_entities(scope: &IncidentScope, doc_priorities: &[DocPriority], evidence: &[Evidence]) -> Vec<IncidentEntity> {
    let index = build_evidence_index(evidence);
    let mut entities = Vec::new();

    for component_id in &scope.component_ids {
        entities.push(build_entity("component", component_id, &[component_id.as_str()], evidence, doc_priorities, &index));
    }
    for doc_priority in doc_priorities {
        let keys: Vec<&str> = [Some(doc_priority.doc_id.as_str()), doc_priority.doc_url.as_deref()].into_iter().flatten().collect();
        entities.push(build_entity("doc", &doc_priority.doc_id, &keys, evidence, doc_priorities, &index));
    }
    for item in evidence.iter().filter(|e| e.source == "issue") {
        entities.push(build_entity("issue", &item.evidence_id, &[item.evidence_id.as_str()], evidence, doc_priorities, &index));
    }
    for item in evidence.iter().filter(|e| e.source == "chat") {
        if let (Some(channel_id), Some(thread_ts)) = (
            item.metadata.get("channel_id").and_then(Value::as_str),
            item.metadata.get("thread_ts").and_then(Value::as_str),
        ) {
            let thread_id = format!("{channel_id}:{thread_ts}");
            entities.push(build_entity("chat_thread", &thread_id, &[thread_id.as_str()], evidence, doc_priorities, &index));
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence_item(source: &str, evidence_id: &str, metadata: serde_json::Value) -> Evidence {
        Evidence {
            evidence_id: evidence_id.to_string(),
            source: source.to_string(),
            title: None,
            url: None,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            timestamp: None,
        }
    }

    #[test]
    fn scope_unions_input_components_with_evidence_discovered_ones() {
        let evidence = vec![evidence_item("doc", "ev-1", serde_json::json!({ "component_id": "auth" }))];
        let scope = build_scope(&["billing".to_string()], &evidence);
        assert!(scope.component_ids.contains(&"auth".to_string()));
        assert!(scope.component_ids.contains(&"billing".to_string()));
    }

    #[test]
    fn chat_evidence_produces_a_channel_colon_ts_thread_id() {
        let evidence = vec![evidence_item("chat", "ev-1", serde_json::json!({ "channel_id": "c1", "thread_ts": "123.45" }))];
        let scope = build_scope(&[], &evidence);
        assert_eq!(scope.chat_thread_ids, vec!["c1:123.45".to_string()]);
    }

    #[test]
    fn every_entity_evidence_id_exists_in_the_evidence_list() {
        let evidence = vec![
            evidence_item("doc", "ev-doc", serde_json::json!({ "doc_id": "readme", "component_id": "auth" })),
            evidence_item("chat", "ev-chat", serde_json::json!({ "channel_id": "c1", "thread_ts": "1.0", "component_id": "auth" })),
        ];
        let scope = build_scope(&[], &evidence);
        let doc_priorities = vec![DocPriority {
            doc_id: "readme".to_string(),
            doc_url: None,
            reason: "drifted from code".to_string(),
        }];
        let entities = build_entities(&scope, &doc_priorities, &evidence);
        let known_ids: HashSet<&str> = evidence.iter().map(|e| e.evidence_id.as_str()).collect();
        for entity in &entities {
            for evidence_id in &entity.evidence_ids {
                assert!(known_ids.contains(evidence_id.as_str()));
            }
        }
    }

    #[test]
    fn doc_entity_uses_the_matching_priority_reason_as_its_suggested_action() {
        let evidence = vec![evidence_item("doc", "ev-doc", serde_json::json!({ "doc_id": "readme" }))];
        let scope = build_scope(&[], &evidence);
        let doc_priorities = vec![DocPriority {
            doc_id: "readme".to_string(),
            doc_url: None,
            reason: "API signature changed".to_string(),
        }];
        let entities = build_entities(&scope, &doc_priorities, &evidence);
        let doc_entity = entities.iter().find(|e| e.entity_type == "doc").unwrap();
        assert_eq!(doc_entity.suggested_action, "API signature changed");
    }
}
