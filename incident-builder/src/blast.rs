//! Blast-radius scoring (spec.md §4.9 step 2).

use crate::types::{Evidence, IncidentScope, IncidentSeverity};

const TRUST_CAP: f64 = 40.0;
const SCOPE_CAP: f64 = 35.0;
const RECENCY_CAP: f64 = 25.0;
const RECENCY_HORIZON_HOURS: f64 = 72.0;

/// Fixed per-source trust weight (spec.md §4.9: "source_trust is a fixed
/// lookup").
#[must_use]
pub fn source_trust(source: &str) -> f64 {
    match source {
        "scm" => 1.0,
        "doc" => 0.9,
        "issue" => 0.85,
        "chat" => 0.7,
        "graph" => 0.65,
        _ => 0.5,
    }
}

#[must_use]
pub fn severity_for_total(total: f64) -> IncidentSeverity {
    if total >= 80.0 {
        IncidentSeverity::Critical
    } else if total >= 60.0 {
        IncidentSeverity::High
    } else if total >= 40.0 {
        IncidentSeverity::Medium
    } else {
        IncidentSeverity::Low
    }
}

/// The three components of the blast-radius score and their sum
/// (spec.md §4.9 step 2).
#[derive(Clone, Copy, Debug, Default)]
pub struct BlastRadius {
    pub trust: f64,
    pub scope: f64,
    pub recency: f64,
    pub total: f64,
}

/// `trust = min(40, sum(source_trust * 8))`; `scope = min(35, 6*components
/// + 4*docs + 5*issues + 3*(chat+scm))`; `recency` up to 25, linear from 1
/// at 0h to 0 at 72h+ average evidence age.
#[must_use]
pub fn compute_blast_radius(evidence: &[Evidence], scope: &IncidentScope, average_freshness_hours: Option<f64>) -> BlastRadius {
    let trust_sum: f64 = evidence.iter().map(|e| source_trust(&e.source)).sum();
    let trust = (trust_sum * 8.0).min(TRUST_CAP);

    let components = scope.component_ids.len() as f64;
    let docs = scope.doc_ids.len() as f64;
    let issues = scope.issue_ids.len() as f64;
    let chat_scm = (scope.chat_thread_ids.len() + scope.scm_refs.len()) as f64;
    let scope_score = (6.0 * components + 4.0 * docs + 5.0 * issues + 3.0 * chat_scm).min(SCOPE_CAP);

    let recency = average_freshness_hours.map_or(0.0, |hours| RECENCY_CAP * (1.0 - hours / RECENCY_HORIZON_HOURS).clamp(0.0, 1.0));

    BlastRadius {
        trust,
        scope: scope_score,
        recency,
        total: trust + scope_score + recency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Evidence;

    fn evidence(source: &str) -> Evidence {
        Evidence {
            evidence_id: format!("ev-{source}"),
            source: source.to_string(),
            title: None,
            url: None,
            metadata: serde_json::Map::new(),
            timestamp: None,
        }
    }

    #[test]
    fn trust_is_capped_at_forty() {
        let evidence: Vec<Evidence> = (0..10).map(|_| evidence("scm")).collect();
        let scope = IncidentScope::default();
        let blast = compute_blast_radius(&evidence, &scope, None);
        assert_eq!(blast.trust, TRUST_CAP);
    }

    #[test]
    fn scope_is_capped_at_thirty_five() {
        let scope = IncidentScope {
            component_ids: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into(), "f".into(), "g".into(), "h".into()],
            ..IncidentScope::default()
        };
        let blast = compute_blast_radius(&[], &scope, None);
        assert_eq!(blast.scope, SCOPE_CAP);
    }

    #[test]
    fn recency_decays_linearly_to_zero_at_the_horizon() {
        let scope = IncidentScope::default();
        let fresh = compute_blast_radius(&[], &scope, Some(0.0));
        let stale = compute_blast_radius(&[], &scope, Some(RECENCY_HORIZON_HOURS));
        let beyond = compute_blast_radius(&[], &scope, Some(RECENCY_HORIZON_HOURS * 2.0));
        assert_eq!(fresh.recency, RECENCY_CAP);
        assert_eq!(stale.recency, 0.0);
        assert_eq!(beyond.recency, 0.0);
    }

    #[test]
    fn severity_thresholds_match_spec_boundaries() {
        assert_eq!(severity_for_total(80.0), IncidentSeverity::Critical);
        assert_eq!(severity_for_total(79.999), IncidentSeverity::High);
        assert_eq!(severity_for_total(60.0), IncidentSeverity::High);
        assert_eq!(severity_for_total(40.0), IncidentSeverity::Medium);
        assert_eq!(severity_for_total(39.999), IncidentSeverity::Low);
    }
}
