//! Per-axis scoring formulas (spec.md §4.8). Each function returns a value
//! in `[0, 1]` plus the intermediate terms that feed the explanation record,
//! mirroring the `{score, terms}` split the reasoning-core scoring code uses
//! to keep raw signals visible alongside the blended number.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::features::{ChatFeatureInput, DocFeatureInput, GraphFeatureInput, ScmFeatureInput, SemanticPairResult};

#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// One axis's score plus the named terms that summed to it, carried through
/// to the explanation record (spec.md §4.8 "full explanation record").
#[derive(Clone, Debug, Default)]
pub struct AxisEval {
    pub score: f64,
    pub terms: BTreeMap<String, f64>,
}

const CRITICAL_LABELS: [&str; 4] = ["breaking_change", "billing", "security", "auth"];

fn has_critical_label(labels: &[String]) -> bool {
    labels.iter().any(|l| CRITICAL_LABELS.contains(&l.as_str()))
}

/// Chat axis: 7-day message/thread/author volume, recency, peak signal
/// weight, and a bonus for critical-channel membership (spec.md §4.8
/// "Chat features").
#[must_use]
pub fn evaluate_chat(features: &ChatFeatureInput) -> AxisEval {
    let msg_term = (1.0 + features.messages_7d as f64).ln();
    let thread_term = (1.0 + features.threads_7d as f64).ln();
    let author_term = (1.0 + features.unique_authors_7d as f64).ln();
    let recency_term = clamp_unit(1.0 - features.hours_since_last_seen / (24.0 * 7.0));
    let weight_term = clamp_unit(features.max_signal_weight.max(0.0) / 5.0);
    let channel_bonus = if features.in_critical_channel { 0.1 } else { 0.0 };

    let raw = 0.3 * msg_term + 0.2 * thread_term + 0.2 * author_term + 0.2 * recency_term + 0.1 * weight_term + channel_bonus;
    let mut score = clamp_unit(raw / 4.0);
    if features.messages_7d == 0 {
        score = score.min(0.15);
    }

    AxisEval {
        score,
        terms: BTreeMap::from([
            ("msg_term".to_string(), msg_term),
            ("thread_term".to_string(), thread_term),
            ("author_term".to_string(), author_term),
            ("recency_term".to_string(), recency_term),
            ("weight_term".to_string(), weight_term),
            ("channel_bonus".to_string(), channel_bonus),
            ("raw_score".to_string(), raw),
        ]),
    }
}

/// SCM axis: 7-day PR/commit/doc-change volume, breaking-change labels,
/// recency, and peak signal weight (spec.md §4.8 "SCM features").
#[must_use]
pub fn evaluate_scm(features: &ScmFeatureInput) -> AxisEval {
    let pr_term = (1.0 + features.prs_7d as f64).ln();
    let commit_term = (1.0 + features.commits_7d as f64).ln();
    let doc_term = (1.0 + features.doc_changes_7d as f64).ln();
    let breaking_term = (1.0 + features.breaking_labels_7d as f64).ln();
    let recency_term = clamp_unit(1.0 - features.hours_since_last_seen / (24.0 * 14.0));
    let weight_term = clamp_unit(features.max_signal_weight.max(0.0) / 5.0);

    let raw = 0.3 * pr_term + 0.2 * commit_term + 0.2 * doc_term + 0.1 * breaking_term + 0.1 * recency_term + 0.1 * weight_term;
    let mut score = clamp_unit(raw / 4.0);
    if features.prs_7d == 0 && features.commits_7d == 0 {
        score = 0.0;
    }

    AxisEval {
        score,
        terms: BTreeMap::from([
            ("pr_term".to_string(), pr_term),
            ("commit_term".to_string(), commit_term),
            ("doc_term".to_string(), doc_term),
            ("breaking_term".to_string(), breaking_term),
            ("recency_term".to_string(), recency_term),
            ("weight_term".to_string(), weight_term),
            ("raw_score".to_string(), raw),
        ]),
    }
}

/// A step-function recency multiplier: fresher doc issues score higher
/// (spec.md §4.8 "Doc features").
#[must_use]
pub fn doc_recency(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours_open = (now - updated_at).num_seconds().max(0) as f64 / 3600.0;
    if hours_open <= 24.0 {
        1.0
    } else if hours_open <= 72.0 {
        0.8
    } else if hours_open <= 24.0 * 7.0 {
        0.6
    } else if hours_open <= 24.0 * 30.0 {
        0.4
    } else {
        0.3
    }
}

/// Doc axis: the issue's own severity/impact fields, blast radius from
/// component count, recency, and a bonus for critical labels (spec.md §4.8
/// "Doc features").
#[must_use]
pub fn evaluate_doc(features: &DocFeatureInput, now: DateTime<Utc>) -> AxisEval {
    let base_term = 0.7 * features.base_severity_score + 0.3 * features.impact_level_score;
    let recency_term = doc_recency(features.updated_at, now);
    let blast_term = clamp_unit(features.component_count as f64 / 4.0);
    let label_bonus = if has_critical_label(&features.labels) { 0.1 } else { 0.0 };

    let raw = 0.4 * base_term + 0.3 * blast_term + 0.3 * recency_term + label_bonus;
    let score = clamp_unit(raw);

    AxisEval {
        score,
        terms: BTreeMap::from([
            ("base_term".to_string(), base_term),
            ("recency_term".to_string(), recency_term),
            ("blast_term".to_string(), blast_term),
            ("label_bonus".to_string(), label_bonus),
            ("raw_score".to_string(), raw),
        ]),
    }
}

/// Graph axis: blast radius (components/docs/services/downstream), recent
/// activity, and related doc-issue volume (spec.md §4.8 "Graph features").
#[must_use]
pub fn evaluate_graph(features: &GraphFeatureInput) -> AxisEval {
    let blast_term = clamp_unit(
        (0.4 * features.num_components as f64
            + 0.2 * features.num_docs as f64
            + 0.2 * features.num_services as f64
            + 0.2 * features.downstream_components_depth2 as f64)
            / 10.0,
    );
    let related_term = clamp_unit(features.num_related_doc_issues as f64 / 5.0);
    let activity_raw = features.activity_signals_7d_chat + features.activity_signals_7d_scm + features.num_support_cases;
    let activity_term = clamp_unit((1.0 + activity_raw as f64).ln() / 3.0);

    let raw = 0.5 * blast_term + 0.3 * activity_term + 0.2 * related_term;
    let score = clamp_unit(raw);

    AxisEval {
        score,
        terms: BTreeMap::from([
            ("blast_term".to_string(), blast_term),
            ("activity_term".to_string(), activity_term),
            ("related_term".to_string(), related_term),
            ("activity_signal_count".to_string(), activity_raw as f64),
            ("raw_score".to_string(), raw),
        ]),
    }
}

/// One semantic pair's weighted-mean similarity and drift
/// (spec.md §4.8 "Semantic features").
#[derive(Clone, Debug)]
pub struct SemanticPairEval {
    pub similarity: f64,
    pub drift: f64,
    pub matches: usize,
}

fn evaluate_pair(samples: &[crate::features::SemanticPairSample]) -> Option<SemanticPairEval> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|s| clamp_unit(s.similarity)).sum();
    let similarity = sum / samples.len() as f64;
    Some(SemanticPairEval {
        similarity,
        drift: clamp_unit(1.0 - similarity),
        matches: samples.len(),
    })
}

/// Semantic axis: weighted mean drift across the three configured pairs
/// (spec.md §4.8 "Semantic features"). Pairs with no retrieved samples are
/// skipped entirely rather than counted as zero similarity.
#[must_use]
pub fn evaluate_semantic(
    pairs: &SemanticPairResult,
    doc_vs_chat_weight: f64,
    doc_vs_scm_weight: f64,
    doc_vs_api_weight: f64,
) -> (AxisEval, BTreeMap<String, SemanticPairEval>) {
    let mut evaluated = BTreeMap::new();
    let mut weight_sum = 0.0;
    let mut weighted_drift = 0.0;

    for (name, weight, samples) in [
        ("doc_vs_chat", doc_vs_chat_weight, &pairs.doc_vs_chat),
        ("doc_vs_scm", doc_vs_scm_weight, &pairs.doc_vs_scm),
        ("doc_vs_api", doc_vs_api_weight, &pairs.doc_vs_api),
    ] {
        let Some(pair_eval) = evaluate_pair(samples) else {
            continue;
        };
        weight_sum += weight;
        weighted_drift += weight * pair_eval.drift;
        evaluated.insert(name.to_string(), pair_eval);
    }

    let score = if weight_sum > 0.0 { weighted_drift / weight_sum } else { 0.0 };
    let eval = AxisEval {
        score: clamp_unit(score),
        terms: BTreeMap::from([("weighted_drift".to_string(), weighted_drift), ("weight_sum".to_string(), weight_sum)]),
    };
    (eval, evaluated)
}
