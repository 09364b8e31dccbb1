use modality_handlers::HandlerResult;

/// The response cap every fused result set is truncated to (spec.md §4.6).
pub const RESPONSE_CAP: usize = 10;

/// Concatenates, sorts by score descending, and truncates to
/// [`RESPONSE_CAP`]. Ties keep their relative fanout order (stable sort).
#[must_use]
pub fn fuse(mut results: Vec<HandlerResult>) -> Vec<HandlerResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(RESPONSE_CAP);
    results
}

/// Deduped, in-order union of modality IDs actually executed across the
/// primary and (if any) fallback fanout rounds.
#[must_use]
pub fn modalities_used(rounds: &[&[String]]) -> Vec<String> {
    let mut seen = Vec::new();
    for round in rounds {
        for id in *round {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn result(score: f64) -> HandlerResult {
        HandlerResult {
            modality: "chat".to_string(),
            source_type: "chat".to_string(),
            chunk_id: None,
            entity_id: None,
            title: None,
            text: String::new(),
            score,
            raw_score: score,
            url: None,
            metadata: json!({}),
        }
    }

    #[test]
    fn fuse_sorts_descending_and_truncates_to_the_response_cap() {
        let results: Vec<HandlerResult> = (0..15).map(|i| result(i as f64)).collect();
        let fused = fuse(results);
        assert_eq!(fused.len(), RESPONSE_CAP);
        assert_eq!(fused[0].score, 14.0);
        assert!(fused.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn modalities_used_dedupes_across_rounds_preserving_first_seen_order() {
        let primary = vec!["chat".to_string(), "scm".to_string()];
        let fallback = vec!["scm".to_string(), "web".to_string()];
        let used = modalities_used(&[&primary, &fallback]);
        assert_eq!(used, vec!["chat".to_string(), "scm".to_string(), "web".to_string()]);
    }
}
