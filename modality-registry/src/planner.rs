use common::config::SearchConfig;

/// Structured hints extracted from a query (hashtag-resolved targets, an
/// intent classification, extracted keywords) that further narrow the
/// planner's output (spec.md §4.5).
#[derive(Clone, Debug, Default)]
pub struct PlanHint {
    pub target_types: Vec<String>,
    pub intent: Option<String>,
    pub keywords: Vec<String>,
}

fn enabled_primary_modalities(config: &SearchConfig) -> Vec<String> {
    config
        .modalities
        .iter()
        .filter(|(_, m)| m.enabled && !m.fallback_only)
        .map(|(id, _)| id.clone())
        .collect()
}

fn enabled_fallback_modalities(config: &SearchConfig) -> Vec<String> {
    config
        .modalities
        .iter()
        .filter(|(_, m)| m.enabled && m.fallback_only)
        .map(|(id, _)| id.clone())
        .collect()
}

fn dedup_push(ids: &mut Vec<String>, candidate: &str, enabled_primary: &[String]) {
    if enabled_primary.iter().any(|id| id == candidate) && !ids.iter().any(|id| id == candidate) {
        ids.push(candidate.to_string());
    }
}

/// Applies the hint's target-type and intent rules on top of `ids`, adding
/// modalities that the base rule evaluation did not already select.
fn apply_hints(ids: &mut Vec<String>, hint: &PlanHint, enabled_primary: &[String]) {
    for target in &hint.target_types {
        match target.as_str() {
            "slack_channel" | "incident" => dedup_push(ids, "chat", enabled_primary),
            "component" | "service" | "repository" => dedup_push(ids, "scm", enabled_primary),
            "doc" | "doc_issue" => dedup_push(ids, "docs", enabled_primary),
            _ => {}
        }
        if target == "incident" {
            dedup_push(ids, "scm", enabled_primary);
        }
    }
    if matches!(hint.intent.as_deref(), Some("COMPARE" | "INVESTIGATE")) {
        dedup_push(ids, "chat", enabled_primary);
        dedup_push(ids, "scm", enabled_primary);
    }
}

/// Maps a query to an ordered list of modality IDs (spec.md §4.5).
///
/// `include_fallback=true` short-circuits to every enabled `fallback_only`
/// modality. Otherwise planner rules are evaluated in declaration order; the
/// first rule whose keywords case-insensitively substring-match the query
/// wins and its `include` list is intersected with the enabled primary
/// modalities. No match falls back to every enabled primary modality.
#[must_use]
pub fn plan(query: &str, config: &SearchConfig, include_fallback: bool, hint: Option<&PlanHint>) -> Vec<String> {
    if include_fallback {
        return enabled_fallback_modalities(config);
    }

    let enabled_primary = enabled_primary_modalities(config);
    let lowered = query.to_lowercase();

    let mut selected = if !config.planner.enabled {
        enabled_primary.clone()
    } else {
        config
            .planner
            .rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(&kw.to_lowercase())))
            .map(|rule| {
                enabled_primary
                    .iter()
                    .filter(|id| rule.include.contains(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_else(|| enabled_primary.clone())
    };

    if let Some(hint) = hint {
        apply_hints(&mut selected, hint, &enabled_primary);
    }
    selected
}

#[cfg(test)]
mod tests {
    use common::config::{ModalityConfig, PlannerRuleConfig};

    use super::*;

    fn config_with(modalities: &[(&str, bool, bool)], rules: Vec<PlannerRuleConfig>) -> SearchConfig {
        let mut config = SearchConfig::default();
        for (id, enabled, fallback_only) in modalities {
            config.modalities.insert(
                (*id).to_string(),
                ModalityConfig {
                    enabled: *enabled,
                    fallback_only: *fallback_only,
                    ..ModalityConfig::default()
                },
            );
        }
        config.planner.rules = rules;
        config
    }

    #[test]
    fn include_fallback_returns_only_fallback_only_modalities() {
        let config = config_with(&[("chat", true, false), ("web", true, true)], vec![]);
        let result = plan("anything", &config, true, None);
        assert_eq!(result, vec!["web".to_string()]);
    }

    #[test]
    fn matching_rule_intersects_include_with_enabled_primaries() {
        let rule = PlannerRuleConfig {
            name: "incident".to_string(),
            keywords: vec!["outage".to_string()],
            include: vec!["chat".to_string(), "scm".to_string()],
        };
        let config = config_with(&[("chat", true, false), ("scm", true, false), ("docs", true, false)], vec![rule]);
        let result = plan("there was an OUTAGE last night", &config, false, None);
        // `modalities` is a BTreeMap, so enabled primaries are iterated in
        // sorted-key order: "chat" before "scm".
        assert_eq!(result, vec!["chat".to_string(), "scm".to_string()]);
    }

    #[test]
    fn no_matching_rule_returns_all_enabled_primaries() {
        let rule = PlannerRuleConfig {
            name: "incident".to_string(),
            keywords: vec!["outage".to_string()],
            include: vec!["chat".to_string()],
        };
        let config = config_with(&[("chat", true, false), ("scm", true, false)], vec![rule]);
        let result = plan("what changed recently", &config, false, None);
        assert_eq!(result, vec!["chat".to_string(), "scm".to_string()]);
    }

    #[test]
    fn intent_investigate_ensures_chat_and_scm() {
        let config = config_with(&[("chat", true, false), ("scm", true, false), ("docs", true, false)], vec![]);
        let hint = PlanHint {
            intent: Some("INVESTIGATE".to_string()),
            ..PlanHint::default()
        };
        let result = plan("investigate the login bug", &config, false, Some(&hint));
        assert!(result.contains(&"chat".to_string()));
        assert!(result.contains(&"scm".to_string()));
    }

    #[test]
    fn plan_is_deterministic_across_repeated_calls() {
        let rule = PlannerRuleConfig {
            name: "code".to_string(),
            keywords: vec!["stack trace".to_string()],
            include: vec!["scm".to_string(), "files".to_string()],
        };
        let config = config_with(&[("scm", true, false), ("files", true, false), ("chat", true, false)], vec![rule]);
        let first = plan("stack trace in auth.py failing", &config, false, None);
        for _ in 0..20 {
            assert_eq!(plan("stack trace in auth.py failing", &config, false, None), first);
        }
    }
}
