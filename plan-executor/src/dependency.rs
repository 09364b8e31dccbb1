//! The `$step{N}.{path}` templated-parameter DSL (spec.md §4.7, §9
//! "Templated parameter graph"). Implemented as an explicit scanner rather
//! than a single runtime regex, so path segments (map keys, list indices)
//! are parsed precisely instead of guessed from a capture group.

use std::collections::BTreeSet;

use common::error::AppError;
use serde_json::Value;

use crate::step::PlanStep;

/// One `$step{N}.{path}` occurrence found inside a string parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReference {
    pub step_id: i64,
    pub path: String,
    /// Byte range in the source string, including the surrounding `{}` when
    /// `braced` is true.
    pub span: (usize, usize),
    pub braced: bool,
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '[' || c == ']'
}

/// Parses one reference starting at `pos`, where `bytes[pos..]` begins with
/// `$step`. Returns `(step_id, path, end)` with `end` exclusive of any
/// wrapping brace.
fn parse_token(s: &str, pos: usize) -> Option<(i64, String, usize)> {
    let rest = &s[pos..];
    let rest = rest.strip_prefix("$step")?;
    let digits_len = rest.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let step_id: i64 = rest[..digits_len].parse().ok()?;

    let mut end = pos + "$step".len() + digits_len;
    let mut path = String::new();
    if s[end..].starts_with('.') {
        end += 1;
        let path_len = s[end..].chars().take_while(|&c| is_path_char(c)).count();
        path = s[end..end + path_len].to_string();
        end += path_len;
    }
    Some((step_id, path, end))
}

/// Scans `text` for every `{$stepN.path}` or bare `$stepN.path` occurrence.
#[must_use]
pub fn scan_references(text: &str) -> Vec<StepReference> {
    let mut refs = Vec::new();
    let mut i = 0;
    let bytes = text.as_bytes();
    while i < text.len() {
        if bytes[i] == b'{' && text[i + 1..].starts_with("$step") {
            if let Some((step_id, path, end)) = parse_token(text, i + 1) {
                if text[end..].starts_with('}') {
                    refs.push(StepReference {
                        step_id,
                        path,
                        span: (i, end + 1),
                        braced: true,
                    });
                    i = end + 1;
                    continue;
                }
            }
        }
        if text[i..].starts_with("$step") {
            if let Some((step_id, path, end)) = parse_token(text, i) {
                refs.push(StepReference {
                    step_id,
                    path,
                    span: (i, end),
                    braced: false,
                });
                i = end;
                continue;
            }
        }
        i += text[i..].chars().next().map_or(1, char::len_utf8);
    }
    refs
}

/// True when `text`, trimmed, is exactly one unbraced reference with nothing
/// else around it — the "single reference" case that resolves to the raw
/// referenced value rather than a template string.
#[must_use]
pub fn as_sole_reference(text: &str) -> Option<StepReference> {
    let trimmed = text.trim();
    let refs = scan_references(trimmed);
    if refs.len() == 1 && refs[0].span == (0, trimmed.len()) {
        Some(refs[0].clone())
    } else {
        None
    }
}

fn collect_string_refs(value: &Value, out: &mut BTreeSet<i64>) {
    match value {
        Value::String(s) => {
            for reference in scan_references(s) {
                out.insert(reference.step_id);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_string_refs(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_string_refs(v, out)),
        _ => {}
    }
}

/// The union of `step.dependencies` and every `$stepN` reference discovered
/// by recursively scanning string parameters (spec.md §3 "Plan Step").
#[must_use]
pub fn effective_dependencies(step: &PlanStep) -> BTreeSet<i64> {
    let mut deps: BTreeSet<i64> = step.dependencies.iter().copied().collect();
    for value in step.parameters.values() {
        collect_string_refs(value, &mut deps);
    }
    deps
}

/// Groups steps into execution levels by BFS on the dependency DAG: level 0
/// has no dependencies, level n is `1 + max(level of deps)`. Rejects cyclic
/// plans and duplicate step ids at validation (spec.md §3, §8).
pub fn build_levels(plan: &[PlanStep]) -> Result<Vec<Vec<i64>>, AppError> {
    let mut seen_ids = BTreeSet::new();
    for step in plan {
        if !seen_ids.insert(step.id) {
            return Err(AppError::Validation(format!("duplicate step id {}", step.id)));
        }
    }
    for step in plan {
        for dep in effective_dependencies(step) {
            if !seen_ids.contains(&dep) {
                return Err(AppError::Validation(format!(
                    "step {} depends on unknown step {dep}",
                    step.id
                )));
            }
        }
    }

    let mut remaining: std::collections::HashMap<i64, BTreeSet<i64>> = plan
        .iter()
        .map(|s| (s.id, effective_dependencies(s)))
        .collect();
    let mut levels = Vec::new();
    let mut resolved: BTreeSet<i64> = BTreeSet::new();

    while !remaining.is_empty() {
        let ready: Vec<i64> = remaining
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| resolved.contains(d)))
            .map(|(id, _)| *id)
            .collect();
        if ready.is_empty() {
            return Err(AppError::Validation("cyclic dependency in plan".to_string()));
        }
        let mut level = ready;
        level.sort_unstable();
        for id in &level {
            remaining.remove(id);
            resolved.insert(*id);
        }
        levels.push(level);
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;

    fn step(id: i64, deps: Vec<i64>, params: Map<String, Value>) -> PlanStep {
        PlanStep {
            id,
            action: "noop".to_string(),
            parameters: params,
            dependencies: deps,
        }
    }

    #[test]
    fn scans_a_braced_reference() {
        let refs = scan_references("Found {$step1.count} groups");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].step_id, 1);
        assert_eq!(refs[0].path, "count");
        assert!(refs[0].braced);
    }

    #[test]
    fn scans_multiple_references_in_one_string() {
        let refs = scan_references("Found {$step1.count} groups, wasting {$step1.wasted_mb} MB");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].path, "wasted_mb");
    }

    #[test]
    fn sole_reference_detects_a_whole_string_bare_token() {
        let reference = as_sole_reference("$step2.items").unwrap();
        assert_eq!(reference.step_id, 2);
        assert_eq!(reference.path, "items");
        assert!(!reference.braced);
    }

    #[test]
    fn sole_reference_is_none_when_embedded_in_other_text() {
        assert!(as_sole_reference("prefix $step2.items suffix").is_none());
    }

    #[test]
    fn effective_dependencies_unions_explicit_and_discovered() {
        let mut params = Map::new();
        params.insert("text".to_string(), json!("see {$step3.summary}"));
        let s = step(5, vec![1], params);
        let deps = effective_dependencies(&s);
        assert_eq!(deps, BTreeSet::from([1, 3]));
    }

    #[test]
    fn build_levels_groups_independent_steps_together() {
        let plan = vec![
            step(1, vec![], Map::new()),
            step(2, vec![], Map::new()),
            step(3, vec![1, 2], Map::new()),
        ];
        let levels = build_levels(&plan).unwrap();
        assert_eq!(levels[0], vec![1, 2]);
        assert_eq!(levels[1], vec![3]);
    }

    #[test]
    fn build_levels_rejects_a_cycle() {
        let plan = vec![step(1, vec![2], Map::new()), step(2, vec![1], Map::new())];
        assert!(build_levels(&plan).is_err());
    }

    #[test]
    fn build_levels_rejects_duplicate_ids() {
        let plan = vec![step(1, vec![], Map::new()), step(1, vec![], Map::new())];
        assert!(build_levels(&plan).is_err());
    }
}
