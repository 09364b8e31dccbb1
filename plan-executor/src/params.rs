//! Resolves `$step{N}.{path}` references against completed step results
//! (spec.md §4.7 "Parameter resolution").

use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    dependency::{as_sole_reference, scan_references, StepReference},
    step::StepResults,
};

/// Looks up `reference.path` inside the output of `reference.step_id`,
/// walking dotted segments that may index a map by key or a list by
/// integer index (optionally bracketed, e.g. `files[0].name`).
fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = apply_segment(current, segment)?;
    }
    Some(current)
}

fn apply_segment<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    let bracket_pos = segment.find('[');
    let (head, mut rest) = match bracket_pos {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    let mut value = current;
    if !head.is_empty() {
        value = if let Ok(index) = head.parse::<usize>() {
            value.as_array()?.get(index)?
        } else {
            value.as_object()?.get(head)?
        };
    }

    while let Some(end) = rest.find(']') {
        if !rest.starts_with('[') {
            return None;
        }
        let index: usize = rest[1..end].parse().ok()?;
        value = value.as_array()?.get(index)?;
        rest = &rest[end + 1..];
    }
    Some(value)
}

fn lookup(reference: &StepReference, step_results: &StepResults) -> Option<Value> {
    let result = step_results.get(&reference.step_id)?;
    let output = result.output.as_ref()?;
    resolve_path(output, &reference.path).cloned()
}

/// Renders a resolved value as it would appear inlined into a template
/// string: strings pass through verbatim, scalars use their JSON literal,
/// and structured values fall back to compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        _ => value.to_string(),
    }
}

/// Template-resolves every `{$stepN.path}`/`$stepN.path` occurrence in
/// `text` into a string. A missing reference is preserved as its literal
/// source text (never silently dropped) and logged.
fn resolve_template(text: &str, step_results: &StepResults) -> String {
    let refs = scan_references(text);
    if refs.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for reference in refs {
        out.push_str(&text[cursor..reference.span.0]);
        match lookup(&reference, step_results) {
            Some(value) => out.push_str(&stringify(&value)),
            None => {
                warn!(
                    step_id = reference.step_id,
                    path = %reference.path,
                    "unresolved step reference, preserving literal placeholder"
                );
                out.push_str(&text[reference.span.0..reference.span.1]);
            }
        }
        cursor = reference.span.1;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Resolves one string parameter: a lone `$stepN.path` reference (the whole
/// trimmed string) returns the raw referenced value preserving its type;
/// anything else containing references is template-resolved to a string;
/// a string with no references is returned unchanged (this makes resolution
/// idempotent — resolving an already-resolved parameter is a no-op).
fn resolve_string(text: &str, step_results: &StepResults) -> Value {
    if let Some(reference) = as_sole_reference(text) {
        if let Some(value) = lookup(&reference, step_results) {
            return value;
        }
        warn!(
            step_id = reference.step_id,
            path = %reference.path,
            "unresolved sole step reference, preserving literal placeholder"
        );
        return Value::String(text.to_string());
    }
    Value::String(resolve_template(text, step_results))
}

/// Recursively resolves every string parameter in `value` against
/// `step_results`, preserving the shape of maps and arrays.
#[must_use]
pub fn resolve_parameters(value: &Value, step_results: &StepResults) -> Value {
    match value {
        Value::String(s) => resolve_string(s, step_results),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_parameters(v, step_results)).collect()),
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, v) in map {
                resolved.insert(key.clone(), resolve_parameters(v, step_results));
            }
            Value::Object(resolved)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::step::StepResult;

    fn results_with(id: i64, output: Value) -> StepResults {
        let mut map = StepResults::new();
        map.insert(id, StepResult::success(output));
        map
    }

    #[test]
    fn sole_reference_preserves_raw_type() {
        let results = results_with(1, json!({ "count": 2 }));
        let resolved = resolve_parameters(&json!("$step1.count"), &results);
        assert_eq!(resolved, json!(2));
    }

    #[test]
    fn template_resolves_multiple_tokens_with_no_orphan_braces() {
        let results = results_with(1, json!({ "count": 2, "wasted_mb": 0.38 }));
        let resolved = resolve_parameters(
            &json!("Found {$step1.count} groups, wasting {$step1.wasted_mb} MB"),
            &results,
        );
        assert_eq!(resolved, json!("Found 2 groups, wasting 0.38 MB"));
    }

    #[test]
    fn missing_reference_is_preserved_as_a_literal_placeholder() {
        let results = StepResults::new();
        let resolved = resolve_parameters(&json!("see {$step9.summary}"), &results);
        assert_eq!(resolved, json!("see {$step9.summary}"));
    }

    #[test]
    fn resolution_is_idempotent_on_plain_text() {
        let results = StepResults::new();
        let text = json!("no references here");
        let once = resolve_parameters(&text, &results);
        let twice = resolve_parameters(&once, &results);
        assert_eq!(once, twice);
    }

    #[test]
    fn indexes_into_list_path_segments() {
        let results = results_with(1, json!({ "files": ["a.rs", "b.rs"] }));
        let resolved = resolve_parameters(&json!("$step1.files[1]"), &results);
        assert_eq!(resolved, json!("b.rs"));
    }

    #[test]
    fn nested_objects_and_arrays_are_resolved_in_place() {
        let results = results_with(1, json!({ "count": 5 }));
        let input = json!({ "nested": { "note": "total {$step1.count}" }, "list": ["$step1.count"] });
        let resolved = resolve_parameters(&input, &results);
        assert_eq!(resolved["nested"]["note"], json!("total 5"));
        assert_eq!(resolved["list"][0], json!(5));
    }
}
