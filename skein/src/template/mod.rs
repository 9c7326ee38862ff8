//! `{{ path }}` / `{{#if path}}…{{/if}}` template rendering (spec §4.1).
//!
//! No expression language: a path is a dotted walk into a JSON variable map,
//! list indices are integer segments, and a missing path expands to the
//! empty string. This mirrors `workflow_executor.py`'s `_get_variable_value`
//! dotted/indexed walk, generalized from Python attribute/index access to a
//! `serde_json::Value` walk.

use serde_json::Value;

/// Resolves a dotted/indexed path (`a.b.0.c`) against a JSON value. Returns
/// `None` if any segment is missing or type-mismatched.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let idx: usize = segment.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Renders a JSON value for substitution into template text: scalars render
/// as their plain display form (no quotes around strings), non-scalars
/// (objects/arrays) render as compact JSON (spec §4.1).
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Renders `template` against `variables`. Substitutes `{{ path }}`
/// placeholders and evaluates single-level `{{#if path}}…{{/if}}` blocks.
/// Unbalanced `#if`/`/if` markers are left verbatim (spec §4.1).
pub fn render(template: &str, variables: &Value) -> String {
    let after_conditionals = render_conditionals(template, variables);
    render_placeholders(&after_conditionals, variables)
}

fn render_placeholders(template: &str, variables: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let Some(start) = rest.find("{{") else {
            out.push_str(rest);
            break;
        };
        let Some(end_rel) = rest[start + 2..].find("}}") else {
            out.push_str(rest);
            break;
        };
        let end = start + 2 + end_rel;
        out.push_str(&rest[..start]);
        let path = rest[start + 2..end].trim();
        if path.starts_with('#') || path.starts_with('/') {
            // Leftover conditional marker (unbalanced); pass through verbatim.
            out.push_str(&rest[start..end + 2]);
        } else {
            let rendered = resolve_path(variables, path)
                .map(render_value)
                .unwrap_or_default();
            out.push_str(&rendered);
        }
        rest = &rest[end + 2..];
    }
    out
}

/// Evaluates `{{#if path}}…{{/if}}` blocks against the *first* `{{/if}}`
/// that follows each `{{#if}}` header — single-level only, matching
/// `workflow_executor.py`'s non-greedy `\{\{#if\s+([^}]+)\}\}(.*?)\{\{/if\}\}`
/// regex (spec.md §9 supplement: nesting is not supported in the original,
/// so it is not invented here). A nested `{{#if}}` inside a body is treated
/// as plain text of that body; its own `{{/if}}` is what closes the
/// *outer* block, leaving any further `{{/if}}` in the remaining template
/// to look for its own preceding `{{#if}}`, exactly as the one-pass regex
/// substitution does. An `#if` with no following `/if` is left verbatim.
fn render_conditionals(template: &str, variables: &Value) -> String {
    let mut out = String::new();
    let mut rest = template;
    loop {
        let Some(if_start) = rest.find("{{#if ") else {
            out.push_str(rest);
            return out;
        };
        let Some(header_end_rel) = rest[if_start..].find("}}") else {
            out.push_str(rest);
            return out;
        };
        let header_end = if_start + header_end_rel + 2;
        let path = rest[if_start + 6..header_end - 2].trim();

        match rest[header_end..].find("{{/if}}") {
            Some(body_rel) => {
                let body = &rest[header_end..header_end + body_rel];
                out.push_str(&rest[..if_start]);
                if is_truthy(resolve_path(variables, path).unwrap_or(&Value::Null)) {
                    out.push_str(body);
                }
                rest = &rest[header_end + body_rel + 7..];
            }
            None => {
                // No following /if; leave this #if and everything after verbatim.
                out.push_str(&rest[..header_end]);
                rest = &rest[header_end..];
            }
        }
    }
}
