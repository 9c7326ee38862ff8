//! The fixed transform whitelist applied to a resolved parameter value
//! before it's sent to a tool (spec §4.1), grounded on
//! `original_source/.../tool_manager.py::_apply_transform` — including its
//! "any failure returns the original value unchanged" behavior.

use serde_json::Value;

/// Applies `transform` to `value`. Unknown transforms and any transform
/// that fails to apply (type mismatch, bad argument) return `value`
/// unchanged rather than erroring — the tool call proceeds with whatever
/// it was given.
pub fn apply_transform(value: &Value, transform: &str) -> Value {
    match transform {
        "upper()" => value.as_str().map(|s| Value::from(s.to_uppercase())),
        "lower()" => value.as_str().map(|s| Value::from(s.to_lowercase())),
        "strip()" => value.as_str().map(|s| Value::from(s.trim().to_string())),
        "json.loads()" => value
            .as_str()
            .and_then(|s| serde_json::from_str::<Value>(s).ok()),
        "json.dumps()" => Some(Value::from(value.to_string())),
        "str()" => Some(Value::from(render_as_str(value))),
        "int()" => as_i64(value).map(Value::from),
        "float()" => as_f64(value).map(Value::from),
        "bool()" => Some(Value::from(is_truthy(value))),
        other if other.starts_with("split(") && other.ends_with(')') => {
            let sep = quoted_arg(&other[6..other.len() - 1]);
            value.as_str().map(|s| {
                Value::Array(
                    s.split(sep.as_str())
                        .map(|part| Value::from(part.to_string()))
                        .collect(),
                )
            })
        }
        other if other.starts_with("join(") && other.ends_with(')') => {
            let sep = quoted_arg(&other[5..other.len() - 1]);
            value.as_array().map(|items| {
                let parts: Vec<String> = items.iter().map(render_as_str).collect();
                Value::from(parts.join(&sep))
            })
        }
        _ => None,
    }
    .unwrap_or_else(|| value.clone())
}

fn quoted_arg(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

fn render_as_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
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
