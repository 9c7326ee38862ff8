//! Condition evaluation for `condition` steps (spec §4.1), grounded on
//! `original_source/.../workflow_executor.py`'s `_compare`/`_evaluate_condition`.

use serde_json::Value;

use crate::adl::{Condition, ConditionOperator};
use crate::template;

/// Evaluates a full `Condition` including its `and_conditions`/
/// `or_conditions` (spec §4.1):
///
/// ```text
/// result = compare(base)
/// result = result AND all(and_conditions)
/// if or_conditions: result = result AND any(or_conditions)
/// ```
pub fn evaluate(condition: &Condition, variables: &Value) -> bool {
    let actual = template::resolve_path(variables, &condition.variable);
    let mut result = compare(actual, condition.operator, condition.value.as_ref());

    for sub in &condition.and_conditions {
        if !evaluate_single(sub, variables) {
            return false;
        }
    }

    if !condition.or_conditions.is_empty() {
        let any_true = condition
            .or_conditions
            .iter()
            .any(|sub| evaluate_single(sub, variables));
        result = result && any_true;
    }

    result
}

fn evaluate_single(condition: &Condition, variables: &Value) -> bool {
    let actual = template::resolve_path(variables, &condition.variable);
    compare(actual, condition.operator, condition.value.as_ref())
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn compare(actual: Option<&Value>, operator: ConditionOperator, expected: Option<&Value>) -> bool {
    match operator {
        ConditionOperator::Eq => actual == expected,
        ConditionOperator::Ne => actual != expected,
        ConditionOperator::Gt | ConditionOperator::Lt | ConditionOperator::Gte | ConditionOperator::Lte => {
            compare_ordered(actual, operator, expected)
        }
        ConditionOperator::Contains => is_truthy(actual) && display(actual).contains(&display(expected)),
        ConditionOperator::NotContains => {
            !is_truthy(actual) || !display(actual).contains(&display(expected))
        }
        ConditionOperator::IsEmpty => !is_truthy(actual),
        ConditionOperator::IsNotEmpty => is_truthy(actual),
        ConditionOperator::Matches => {
            if !is_truthy(actual) {
                return false;
            }
            let Some(pattern) = expected.and_then(Value::as_str) else {
                return false;
            };
            regex::Regex::new(pattern)
                .ok()
                .and_then(|re| re.find(&display(actual)))
                .map(|m| m.start() == 0)
                .unwrap_or(false)
        }
    }
}

fn compare_ordered(actual: Option<&Value>, operator: ConditionOperator, expected: Option<&Value>) -> bool {
    let numeric = actual
        .and_then(Value::as_f64)
        .zip(expected.and_then(Value::as_f64));
    let ordering = if let Some((a, b)) = numeric {
        a.partial_cmp(&b)
    } else {
        display(actual).partial_cmp(&display(expected))
    };
    match (operator, ordering) {
        (ConditionOperator::Gt, Some(std::cmp::Ordering::Greater)) => true,
        (ConditionOperator::Lt, Some(std::cmp::Ordering::Less)) => true,
        (ConditionOperator::Gte, Some(o)) => o != std::cmp::Ordering::Less,
        (ConditionOperator::Lte, Some(o)) => o != std::cmp::Ordering::Greater,
        _ => false,
    }
}
