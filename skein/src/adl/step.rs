//! `Step`: the tagged union over step types (spec §3, §9 "the tagged-union
//! `Step` maps to a sum type with one variant per step type ... rejected in
//! favour of exhaustive pattern matching").

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OnError;

/// Fields shared by every step variant (spec §3: "Every step has `id`,
/// `name`, `type`, optional `next_step`, optional `output_variable`,
/// `on_error`").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepCommon {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub next_step: Option<String>,
    #[serde(default)]
    pub output_variable: Option<String>,
    #[serde(default)]
    pub on_error: OnError,
}

/// Comparison operator for a `condition` step (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
    Matches,
}

/// Right-hand side of a comparison, kept as raw JSON since a condition's
/// `variable` may resolve to any JSON type.
pub type ConditionOperand = Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Option<ConditionOperand>,
    #[serde(default)]
    pub and_conditions: Vec<Condition>,
    #[serde(default)]
    pub or_conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    LlmCall {
        #[serde(flatten)]
        common: StepCommon,
        prompt_template: String,
        #[serde(default)]
        system_prompt_override: Option<String>,
        #[serde(default)]
        connector_id: Option<String>,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
    ToolCall {
        #[serde(flatten)]
        common: StepCommon,
        tool_config_id: String,
    },
    Condition {
        #[serde(flatten)]
        common: StepCommon,
        condition: Condition,
        #[serde(default)]
        on_true: Option<String>,
        #[serde(default)]
        on_false: Option<String>,
    },
    Loop {
        #[serde(flatten)]
        common: StepCommon,
        loop_variable: String,
        loop_item_name: String,
        loop_index_name: String,
        #[serde(default)]
        loop_body: Vec<Step>,
        max_iterations: usize,
    },
    Parallel {
        #[serde(flatten)]
        common: StepCommon,
        #[serde(default)]
        parallel_steps: Vec<Step>,
        #[serde(default)]
        wait_for_all: bool,
    },
    UserInput {
        #[serde(flatten)]
        common: StepCommon,
        #[serde(default)]
        input_components: Vec<String>,
        #[serde(default)]
        input_timeout_ms: Option<u64>,
    },
    DataTransform {
        #[serde(flatten)]
        common: StepCommon,
        transform_expression: String,
    },
    SetVariable {
        #[serde(flatten)]
        common: StepCommon,
        variable_name: String,
        variable_value: Value,
    },
    /// Reserved; always evaluates to `true` (spec §9, §4.1).
    Validation {
        #[serde(flatten)]
        common: StepCommon,
    },
    /// Reserved; may be stubbed (spec §3).
    HttpRequest {
        #[serde(flatten)]
        common: StepCommon,
    },
}

impl Step {
    pub fn common(&self) -> &StepCommon {
        match self {
            Step::LlmCall { common, .. }
            | Step::ToolCall { common, .. }
            | Step::Condition { common, .. }
            | Step::Loop { common, .. }
            | Step::Parallel { common, .. }
            | Step::UserInput { common, .. }
            | Step::DataTransform { common, .. }
            | Step::SetVariable { common, .. }
            | Step::Validation { common, .. }
            | Step::HttpRequest { common, .. } => common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    /// Every step id this step may hand control to directly (`next_step`,
    /// plus `on_true`/`on_false` for `condition`). Used by load-time
    /// reference validation (spec §3 invariants, §4.4).
    pub fn outgoing_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .common()
            .next_step
            .as_deref()
            .into_iter()
            .collect();
        if let Step::Condition {
            on_true, on_false, ..
        } = self
        {
            refs.extend(on_true.as_deref());
            refs.extend(on_false.as_deref());
        }
        refs
    }
}
