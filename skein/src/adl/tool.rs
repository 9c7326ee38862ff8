//! `ToolConfig` and `ParameterMapping` (spec §3): a tool binding on an agent
//! and the rules for building its call's parameter map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error policy for a `tool_call` step (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    Stop,
    Continue,
    Retry,
    Fallback,
}

impl Default for OnError {
    fn default() -> Self {
        OnError::Stop
    }
}

/// Where a parameter's value is drawn from (spec §4.1). `Context` is kept as
/// a distinct variant from `Variable` even though it currently resolves
/// identically — see spec §9 Open Question: the alias, not the distinction,
/// is what the source actually implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSource {
    Input,
    Constant,
    Variable,
    PreviousOutput,
    Context,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterMapping {
    pub name: String,
    pub source: ParameterSource,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub input_component: Option<String>,
    #[serde(default)]
    pub transform: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolConfig {
    pub id: String,
    pub tool_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterMapping>,
    #[serde(default)]
    pub output_variable: Option<String>,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub fallback_value: Option<Value>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_retry_count() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    30_000
}
