//! Wire response bodies for the executor-facing HTTP surface (spec §6.2).

use serde::Serialize;
use serde_json::Value;

/// Body of every `POST /agents/{id}/execute*` and `/chat` response. A failed
/// or blocked execution is still HTTP 200 (spec §7 "User-visible behaviour")
/// — callers distinguish success via the `success` field.
#[derive(Clone, Debug, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub agent_id: String,
    pub agent_name: String,
    pub execution_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub outputs: Value,
    pub files: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_executed: Option<String>,
    pub steps_executed: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    pub warnings: Vec<String>,
}

/// Uniform error body for routes that fail before an execution is attempted
/// (agent not found, malformed request body, …).
#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into() }
    }
}
