//! Wire-level event types for a streamed workflow execution (spec §6.2
//! `POST /agents/{id}/execute/stream`): `start`, `token`, `step`, `tool`,
//! `complete`, `error`.
//!
//! State-carrying variants use `serde_json::Value` so this crate has no
//! dependency on the executor types that produce them; the runtime
//! serializes its own `Context`/`StepResult` into these shapes.

use serde::Serialize;
use serde_json::Value;

/// One SSE event body (tag + payload). The envelope (execution id, sequence
/// number) is applied separately by [`crate::envelope`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// Execution accepted; carries the resolved agent id/name and session id.
    Start {
        agent_id: String,
        agent_name: String,
        session_id: Option<String>,
    },
    /// One incremental token from an in-progress `llm_call` step.
    Token { step_id: String, content: String },
    /// A step finished (success or failure); carries the full `StepResult` as JSON.
    Step { step_id: String, result: Value },
    /// A tool call finished; carries the tool id and its JSON output or error.
    Tool {
        step_id: String,
        tool_id: String,
        success: bool,
        output: Option<Value>,
        error: Option<String>,
    },
    /// Terminal event: the full execution response as JSON (mirrors the
    /// non-streaming `POST /execute` response body).
    Complete { response: Value },
    /// Terminal event for a run that could not continue (workflow failure,
    /// safety-gate block, or an error local to the bridging layer).
    Error { message: String },
}

impl RuntimeEvent {
    /// Serializes this event to a JSON object (no envelope fields).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_serializes_with_tag() {
        let ev = RuntimeEvent::Start {
            agent_id: "a1".into(),
            agent_name: "Demo".into(),
            session_id: Some("s1".into()),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"], "start");
        assert_eq!(v["agent_id"], "a1");
    }

    #[test]
    fn error_event_carries_message() {
        let ev = RuntimeEvent::Error {
            message: "boom".into(),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["event"], "error");
        assert_eq!(v["message"], "boom");
    }
}
