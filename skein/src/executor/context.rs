//! `ExecutionContext` (spec §3): the per-run state a workflow execution
//! accumulates — variables, step history, cumulative usage, status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm_manager::Usage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub step_name: String,
    pub step_type: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

/// Per-execution state (spec §3 "ExecutionContext"). Not persisted; lives
/// only for the duration of one workflow run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub workflow_id: String,
    pub agent_id: String,
    pub variables: Value,
    pub step_results: Vec<StepResult>,
    #[serde(default)]
    pub current_step_id: Option<String>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub usage: Usage,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionContext {
    pub fn new(workflow_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            agent_id: agent_id.into(),
            variables: Value::Object(Default::default()),
            step_results: Vec::new(),
            current_step_id: None,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            usage: Usage::default(),
            error: None,
        }
    }

    pub fn variable(&self, path: &str) -> Option<&Value> {
        crate::template::resolve_path(&self.variables, path)
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.variables {
            map.insert(key.into(), value);
        }
    }

    pub fn add_usage(&mut self, usage: &Usage) {
        self.usage.accumulate(usage);
    }

    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }
}
