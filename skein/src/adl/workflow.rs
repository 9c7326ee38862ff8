//! `Workflow` (spec §3): an ordered, branchable graph of [`super::Step`]s
//! attached to one `trigger`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::Step;

/// What kind of request can start this workflow (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    UserMessage,
    FormSubmit,
    FileUpload,
    ButtonClick,
    Schedule,
    Webhook,
    OnLoad,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub trigger_config: HashMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub entry_step: Option<String>,
    #[serde(default)]
    pub initial_variables: HashMap<String, Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Workflow {
    /// Resolves a `next_step`/`on_true`/`on_false`/`entry_step` reference
    /// against this workflow's top-level steps, matching on `id` first and
    /// falling back to `name` — mirroring
    /// `original_source/.../workflow_executor.py::_find_step`, which looks
    /// up `step.get("id") == step_id or step.get("name") == step_id`.
    pub fn step_by_id(&self, id: &str) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.common().id == id)
            .or_else(|| self.steps.iter().find(|s| s.common().name == id))
    }

    /// The step to start the graph walk at (spec §4.1: `entry_step` if set,
    /// else the first step).
    pub fn entry(&self) -> Option<&Step> {
        match &self.entry_step {
            Some(id) => self.step_by_id(id),
            None => self.steps.first(),
        }
    }
}
