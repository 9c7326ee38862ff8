//! Agent Descriptor Language (ADL): the data model of an agent document
//! (spec §3, wire format §6.1). Parsing lives here; cross-reference
//! validation lives in [`crate::loader`], which owns the registry these
//! types are published into.
//!
//! | Type            | Role                                                    |
//! |-----------------|----------------------------------------------------------|
//! | [`Agent`]       | top-level immutable record, one per ADL document         |
//! | [`Workflow`]    | ordered, branchable graph of [`Step`]s for one trigger    |
//! | [`Step`]        | tagged union, one variant per step type                   |
//! | [`ToolConfig`]  | a tool binding on an agent plus its parameter mapping      |
//! | [`ConnectorConfig`] | a named provider/model/defaults binding               |

mod agent;
mod connector;
mod step;
mod tool;
mod workflow;

pub use agent::{
    AgentMetadata, BusinessLogic, Deployment, Identity, PersonalityTrait, Status, ToolsBlock,
};
pub use connector::{ConnectorConfig, ConnectorsBlock};
pub use step::{Condition, ConditionOperand, ConditionOperator, Step, StepCommon};
pub use tool::{OnError, ParameterMapping, ParameterSource, ToolConfig};
pub use workflow::{Trigger, Workflow};

use serde::{Deserialize, Serialize};

/// Top-level ADL document (spec §6.1). Immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub metadata: AgentMetadata,
    pub identity: Identity,
    pub business_logic: BusinessLogic,
    #[serde(default)]
    pub tools: ToolsBlock,
    /// Opaque to the core; passed through verbatim to the API consumer.
    #[serde(default)]
    pub ui: serde_json::Value,
    #[serde(default)]
    pub connectors: Option<ConnectorsBlock>,
    /// Access/auth hints, passed through verbatim.
    #[serde(default)]
    pub security: serde_json::Value,
    #[serde(default)]
    pub workflows: WorkflowsBlock,
    #[serde(default)]
    pub deployment: Deployment,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkflowsBlock {
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub default_workflow: Option<String>,
}

impl Agent {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// Derives a slug from `name` when `identity.slug` is absent (spec §4.4):
    /// lowercase, non-`[a-z0-9-]` runs collapsed to a single `-`, leading/
    /// trailing dashes stripped.
    pub fn slug(&self) -> String {
        if let Some(s) = &self.identity.slug {
            return s.clone();
        }
        derive_slug(&self.identity.name)
    }

    pub fn workflow_by_id(&self, id: &str) -> Option<&Workflow> {
        self.workflows.workflows.iter().find(|w| w.id == id)
    }

    pub fn tool_config_by_id(&self, id: &str) -> Option<&ToolConfig> {
        self.tools.tools.iter().find(|t| t.id == id)
    }

    /// Selects which workflow answers an execute/chat request (spec §6.2
    /// execute body: `workflow_id`, `trigger`). An explicit `workflow_id`
    /// wins; otherwise `workflows.default_workflow`; otherwise the first
    /// workflow whose `trigger` matches.
    pub fn select_workflow(&self, workflow_id: Option<&str>, trigger: Trigger) -> Option<&Workflow> {
        if let Some(id) = workflow_id {
            return self.workflow_by_id(id);
        }
        if let Some(default_id) = &self.workflows.default_workflow {
            if let Some(w) = self.workflow_by_id(default_id) {
                return Some(w);
            }
        }
        self.workflows.workflows.iter().find(|w| w.trigger == trigger)
    }
}

pub fn derive_slug(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_dash = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_collapses_and_trims() {
        assert_eq!(derive_slug("  Hello, World!! "), "hello-world");
        assert_eq!(derive_slug("Already-Slug"), "already-slug");
        assert_eq!(derive_slug("___"), "");
    }

    fn workflow(id: &str, trigger: Trigger) -> Workflow {
        Workflow {
            id: id.to_string(),
            name: id.to_string(),
            trigger,
            trigger_config: Default::default(),
            steps: vec![],
            entry_step: None,
            initial_variables: Default::default(),
            timeout_ms: None,
        }
    }

    fn agent_with_workflows(workflows: Vec<Workflow>, default_workflow: Option<&str>) -> Agent {
        Agent {
            metadata: AgentMetadata::default(),
            identity: Identity {
                id: "a1".into(),
                name: "Agent".into(),
                slug: None,
                description: String::new(),
                long_description: None,
                icon: None,
                category: None,
                status: Status::Active,
            },
            business_logic: BusinessLogic {
                system_prompt: "You are helpful.".into(),
                user_prompt_template: None,
                personality_traits: vec![],
                tone: None,
                language: None,
                llm_provider: "mistral".into(),
                llm_model: None,
                temperature: 0.7,
                max_tokens: 1024,
                top_p: None,
                top_k: None,
                context_window_messages: 10,
                include_system_context: false,
                response_format: None,
                include_sources: false,
                include_confidence: false,
                streaming_enabled: false,
                moderation: false,
                classification: false,
                task_prompts: Default::default(),
                instructions: vec![],
                constraints: vec![],
            },
            tools: ToolsBlock::default(),
            ui: serde_json::Value::Null,
            connectors: None,
            security: serde_json::Value::Null,
            workflows: WorkflowsBlock {
                workflows,
                default_workflow: default_workflow.map(str::to_string),
            },
            deployment: Deployment::default(),
        }
    }

    #[test]
    fn select_workflow_prefers_explicit_id_over_default() {
        let agent = agent_with_workflows(
            vec![workflow("w1", Trigger::UserMessage), workflow("w2", Trigger::Webhook)],
            Some("w1"),
        );
        let selected = agent.select_workflow(Some("w2"), Trigger::UserMessage).unwrap();
        assert_eq!(selected.id, "w2");
    }

    #[test]
    fn select_workflow_falls_back_to_default_then_trigger_match() {
        let agent = agent_with_workflows(
            vec![workflow("w1", Trigger::UserMessage), workflow("w2", Trigger::Webhook)],
            None,
        );
        let selected = agent.select_workflow(None, Trigger::Webhook).unwrap();
        assert_eq!(selected.id, "w2");
    }
}
