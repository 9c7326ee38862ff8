//! Identity, business-logic, tools, and deployment blocks of an ADL document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ToolConfig;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentMetadata {
    #[serde(default = "default_adl_version")]
    pub adl_version: String,
    #[serde(default)]
    pub schema_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub changelog: Vec<String>,
}

fn default_adl_version() -> String {
    "1.0.0".to_string()
}

/// Lifecycle state of an agent record (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Active,
    Beta,
    Disabled,
    Archived,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub status: Status,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersonalityTrait {
    pub name: String,
    pub intensity: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BusinessLogic {
    pub system_prompt: String,
    #[serde(default)]
    pub user_prompt_template: Option<String>,
    #[serde(default)]
    pub personality_traits: Vec<PersonalityTrait>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    pub llm_provider: String,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default = "default_context_window")]
    pub context_window_messages: u32,
    #[serde(default)]
    pub include_system_context: bool,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default)]
    pub include_sources: bool,
    #[serde(default)]
    pub include_confidence: bool,
    #[serde(default)]
    pub streaming_enabled: bool,
    #[serde(default)]
    pub moderation: bool,
    #[serde(default)]
    pub classification: bool,
    #[serde(default)]
    pub task_prompts: HashMap<String, String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_context_window() -> u32 {
    10
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsBlock {
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub default_error_handling: Option<String>,
    #[serde(default)]
    pub parallel_execution: bool,
    #[serde(default = "default_max_parallel_tools")]
    pub max_parallel_tools: u32,
}

fn default_max_parallel_tools() -> u32 {
    5
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub auto_route: bool,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub min_instances: u32,
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    #[serde(default)]
    pub feature_flags: HashMap<String, bool>,
    #[serde(default)]
    pub health_check_path: Option<String>,
    #[serde(default)]
    pub health_check_interval_seconds: Option<u32>,
}

fn default_max_instances() -> u32 {
    1
}
