//! Named provider/model bindings a `llm_call` step can opt into via
//! `connector_id` (spec §4.1 "Per-step LLM overrides via connector").

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub id: String,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectorsBlock {
    #[serde(default)]
    pub default_connector: Option<String>,
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
    #[serde(default)]
    pub enable_fallback: bool,
    #[serde(default)]
    pub fallback_order: Vec<String>,
}

impl ConnectorsBlock {
    pub fn by_id(&self, id: &str) -> Option<&ConnectorConfig> {
        self.connectors.iter().find(|c| c.id == id)
    }
}
