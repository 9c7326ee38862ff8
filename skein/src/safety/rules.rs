//! Moderation rule assembly (spec §4.6: "global rules, agent-scoped rules,
//! and user-scoped rules whose individual and parent `enabled` flags are
//! true").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModerationRule {
    pub instruction: String,
    pub enabled: bool,
}

/// One `{enabled, rules}` scope as it appears in the persisted document
/// (spec §6.5: `{global_config, agent_configs, user_configs}`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ScopeDoc {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    rules: Vec<ModerationRule>,
}

/// Shape of `MODERATION_SETTINGS_PATH`'s JSON document (spec §6.5).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ModerationSettingsDoc {
    #[serde(default)]
    global_config: ScopeDoc,
    #[serde(default)]
    agent_configs: HashMap<String, ScopeDoc>,
    #[serde(default)]
    user_configs: HashMap<String, ScopeDoc>,
}

/// A global list plus per-agent and per-user overlays, each independently
/// toggleable via its own `enabled` flag.
#[derive(Clone, Debug, Default)]
pub struct ModerationRuleSet {
    pub global: Vec<ModerationRule>,
    pub global_enabled: bool,
    pub per_agent: HashMap<String, (bool, Vec<ModerationRule>)>,
    pub per_user: HashMap<String, (bool, Vec<ModerationRule>)>,
}

impl ModerationRuleSet {
    /// Concatenates global, agent-scoped, and user-scoped rules whose
    /// individual rule and enclosing scope are both enabled.
    pub fn applicable_rules(&self, agent_id: &str, user_id: Option<&str>) -> Vec<ModerationRule> {
        let mut rules = Vec::new();

        if self.global_enabled {
            rules.extend(self.global.iter().filter(|r| r.enabled).cloned());
        }

        if let Some((scope_enabled, agent_rules)) = self.per_agent.get(agent_id) {
            if *scope_enabled {
                rules.extend(agent_rules.iter().filter(|r| r.enabled).cloned());
            }
        }

        if let Some(user_id) = user_id {
            if let Some((scope_enabled, user_rules)) = self.per_user.get(user_id) {
                if *scope_enabled {
                    rules.extend(user_rules.iter().filter(|r| r.enabled).cloned());
                }
            }
        }

        rules
    }

    /// Reads the moderation rule set from the JSON document at `path` (spec
    /// §6.5). A missing file is not an error — it yields an empty, fully
    /// disabled rule set, matching the Safety Gate's fail-open posture when
    /// no peer/config is configured at all.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        let doc: ModerationSettingsDoc = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self {
            global: doc.global_config.rules,
            global_enabled: doc.global_config.enabled,
            per_agent: doc
                .agent_configs
                .into_iter()
                .map(|(id, scope)| (id, (scope.enabled, scope.rules)))
                .collect(),
            per_user: doc
                .user_configs
                .into_iter()
                .map(|(id, scope)| (id, (scope.enabled, scope.rules)))
                .collect(),
        })
    }
}
