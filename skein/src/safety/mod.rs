//! Safety Gate (spec §4.6): two-stage content check applied to a user
//! message before any LLM or tool work begins.
//!
//! The teacher's `original_source` stubs (`routers/moderation_settings.py`,
//! `nemo_guardrails_settings.py`) carry no real check logic, so this module
//! is grounded directly on spec §4.6/§7's contract, following the Tool
//! Manager's fail-open-and-log idiom for peer-unreachable handling.

mod rules;

pub use rules::{ModerationRule, ModerationRuleSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Result of passing a message through the gate.
#[derive(Clone, Debug)]
pub enum GateOutcome {
    Approved,
    Blocked { reason: String },
}

impl GateOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateOutcome::Approved)
    }
}

#[derive(Clone, Debug, Serialize)]
struct ModerationRequest<'a> {
    content: &'a str,
    rules: &'a [ModerationRule],
    agent_id: &'a str,
    user_id: Option<&'a str>,
}

#[derive(Clone, Debug, Deserialize)]
struct ModerationResponse {
    approved: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    matched_rules: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct GuardrailsRequest<'a> {
    content: &'a str,
    guardrail_type: &'a str,
    config: &'a Value,
    context: Value,
}

#[derive(Clone, Debug, Deserialize)]
struct GuardrailsResponse {
    approved: bool,
    #[serde(default)]
    blocked_reason: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    checks: Value,
    #[serde(default)]
    #[allow(dead_code)]
    risk_score: Option<f64>,
}

/// Per-agent guardrails configuration (spec §3 "Guardrails config").
#[derive(Clone, Debug, Default)]
pub struct GuardrailsConfig {
    pub enabled: bool,
    pub config: Value,
}

impl GuardrailsConfig {
    /// Reads the guardrails document at `path` (spec §6.5, mirroring §4.6's
    /// typed toggles/thresholds). The whole document is kept as `config` and
    /// forwarded verbatim to the guardrails peer; only `enabled` is read out
    /// by the gate itself. A missing file yields a disabled config, matching
    /// the Safety Gate's fail-open posture when unconfigured.
    pub fn load_from_file(path: &std::path::Path) -> std::io::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        let config: Value = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let enabled = config.get("enabled").and_then(Value::as_bool).unwrap_or(false);
        Ok(Self { enabled, config })
    }
}

/// Delegates moderation and guardrails checks to HTTP peers (spec §4.6).
#[derive(Clone)]
pub struct SafetyGate {
    client: reqwest::Client,
    moderation_url: Option<String>,
    guardrails_url: Option<String>,
}

impl SafetyGate {
    pub fn new(
        client: reqwest::Client,
        moderation_url: Option<String>,
        guardrails_url: Option<String>,
    ) -> Self {
        Self {
            client,
            moderation_url,
            guardrails_url,
        }
    }

    /// Runs both stages for `content` in the context of `(agent_id, user_id)`
    /// against `rules` and, if enabled, `guardrails`.
    pub async fn check(
        &self,
        content: &str,
        agent_id: &str,
        user_id: Option<&str>,
        rules: &ModerationRuleSet,
        guardrails: &GuardrailsConfig,
    ) -> GateOutcome {
        let applicable = rules.applicable_rules(agent_id, user_id);
        match self.check_moderation(content, agent_id, user_id, &applicable).await {
            GateOutcome::Blocked { reason } => return GateOutcome::Blocked { reason },
            GateOutcome::Approved => {}
        }

        if guardrails.enabled {
            return self.check_guardrails(content, &guardrails.config).await;
        }

        GateOutcome::Approved
    }

    async fn check_moderation(
        &self,
        content: &str,
        agent_id: &str,
        user_id: Option<&str>,
        rules: &[ModerationRule],
    ) -> GateOutcome {
        let Some(url) = &self.moderation_url else {
            return GateOutcome::Approved;
        };

        let body = ModerationRequest {
            content,
            rules,
            agent_id,
            user_id,
        };

        match self.client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<ModerationResponse>().await {
                    Ok(result) if !result.approved => GateOutcome::Blocked {
                        reason: result.reason.unwrap_or_else(|| "blocked by moderation".to_string()),
                    },
                    Ok(_) => GateOutcome::Approved,
                    Err(e) => {
                        warn!(error = %e, "moderation peer returned unparsable response, failing open");
                        GateOutcome::Approved
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "moderation peer returned error status, failing open");
                GateOutcome::Approved
            }
            Err(e) => {
                warn!(error = %e, "moderation peer unreachable, failing open");
                GateOutcome::Approved
            }
        }
    }

    async fn check_guardrails(&self, content: &str, config: &Value) -> GateOutcome {
        let Some(url) = &self.guardrails_url else {
            return GateOutcome::Approved;
        };

        let body = GuardrailsRequest {
            content,
            guardrail_type: "all",
            config,
            context: Value::Null,
        };

        match self.client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<GuardrailsResponse>().await {
                    Ok(result) if !result.approved => GateOutcome::Blocked {
                        reason: result
                            .blocked_reason
                            .unwrap_or_else(|| "blocked by guardrails".to_string()),
                    },
                    Ok(_) => GateOutcome::Approved,
                    Err(e) => {
                        warn!(error = %e, "guardrails peer returned unparsable response, failing open");
                        GateOutcome::Approved
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "guardrails peer returned error status, failing open");
                GateOutcome::Approved
            }
            Err(e) => {
                warn!(error = %e, "guardrails peer unreachable, failing open");
                GateOutcome::Approved
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn approves_when_no_moderation_peer_configured() {
        let gate = SafetyGate::new(reqwest::Client::new(), None, None);
        let rules = ModerationRuleSet::default();
        let guardrails = GuardrailsConfig::default();
        let outcome = gate.check("hello", "agent-1", None, &rules, &guardrails).await;
        assert!(outcome.is_approved());
    }

    #[test]
    fn guardrails_config_missing_file_is_disabled() {
        let config = GuardrailsConfig::load_from_file(std::path::Path::new("/nonexistent/guardrails.json")).unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn guardrails_config_reads_enabled_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardrails.json");
        std::fs::write(&path, r#"{"enabled": true, "jailbreak_threshold": 0.8}"#).unwrap();
        let config = GuardrailsConfig::load_from_file(&path).unwrap();
        assert!(config.enabled);
        assert_eq!(config.config["jailbreak_threshold"], 0.8);
    }

    #[tokio::test]
    async fn fails_open_when_moderation_peer_unreachable() {
        let gate = SafetyGate::new(
            reqwest::Client::new(),
            Some("http://127.0.0.1:1/moderate".to_string()),
            None,
        );
        let rules = ModerationRuleSet::default();
        let guardrails = GuardrailsConfig::default();
        let outcome = gate.check("hello", "agent-1", None, &rules, &guardrails).await;
        assert!(outcome.is_approved());
    }
}
