//! Axum app: shared state and the route table for the executor-facing
//! HTTP surface (spec §6.2).

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use skein::config::RuntimeConfig;
use skein::loader::AgentRegistry;
use skein::executor::WorkflowExecutor;
use skein::llm_manager::LlmManager;
use skein::safety::{GuardrailsConfig, ModerationRuleSet, SafetyGate};
use skein::session::SessionManager;
use skein::tool_manager::{ToolManager, ToolRegistry};

use crate::handlers::{admin, agents, execute, sessions};

/// Everything a request handler needs, shared across the process (spec §5
/// "service singletons ... created at startup under a lock; callers never
/// construct their own"). Cheap to clone: every field is itself an `Arc`-
/// backed handle or stateless value.
#[derive(Clone)]
pub struct AppState {
    pub registry: AgentRegistry,
    pub executor: WorkflowExecutor,
    pub sessions: SessionManager,
    pub safety: SafetyGate,
    pub tool_manager: ToolManager,
    pub moderation_rules: ModerationRuleSet,
    pub guardrails: GuardrailsConfig,
    pub config: RuntimeConfig,
}

/// Builds every service singleton from `config` (spec §5, §6.4). Agent
/// loading failures do not abort startup — an empty/partial registry is
/// valid, matching the Agent Loader's "skip and continue" policy for
/// individual bad files (spec §4.4).
pub fn build_state(config: RuntimeConfig) -> AppState {
    let client = skein::http_client::build_shared_client();

    let (registry, warnings) = AgentRegistry::load_dir(&config.agents_storage_path)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %config.agents_storage_path.display(), "failed to load agents directory, starting with an empty registry");
            (AgentRegistry::empty(), Vec::new())
        });
    for warning in warnings {
        tracing::warn!(warning, "agent cross-reference warning at startup");
    }

    let tool_registry = ToolRegistry::from_base_urls(&config.tool_base_urls);
    let tool_manager = ToolManager::new(client.clone(), tool_registry);

    let llm_manager = LlmManager::new(
        client.clone(),
        config.llm_base_urls.clone(),
        Duration::from_secs(config.llm_timeout_seconds),
    );
    let executor = WorkflowExecutor::new(tool_manager.clone(), llm_manager);

    let sessions = SessionManager::new();
    sessions.spawn_sweeper();

    let moderation_rules = config
        .moderation_settings_path
        .as_deref()
        .map(ModerationRuleSet::load_from_file)
        .transpose()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load moderation settings, starting with no rules");
            None
        })
        .unwrap_or_default();

    let guardrails = config
        .nemo_guardrails_config_path
        .as_deref()
        .map(GuardrailsConfig::load_from_file)
        .transpose()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load guardrails config, starting disabled");
            None
        })
        .unwrap_or_default();

    let moderation_url = config.tool_base_urls.get("prompt-moderation").map(|base| {
        format!("{}/api/v1/moderate/check", base.trim_end_matches('/'))
    });
    let guardrails_url = config
        .tool_base_urls
        .get("guardrails")
        .map(|base| format!("{}/api/v1/guardrails/check", base.trim_end_matches('/')));
    let safety = SafetyGate::new(client, moderation_url, guardrails_url);

    AppState {
        registry,
        executor,
        sessions,
        safety,
        tool_manager,
        moderation_rules,
        guardrails,
        config,
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agents", get(agents::list_agents))
        .route("/agents/:id_or_slug", get(agents::get_agent))
        .route("/agents/:id_or_slug/definition", get(agents::get_definition))
        .route("/agents/:id_or_slug/ui", get(agents::get_ui))
        .route("/agents/:id_or_slug/execute", post(execute::execute))
        .route("/agents/:id_or_slug/execute/stream", post(execute::execute_stream))
        .route("/agents/:id_or_slug/execute/upload", post(execute::execute_upload))
        .route("/agents/:id_or_slug/chat", post(execute::chat))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id", delete(sessions::delete_session))
        .route("/sessions/:id/messages", get(sessions::get_messages))
        .route("/sessions/:id/clear", post(sessions::clear_session))
        .route("/reload", post(admin::reload))
        .route("/stats", get(admin::stats))
        .route("/health", get(admin::health))
        .with_state(state)
}
