//! `GET /agents`, `/agents/{id_or_slug}`, `/definition`, `/ui` (spec §6.2).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use skein::adl::Agent;

use crate::app::AppState;
use crate::response::ErrorBody;

/// Passed-through-to-the-API-consumer metadata view of an agent (spec §3:
/// identity + enough of the business logic to render a listing). The UI
/// descriptor and full workflow graph are reached via `/definition`/`/ui`.
#[derive(Serialize)]
struct AgentSummary {
    id: String,
    slug: String,
    name: String,
    description: String,
    category: Option<String>,
    status: &'static str,
    icon: Option<String>,
}

impl From<&Agent> for AgentSummary {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id().to_string(),
            slug: agent.slug(),
            name: agent.identity.name.clone(),
            description: agent.identity.description.clone(),
            category: agent.identity.category.clone(),
            status: status_name(agent.identity.status),
            icon: agent.identity.icon.clone(),
        }
    }
}

fn status_name(status: skein::adl::Status) -> &'static str {
    use skein::adl::Status;
    match status {
        Status::Draft => "draft",
        Status::Active => "active",
        Status::Beta => "beta",
        Status::Disabled => "disabled",
        Status::Archived => "archived",
    }
}

fn not_found(id_or_slug: &str) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new(format!("agent not found: {id_or_slug}"))),
    )
}

/// `GET /agents` — lists active agents only (spec §6.2).
pub async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents: Vec<AgentSummary> = state.registry.list_active().iter().map(|a| AgentSummary::from(a.as_ref())).collect();
    Json(agents).into_response()
}

/// `GET /agents/{id_or_slug}` — agent metadata, regardless of status.
pub async fn get_agent(State(state): State<Arc<AppState>>, Path(id_or_slug): Path<String>) -> impl IntoResponse {
    match state.registry.get_by_id_or_slug(&id_or_slug) {
        Some(agent) => Json(AgentSummary::from(agent.as_ref())).into_response(),
        None => not_found(&id_or_slug).into_response(),
    }
}

/// `GET /agents/{id_or_slug}/definition` — full ADL document.
pub async fn get_definition(State(state): State<Arc<AppState>>, Path(id_or_slug): Path<String>) -> impl IntoResponse {
    match state.registry.get_by_id_or_slug(&id_or_slug) {
        Some(agent) => Json((*agent).clone()).into_response(),
        None => not_found(&id_or_slug).into_response(),
    }
}

/// `GET /agents/{id_or_slug}/ui` — the opaque UI descriptor, passed through
/// verbatim (spec §3, §4.1: "kept opaque at the core boundary").
pub async fn get_ui(State(state): State<Arc<AppState>>, Path(id_or_slug): Path<String>) -> impl IntoResponse {
    match state.registry.get_by_id_or_slug(&id_or_slug) {
        Some(agent) => Json(agent.ui.clone()).into_response(),
        None => not_found(&id_or_slug).into_response(),
    }
}
