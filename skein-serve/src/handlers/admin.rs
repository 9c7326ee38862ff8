//! `/reload`, `/stats`, `/health` (spec §6.2, §6.4).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::response::ErrorBody;

#[derive(Serialize)]
struct ReloadResult {
    agent_count: usize,
    warnings: Vec<String>,
}

/// `POST /reload` — re-scans `agents_storage_path` and atomically swaps the
/// registry in (spec §4.4 "reload"). Individual bad files are reported as
/// warnings, not request failures; a document-parse error is the only thing
/// that fails the whole reload.
pub async fn reload(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.reload() {
        Ok(warnings) => Json(ReloadResult {
            agent_count: state.registry.count(),
            warnings,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(e.to_string())),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct Stats {
    agent_count: usize,
    active_agent_count: usize,
    session_count: usize,
    configured_tools: usize,
}

/// `GET /stats` — coarse counters for operators (spec §6.2).
pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(Stats {
        agent_count: state.registry.count(),
        active_agent_count: state.registry.list_active().len(),
        session_count: state.sessions.count(),
        configured_tools: state.config.tool_base_urls.len(),
    })
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

/// `GET /health` — liveness probe; always `ok` once the process answers.
pub async fn health() -> impl IntoResponse {
    Json(Health { status: "ok" })
}
