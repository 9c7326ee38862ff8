//! `/sessions/{id}` routes (spec §6.2).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::response::ErrorBody;

fn not_found(id: &str) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new(format!("session not found: {id}"))))
}

/// `GET /sessions/{id}`.
pub async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.sessions.get(&id) {
        Some(session) => Json(session).into_response(),
        None => not_found(&id).into_response(),
    }
}

#[derive(Serialize)]
struct DeleteResult {
    deleted: bool,
}

/// `DELETE /sessions/{id}`.
pub async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let deleted = state.sessions.delete(&id);
    Json(DeleteResult { deleted })
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    limit: Option<usize>,
}

/// `GET /sessions/{id}/messages?limit=N`.
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> impl IntoResponse {
    match state.sessions.get_messages(&id, query.limit) {
        Some(messages) => Json(messages).into_response(),
        None => not_found(&id).into_response(),
    }
}

#[derive(Serialize)]
struct ClearResult {
    cleared: bool,
}

/// `POST /sessions/{id}/clear`.
pub async fn clear_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.sessions.clear_messages(&id) {
        Some(()) => Json(ClearResult { cleared: true }).into_response(),
        None => not_found(&id).into_response(),
    }
}
