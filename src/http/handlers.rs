//! HTTP request handlers
//!
//! Error mapping plus the health, version, and debug endpoints. Session and
//! record endpoints live in `sessions`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::SubtransError;
use crate::state::AppState;

/// HTTP error type
#[derive(Debug)]
pub enum HttpError {
    SessionNotFound(String),
    RecordNotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Session not found: {}", id))
            }
            HttpError::RecordNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            HttpError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SubtransError> for HttpError {
    fn from(err: SubtransError) -> Self {
        match err {
            SubtransError::SessionNotFound(id) => HttpError::SessionNotFound(id),
            SubtransError::RecordNotFound { .. } => HttpError::RecordNotFound(err.to_string()),
            SubtransError::EmptyCueSet | SubtransError::SubtitleParse(_) => {
                HttpError::BadRequest(err.to_string())
            }
            _ => HttpError::InternalError(err.to_string()),
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("subtrans-server v", env!("CARGO_PKG_VERSION"))
}

/// Debug endpoint - record store statistics
pub async fn store_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.store.stats();

    Json(serde_json::json!({
        "entry_count": stats.entry_count,
        "capacity": stats.capacity,
        "total_cues": stats.total_cues,
        "total_hits": stats.total_hits,
        "oldest_entry_age_secs": stats.oldest_entry_age_secs,
    }))
}

/// Debug endpoint - active sessions
pub async fn active_sessions(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sessions: Vec<_> = state
        .sessions()
        .iter()
        .map(|s| {
            serde_json::json!({
                "session_id": s.id,
                "page": s.page_key(),
                "languages": format!("{}->{}", s.source_language, s.target_language),
                "phase": s.phase(),
                "progress": s.progress(),
                "cues": s.cue_count(),
                "translated": s.translated_units(),
                "failed_batches": s.failed_batches(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}
