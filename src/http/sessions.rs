//! Session management handlers
//!
//! Handles session creation, status, timing snapshots, cancellation, and
//! the stored-record endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::handlers::HttpError;
use crate::consolidate::maybe_consolidate;
use crate::cue::{find_active_cue, normalize_cues, Cue, CueTiming};
use crate::session::{SessionInit, SessionPhase, TranslationSession};
use crate::srt::parse_srt;
use crate::state::AppState;
use crate::store::TranslationRecord;
use crate::translate::run_session;

/// One incoming cue; identifiers are assigned during normalization.
#[derive(Debug, Deserialize)]
pub struct CueInput {
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Request to start a translation session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Streaming platform the page belongs to
    pub platform: String,
    /// Video identifier on that platform
    pub video_id: String,
    /// Source language code; defaults to "auto" for provider-side detection
    #[serde(default = "default_source_language")]
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Timed cues, already sorted or not
    #[serde(default)]
    pub cues: Vec<CueInput>,
    /// Alternatively, a whole SRT document
    #[serde(default)]
    pub srt: Option<String>,
    /// Current playback position; work starts from the cue nearest to it
    #[serde(default)]
    pub current_time_ms: Option<u64>,
    /// Whether the captions are machine-generated (enables consolidation)
    #[serde(default)]
    pub auto_generated: bool,
    /// Skip the stored-record lookup and retranslate
    #[serde(default)]
    pub force: bool,
}

/// Response after starting (or short-circuiting) a session
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    /// Session identifier, absent when served from the record store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// True when a stored record satisfied the request
    pub cached: bool,
    /// Cues after normalization and consolidation
    pub cue_count: usize,
    /// Batches the run is split into
    pub batch_count: usize,
    /// Cue identifier nearest the playback position
    pub anchor_index: usize,
    /// Whether a separate quick pass will run
    pub quick_pass: bool,
    /// The stored record, on a cache hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<TranslationRecord>,
}

/// Session status, as reported by list and get
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub platform: String,
    pub video_id: String,
    pub source_language: String,
    pub target_language: String,
    pub phase: SessionPhase,
    pub progress: u8,
    pub revision: u64,
    pub cue_count: usize,
    pub batch_count: usize,
    pub anchor_index: usize,
    pub translated_units: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
}

impl SessionStatus {
    fn from_session(session: &TranslationSession) -> Self {
        Self {
            session_id: session.id.clone(),
            platform: session.platform.clone(),
            video_id: session.video_id.clone(),
            source_language: session.source_language.clone(),
            target_language: session.target_language.clone(),
            phase: session.phase(),
            progress: session.progress(),
            revision: session.revision(),
            cue_count: session.cue_count(),
            batch_count: session.batch_count,
            anchor_index: session.anchor_index,
            translated_units: session.translated_units(),
            completed_batches: session.completed_batches(),
            failed_batches: session.failed_batches(),
        }
    }
}

/// List of sessions
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub count: usize,
    pub sessions: Vec<SessionStatus>,
}

/// Query parameters for session listing
#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Query parameters for the timing snapshot
#[derive(Debug, Deserialize)]
pub struct TimingsQuery {
    /// Last revision the caller has seen; enables long-polling
    pub since: Option<u64>,
    /// How long to wait for a newer revision, in milliseconds
    pub wait_ms: Option<u64>,
}

/// Longest a timing snapshot request may block.
const MAX_WAIT_MS: u64 = 30_000;

fn default_source_language() -> String {
    "auto".to_string()
}

/// Timing snapshot for the renderer
#[derive(Debug, Serialize)]
pub struct TimingsResponse {
    pub revision: u64,
    pub phase: SessionPhase,
    pub progress: u8,
    pub timings: Vec<CueTiming>,
}

/// Query parameters addressing one stored record
#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub source: String,
    pub target: String,
}

/// Start a translation session
/// POST /sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Response {
    let mut cues = match ingest_cues(&request) {
        Ok(cues) => cues,
        Err(e) => return e.into_response(),
    };

    normalize_cues(&mut cues);
    let before = cues.len();
    let mut cues = maybe_consolidate(cues, request.auto_generated, &state.config.consolidate);
    let consolidated = cues.len() != before;
    if consolidated {
        // Consolidation renumbers from zero but keeps the sort order.
        normalize_cues(&mut cues);
    }

    if !request.force {
        if let Some(record) = state.store.get(
            &request.platform,
            &request.video_id,
            &request.source_language,
            &request.target_language,
        ) {
            let response = CreateSessionResponse {
                session_id: None,
                cached: true,
                cue_count: record.cues.len(),
                batch_count: record.metadata.total_batches,
                anchor_index: 0,
                quick_pass: record.metadata.quick_provider.is_some(),
                record: Some(record),
            };
            return (StatusCode::OK, Json(response)).into_response();
        }
    }

    let anchor_index = find_active_cue(&cues, request.current_time_ms.unwrap_or(0));
    let batch_size = state.config.scheduler.batch_size.max(1);
    let batch_count = cues.len().div_ceil(batch_size);
    let quick_pass = state.quick_provider.name() != state.quality_provider.name();

    let session = state.register_session(TranslationSession::new(SessionInit {
        platform: request.platform,
        video_id: request.video_id,
        source_language: request.source_language,
        target_language: request.target_language,
        cues,
        anchor_index,
        batch_count,
        auto_generated: request.auto_generated,
        consolidated,
    }));
    spawn_session_run(state, session.clone());

    let response = CreateSessionResponse {
        session_id: Some(session.id.clone()),
        cached: false,
        cue_count: session.cue_count(),
        batch_count,
        anchor_index,
        quick_pass,
        record: None,
    };

    (StatusCode::CREATED, Json(response)).into_response()
}

fn ingest_cues(request: &CreateSessionRequest) -> Result<Vec<Cue>, HttpError> {
    let cues = match &request.srt {
        Some(_) if !request.cues.is_empty() => {
            return Err(HttpError::BadRequest(
                "supply either cues or srt, not both".to_string(),
            ));
        }
        Some(srt) => parse_srt(srt).map_err(HttpError::from)?,
        None => request
            .cues
            .iter()
            .enumerate()
            .map(|(position, input)| {
                let mut cue = Cue::new(
                    position,
                    input.start_time_ms,
                    input.end_time_ms,
                    input.text.clone(),
                );
                cue.speaker = input.speaker.clone();
                cue
            })
            .collect(),
    };
    if cues.is_empty() {
        return Err(HttpError::BadRequest("no cues supplied".to_string()));
    }
    Ok(cues)
}

/// Runs the orchestrator in the background and persists the outcome of a
/// completed run. A failed store write is logged and forgotten; the viewer
/// already has the translation.
fn spawn_session_run(state: Arc<AppState>, session: Arc<TranslationSession>) {
    tokio::spawn(async move {
        let quick = state.quick_provider.clone();
        let quality = state.quality_provider.clone();
        run_session(
            session.clone(),
            quick.clone(),
            quality.clone(),
            state.config.scheduler.clone(),
        )
        .await;

        if session.phase() == SessionPhase::Complete {
            let quick_name =
                (quick.name() != quality.name()).then(|| quick.name().to_string());
            let record =
                TranslationRecord::from_session(&session, quick_name.as_deref(), quality.name());
            if let Err(e) = state.store.put(record) {
                tracing::warn!("Failed to store record for session {}: {}", session.id, e);
            }
        }
    });
}

/// List all sessions
/// GET /sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionListQuery>,
) -> Json<SessionListResponse> {
    let mut sessions: Vec<SessionStatus> = state
        .sessions()
        .iter()
        .map(|s| SessionStatus::from_session(s))
        .collect();
    sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    let total = sessions.len();
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(total);
    let sessions: Vec<_> = sessions.into_iter().skip(offset).take(limit).collect();

    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}

/// Get session status
/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.get_session(&session_id) {
        Some(session) => Json(SessionStatus::from_session(&session)).into_response(),
        None => HttpError::SessionNotFound(session_id).into_response(),
    }
}

/// Get the timing snapshot for rendering
/// GET /sessions/{id}/timings
///
/// With `since` and `wait_ms`, blocks until the timing array moves past the
/// given revision or the wait expires, whichever comes first.
pub async fn session_timings(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<TimingsQuery>,
) -> Response {
    let Some(session) = state.get_session(&session_id) else {
        return HttpError::SessionNotFound(session_id).into_response();
    };

    if let Some(since) = query.since {
        let wait_ms = query.wait_ms.unwrap_or(0).min(MAX_WAIT_MS);
        if wait_ms > 0 {
            session
                .wait_for_revision(since, Duration::from_millis(wait_ms))
                .await;
        }
    }

    Json(TimingsResponse {
        revision: session.revision(),
        phase: session.phase(),
        progress: session.progress(),
        timings: session.snapshot_timings(),
    })
    .into_response()
}

/// Cancel a session
/// DELETE /sessions/{id}
///
/// Cancellation is cooperative: the orchestrator stops at its next poll
/// point and already-applied results stay readable until cleanup.
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.get_session(&session_id) {
        Some(session) => {
            session.cancel();
            StatusCode::NO_CONTENT.into_response()
        }
        None => HttpError::SessionNotFound(session_id).into_response(),
    }
}

/// Get a stored record
/// GET /records/{platform}/{video_id}
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((platform, video_id)): Path<(String, String)>,
    Query(query): Query<RecordQuery>,
) -> Response {
    match state
        .store
        .get(&platform, &video_id, &query.source, &query.target)
    {
        Some(record) => Json(record).into_response(),
        None => HttpError::RecordNotFound(format!(
            "No record for {}:{} {}->{}",
            platform, video_id, query.source, query.target
        ))
        .into_response(),
    }
}

/// Delete a stored record
/// DELETE /records/{platform}/{video_id}
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((platform, video_id)): Path<(String, String)>,
    Query(query): Query<RecordQuery>,
) -> Response {
    if state
        .store
        .remove(&platform, &video_id, &query.source, &query.target)
    {
        StatusCode::NO_CONTENT.into_response()
    } else {
        HttpError::RecordNotFound(format!(
            "No record for {}:{} {}->{}",
            platform, video_id, query.source, query.target
        ))
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_request_minimal() {
        let json = r#"{
            "platform": "youtube",
            "video_id": "abc",
            "source_language": "en",
            "target_language": "es",
            "cues": [{"start_time_ms": 0, "end_time_ms": 1000, "text": "hi"}]
        }"#;
        let request: CreateSessionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.platform, "youtube");
        assert_eq!(request.cues.len(), 1);
        assert!(!request.auto_generated);
        assert!(!request.force);
        assert!(request.srt.is_none());
    }

    #[test]
    fn test_ingest_rejects_empty() {
        let request: CreateSessionRequest = serde_json::from_str(
            r#"{"platform":"p","video_id":"v","source_language":"en","target_language":"es"}"#,
        )
        .unwrap();
        assert!(matches!(
            ingest_cues(&request),
            Err(HttpError::BadRequest(_))
        ));
    }

    #[test]
    fn test_ingest_rejects_both_cues_and_srt() {
        let request: CreateSessionRequest = serde_json::from_str(
            r#"{
                "platform": "p", "video_id": "v",
                "source_language": "en", "target_language": "es",
                "cues": [{"start_time_ms": 0, "end_time_ms": 1000, "text": "hi"}],
                "srt": "1\n00:00:01,000 --> 00:00:02,000\nHello\n"
            }"#,
        )
        .unwrap();
        assert!(matches!(
            ingest_cues(&request),
            Err(HttpError::BadRequest(_))
        ));
    }

    #[test]
    fn test_ingest_srt_document() {
        let request: CreateSessionRequest = serde_json::from_str(
            r#"{
                "platform": "p", "video_id": "v",
                "source_language": "en", "target_language": "es",
                "srt": "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:02,000 --> 00:00:03,000\nWorld\n"
            }"#,
        )
        .unwrap();
        let cues = ingest_cues(&request).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello");
        assert_eq!(cues[1].start_time_ms, 2000);
    }

    #[test]
    fn test_create_session_response_hides_empty_fields() {
        let response = CreateSessionResponse {
            session_id: Some("abc".to_string()),
            cached: false,
            cue_count: 3,
            batch_count: 1,
            anchor_index: 0,
            quick_pass: true,
            record: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"session_id\":\"abc\""));
        assert!(!json.contains("record"));
    }
}
