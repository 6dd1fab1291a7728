//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aftercare_agents::TurnRequest;
use aftercare_core::log::LogEntry;
use aftercare_core::types::{AgentTag, Evidence, PatientRecord, RouterState};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omitted on the first turn; the server mints one.
    pub session_id: Option<String>,
    /// Explicit patient name, bypassing name mining during identification.
    pub patient_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub agent: AgentTag,
    pub state: RouterState,
    pub sources: Vec<Evidence>,
    pub patient: Option<PatientRecord>,
    /// Log entries emitted while processing this turn.
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogsResponse {
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub log_entries: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearSessionResponse {
    pub session_id: String,
    pub cleared: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatientsResponse {
    pub patients: Vec<String>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /chat - process one conversation turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let logged_before = state.log.by_session(&session_id).len();

    let turn = TurnRequest {
        session_id: session_id.clone(),
        message: request.message,
        patient_name_hint: request.patient_name,
    };
    let outcome = state.router.handle_turn(&turn).await?;

    let mut entries = state.log.by_session(&session_id);
    let logs = entries.split_off(logged_before.min(entries.len()));

    Ok(Json(ChatResponse {
        session_id,
        reply: outcome.reply,
        agent: outcome.agent,
        state: outcome.state,
        sources: outcome.citations,
        patient: outcome.patient,
        logs,
    }))
}

/// GET /logs - most recent structured log entries.
pub async fn logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Json<LogsResponse> {
    let limit = params.limit.unwrap_or(50).min(1000);
    Json(LogsResponse {
        entries: state.log.recent(limit),
    })
}

/// GET /health - service liveness and counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.router.active_sessions(),
        log_entries: state.log.len(),
    })
}

/// DELETE /session/{id} - idempotent session clear.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ClearSessionResponse> {
    let cleared = state.router.clear_session(&id);
    Json(ClearSessionResponse {
        session_id: id,
        cleared,
    })
}

/// GET /patients - roster of known patient names.
pub async fn patients(State(state): State<AppState>) -> Result<Json<PatientsResponse>, ApiError> {
    let patients = state.lookup.roster().await?;
    Ok(Json(PatientsResponse { patients }))
}
