//! Integration tests for the Aftercare API.
//!
//! Exercises every route end to end over an in-process axum router with
//! mock retrieval, lookup, and generation services, including the full
//! conversation flows: identification, evidence-backed answers, web
//! fallback, degraded retrieval, and generation outage.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use aftercare_agents::{
    ClinicalAgent, InMemoryPatientDirectory, IntakeAgent, PatientLookup, SessionStore, TurnRouter,
};
use aftercare_agents::generation::{MockGeneration, TextGeneration};
use aftercare_api::create_router;
use aftercare_api::handlers::{ChatResponse, ClearSessionResponse, HealthResponse, PatientsResponse};
use aftercare_api::state::AppState;
use aftercare_core::config::RetrievalConfig;
use aftercare_core::log::InteractionLog;
use aftercare_core::types::{LabResults, PatientRecord, SourceKind};
use aftercare_retrieval::confidence::ThresholdPolicy;
use aftercare_retrieval::pipeline::RetrievalPipeline;
use aftercare_retrieval::providers::{
    MockPassageSearch, MockWebSearch, PassageSearch, ScoredPassage, WebHit, WebSearch,
};

// =============================================================================
// Helpers
// =============================================================================

fn record(name: &str) -> PatientRecord {
    PatientRecord {
        id: format!("pt-{}", name.to_lowercase().replace(' ', "-")),
        patient_name: name.to_string(),
        date_of_birth: "1958-03-12".to_string(),
        primary_diagnosis: "Chronic Kidney Disease Stage 3".to_string(),
        secondary_diagnoses: vec!["Hypertension".to_string()],
        discharge_date: "2025-01-15".to_string(),
        medications: vec!["Lisinopril 10mg daily".to_string()],
        dietary_restrictions: "Low sodium, low potassium".to_string(),
        follow_up: "Nephrology clinic in 2 weeks".to_string(),
        warning_signs: "Swelling, shortness of breath".to_string(),
        discharge_instructions: "Monitor blood pressure daily".to_string(),
        lab_results: LabResults {
            creatinine_mg_dl: 1.8,
            egfr_ml_min: 45.0,
            potassium_meq_l: 4.2,
            hemoglobin_g_dl: 11.5,
        },
    }
}

fn passage(score: f64) -> ScoredPassage {
    ScoredPassage {
        text: "Sodium restriction slows CKD progression.".to_string(),
        provenance: "Page 87".to_string(),
        score,
    }
}

fn web_hit() -> WebHit {
    WebHit {
        title: "New SGLT2 findings".to_string(),
        url: "https://example.org/sglt2".to_string(),
        snippet: "A 2025 trial found...".to_string(),
        score: 0.7,
    }
}

struct Fixture {
    passages: Vec<ScoredPassage>,
    primary_web: MockWebSearch,
    secondary_web: MockWebSearch,
    clinical_generation: MockGeneration,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            passages: vec![passage(0.9), passage(0.8)],
            primary_web: MockWebSearch::with_results(vec![web_hit()]),
            secondary_web: MockWebSearch::with_results(vec![]),
            clinical_generation: MockGeneration::with_reply("Limit sodium to 2g per day [1]."),
        }
    }
}

fn make_state(fixture: Fixture) -> AppState {
    let log = Arc::new(InteractionLog::new());
    let lookup = Arc::new(InMemoryPatientDirectory::new(vec![
        record("John Smith"),
        record("Jane Smith"),
        record("Maria Garcia"),
    ]));

    let config = RetrievalConfig {
        retry_backoff_ms: 1,
        ..RetrievalConfig::default()
    };
    let pipeline = Arc::new(RetrievalPipeline::new(
        Arc::new(MockPassageSearch::with_results(fixture.passages)) as Arc<dyn PassageSearch>,
        Arc::new(fixture.primary_web) as Arc<dyn WebSearch>,
        Arc::new(fixture.secondary_web) as Arc<dyn WebSearch>,
        Arc::new(ThresholdPolicy::new(0.6)),
        Arc::clone(&log),
        config,
    ));

    let intake = IntakeAgent::new(
        Arc::clone(&lookup) as Arc<dyn PatientLookup>,
        Arc::new(MockGeneration::with_reply("no")) as Arc<dyn TextGeneration>,
        Arc::clone(&log),
    );
    let clinical = ClinicalAgent::new(
        pipeline,
        Arc::new(fixture.clinical_generation) as Arc<dyn TextGeneration>,
        Arc::clone(&log),
        5,
        1,
    );
    let router = Arc::new(TurnRouter::new(
        SessionStore::new(30),
        intake,
        clinical,
        Arc::clone(&log),
        Duration::from_secs(60),
    ));

    AppState::new(router, lookup, log)
}

fn make_app() -> axum::Router {
    create_router(make_state(Fixture::default()))
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn chat_turn(app: &axum::Router, session_id: &str, message: &str) -> ChatResponse {
    let body = serde_json::json!({ "message": message, "session_id": session_id }).to_string();
    let resp = app
        .clone()
        .oneshot(post_json("/chat", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_value(body_json(resp).await).unwrap()
}

// =============================================================================
// /health, /logs, /patients, /session
// =============================================================================

#[tokio::test]
async fn test_health_reports_counters() {
    let app = make_app();
    let resp = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_patients_roster_sorted() {
    let app = make_app();
    let resp = app.oneshot(get("/patients")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let roster: PatientsResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(
        roster.patients,
        vec!["Jane Smith", "John Smith", "Maria Garcia"]
    );
}

#[tokio::test]
async fn test_logs_capture_turn_events() {
    let app = make_app();
    chat_turn(&app, "s-1", "hello").await;

    let resp = app.oneshot(get("/logs?limit=10")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let entries = body["entries"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert_eq!(entries[0]["kind"], "turn_received");
}

#[tokio::test]
async fn test_clear_session_idempotent() {
    let app = make_app();
    chat_turn(&app, "s-1", "hello").await;

    let resp = app.clone().oneshot(delete("/session/s-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first: ClearSessionResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert!(first.cleared);

    // Clearing again (or a never-seen id) is a no-op, not an error.
    let resp = app.clone().oneshot(delete("/session/s-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second: ClearSessionResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert!(!second.cleared);

    let resp = app.oneshot(delete("/session/never-seen")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cleared_session_starts_over() {
    let app = make_app();
    let turn = chat_turn(&app, "s-1", "my name is John Smith").await;
    assert!(turn.patient.is_some());

    app.clone().oneshot(delete("/session/s-1")).await.unwrap();

    let turn = chat_turn(&app, "s-1", "hello again").await;
    assert!(turn.patient.is_none());
    assert!(turn.reply.contains("full name"));
}

// =============================================================================
// /chat validation
// =============================================================================

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let app = make_app();
    let body = serde_json::json!({ "message": "  ", "session_id": "s-1" }).to_string();
    let resp = app.oneshot(post_json("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_missing_session_id_is_minted() {
    let app = make_app();
    let body = serde_json::json!({ "message": "hello" }).to_string();
    let resp = app.oneshot(post_json("/chat", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let turn: ChatResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert!(!turn.session_id.is_empty());
}

#[tokio::test]
async fn test_explicit_patient_name_identifies() {
    let app = make_app();
    let body = serde_json::json!({
        "message": "hi",
        "session_id": "s-1",
        "patient_name": "Maria Garcia"
    })
    .to_string();
    let resp = app.oneshot(post_json("/chat", &body)).await.unwrap();
    let turn: ChatResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(
        turn.patient.map(|p| p.patient_name),
        Some("Maria Garcia".to_string())
    );
}

// =============================================================================
// Conversation flows
// =============================================================================

#[tokio::test]
async fn test_identification_flow() {
    let app = make_app();

    let turn = chat_turn(&app, "s-1", "hello").await;
    assert_eq!(turn.agent, aftercare_core::types::AgentTag::Intake);
    assert!(turn.patient.is_none());

    let turn = chat_turn(&app, "s-1", "my name is John Smith").await;
    assert!(turn.reply.contains("Chronic Kidney Disease Stage 3"));
    assert!(turn.reply.contains("2025-01-15"));
    assert_eq!(
        turn.patient.map(|p| p.patient_name),
        Some("John Smith".to_string())
    );
}

#[tokio::test]
async fn test_ambiguous_name_asks_to_narrow() {
    let app = make_app();
    let turn = chat_turn(&app, "s-1", "my name is Smith").await;
    assert!(turn.reply.contains("several patients"));
    assert!(turn.patient.is_none());
}

#[tokio::test]
async fn test_clinical_question_cites_indexed_evidence() {
    let app = make_app();
    chat_turn(&app, "s-1", "my name is John Smith").await;

    let turn = chat_turn(&app, "s-1", "what diet should I follow for my kidney?").await;
    assert_eq!(turn.agent, aftercare_core::types::AgentTag::Clinical);
    assert!(!turn.sources.is_empty());
    assert!(turn
        .sources
        .iter()
        .all(|s| s.kind == SourceKind::IndexedPassage));
    assert!(turn.reply.contains("educational purposes only"));
    assert!(turn.reply.contains("Page 87"));
    // The handoff is visible in this turn's log slice.
    assert!(turn.logs.iter().any(|e| {
        matches!(e.kind, aftercare_core::log::EventKind::AgentHandoff)
    }));
}

#[tokio::test]
async fn test_recency_question_uses_web_fallback() {
    let app = make_app();
    chat_turn(&app, "s-1", "my name is John Smith").await;

    let turn = chat_turn(&app, "s-1", "what's the latest research on my medication?").await;
    assert!(turn.reply.starts_with("Using web search for recent information"));
    assert!(turn
        .sources
        .iter()
        .any(|s| s.kind == SourceKind::WebResult));
    assert!(turn.logs.iter().any(|e| {
        matches!(e.kind, aftercare_core::log::EventKind::WebFallback)
    }));
}

#[tokio::test]
async fn test_web_outage_degrades_to_indexed_evidence() {
    let app = create_router(make_state(Fixture {
        primary_web: MockWebSearch::failing(),
        secondary_web: MockWebSearch::failing(),
        ..Fixture::default()
    }));
    chat_turn(&app, "s-1", "my name is John Smith").await;

    // Recency marker escalates, but both providers are down; the turn still
    // succeeds on indexed evidence alone.
    let turn = chat_turn(&app, "s-1", "any recent news on my medication?").await;
    assert!(!turn.sources.is_empty());
    assert!(turn
        .sources
        .iter()
        .all(|s| s.kind == SourceKind::IndexedPassage));
    assert!(!turn.reply.starts_with("Using web search"));
}

#[tokio::test]
async fn test_generation_outage_yields_fallback_reply() {
    let app = create_router(make_state(Fixture {
        clinical_generation: MockGeneration::failing(),
        ..Fixture::default()
    }));
    chat_turn(&app, "s-1", "my name is John Smith").await;

    let turn = chat_turn(&app, "s-1", "is this swelling normal?").await;
    assert_eq!(turn.agent, aftercare_core::types::AgentTag::Clinical);
    assert!(turn.reply.contains("Nephrology clinic in 2 weeks"));
    assert!(turn.reply.contains("educational purposes only"));
    assert!(turn.logs.iter().any(|e| {
        matches!(e.kind, aftercare_core::log::EventKind::GenerationFailed)
    }));
}

#[tokio::test]
async fn test_small_talk_after_clinical_returns_to_intake() {
    let app = make_app();
    chat_turn(&app, "s-1", "my name is John Smith").await;
    chat_turn(&app, "s-1", "what diet should I follow?").await;

    let turn = chat_turn(&app, "s-1", "thanks, that's all!").await;
    assert_eq!(turn.agent, aftercare_core::types::AgentTag::Intake);
    assert_eq!(turn.state, aftercare_core::types::RouterState::Identified);
    assert!(turn.sources.is_empty());
}
