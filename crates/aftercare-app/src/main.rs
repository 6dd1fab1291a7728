//! Aftercare application binary - composition root.
//!
//! Ties together all Aftercare crates into a single executable:
//! 1. Parse CLI args and load configuration from TOML
//! 2. Open the SQLite patient directory and load the passage corpus
//! 3. Build the retrieval pipeline (lexical index + web fallback)
//! 4. Wire the intake and clinical agents into the turn router
//! 5. Start the axum REST API server

mod cli;
mod llm;
mod patients;
mod web;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use aftercare_agents::generation::TextGeneration;
use aftercare_agents::lookup::PatientLookup;
use aftercare_agents::{ClinicalAgent, IntakeAgent, SessionStore, TurnRouter};
use aftercare_api::routes;
use aftercare_api::state::AppState;
use aftercare_core::config::AftercareConfig;
use aftercare_core::log::InteractionLog;
use aftercare_retrieval::confidence::ThresholdPolicy;
use aftercare_retrieval::lexical::LexicalPassageIndex;
use aftercare_retrieval::pipeline::RetrievalPipeline;
use aftercare_retrieval::providers::{PassageSearch, WebSearch};

use crate::llm::ChatCompletionsClient;
use crate::patients::SqlitePatientDirectory;
use crate::web::{DuckDuckGoSearch, TavilySearch};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();

    // Config, with CLI overrides applied on top.
    let config_file = args.resolve_config_path();
    let mut config = AftercareConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    let port = args.resolve_port(config.general.port);

    // Tracing. RUST_LOG wins over the resolved level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.general.log_level.clone())
            }),
        )
        .init();

    tracing::info!("Starting Aftercare v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let log = Arc::new(InteractionLog::new());

    // Patient directory (schema and seeding handled externally).
    let db_path = data_dir.join("patients.db");
    let lookup = Arc::new(SqlitePatientDirectory::open(&db_path)?);
    tracing::info!(path = %db_path.display(), "Patient database opened");

    // Passage corpus. Missing corpus means every clinical question leans on
    // web fallback, which is a degraded but working mode.
    let corpus_path = data_dir.join("passages.jsonl");
    let index = match LexicalPassageIndex::load_jsonl(&corpus_path) {
        Ok(index) => {
            tracing::info!(passages = index.len(), path = %corpus_path.display(), "Passage corpus loaded");
            index
        }
        Err(e) => {
            tracing::warn!(path = %corpus_path.display(), error = %e, "No passage corpus, starting with an empty index");
            LexicalPassageIndex::new()
        }
    };

    // Web search providers.
    let search_key = std::env::var(&config.web_search.api_key_env).unwrap_or_default();
    if search_key.is_empty() {
        tracing::warn!(
            env = %config.web_search.api_key_env,
            "Primary web search key unset; fallback will rely on the secondary provider"
        );
    }
    let primary = TavilySearch::new(search_key, config.retrieval.provider_timeout_secs)?;
    let secondary = DuckDuckGoSearch::new(config.retrieval.provider_timeout_secs)?;

    let pipeline = Arc::new(RetrievalPipeline::new(
        Arc::new(index) as Arc<dyn PassageSearch>,
        Arc::new(primary) as Arc<dyn WebSearch>,
        Arc::new(secondary) as Arc<dyn WebSearch>,
        Arc::new(ThresholdPolicy::new(config.retrieval.confidence_threshold)),
        Arc::clone(&log),
        config.retrieval.clone(),
    ));

    // Generation client, shared by the intake classifier and the clinical agent.
    let llm_key = std::env::var(&config.generation.api_key_env).unwrap_or_default();
    if llm_key.is_empty() {
        tracing::warn!(
            env = %config.generation.api_key_env,
            "LLM key unset; clinical replies will use the deterministic fallback"
        );
    }
    let generation: Arc<dyn TextGeneration> =
        Arc::new(ChatCompletionsClient::new(&config.generation, llm_key)?);

    let intake = IntakeAgent::new(
        Arc::clone(&lookup) as Arc<dyn PatientLookup>,
        Arc::clone(&generation),
        Arc::clone(&log),
    );
    let clinical = ClinicalAgent::new(
        pipeline,
        Arc::clone(&generation),
        Arc::clone(&log),
        config.generation.timeout_secs,
        config.retrieval.retry_backoff_ms,
    );

    let router = Arc::new(TurnRouter::new(
        SessionStore::new(config.session.idle_timeout_minutes),
        intake,
        clinical,
        Arc::clone(&log),
        Duration::from_secs(config.session.turn_deadline_secs),
    ));

    let state = AppState::new(router, lookup, log);
    routes::start_server(port, state).await?;

    Ok(())
}
