//! Application state shared across all route handlers.
//!
//! AppState holds the turn router, the patient directory, and the
//! interaction log. It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use aftercare_agents::lookup::PatientLookup;
use aftercare_agents::TurnRouter;
use aftercare_core::log::InteractionLog;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Turn router owning the session store and both agents.
    pub router: Arc<TurnRouter>,
    /// Patient directory backing the roster endpoint.
    pub lookup: Arc<dyn PatientLookup>,
    /// Structured interaction log backing the log query endpoint.
    pub log: Arc<InteractionLog>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        router: Arc<TurnRouter>,
        lookup: Arc<dyn PatientLookup>,
        log: Arc<InteractionLog>,
    ) -> Self {
        Self {
            router,
            lookup,
            log,
            start_time: Instant::now(),
        }
    }
}
