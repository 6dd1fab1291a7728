//! HTTP surface for the Aftercare service.
//!
//! Exposes the turn endpoint, the interaction log, a health probe, session
//! clearing, and the patient roster over axum with CORS, tracing, and
//! compression middleware.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
