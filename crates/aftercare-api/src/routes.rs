//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use aftercare_core::error::AftercareError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // The conversation UI is served from arbitrary origins.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/logs", get(handlers::logs))
        .route("/health", get(handlers::health))
        .route("/session/{id}", delete(handlers::clear_session))
        .route("/patients", get(handlers::patients))
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64KB: turns are short text
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// Binds to 127.0.0.1 (localhost only).
pub async fn start_server(port: u16, state: AppState) -> Result<(), AftercareError> {
    let addr = format!("127.0.0.1:{}", port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AftercareError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| AftercareError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
