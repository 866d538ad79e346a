//! Management API module for the Tileworld server
//!
//! This module provides HTTP endpoints for:
//! - Liveness checks
//! - Server and world status
//!
//! The API is built with Axum and runs beside the WebSocket listener.

pub mod response;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::response::{ApiResponse, StatusResponse};
use crate::state::AppState;

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        // Add CORS middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// World and connection counters
async fn status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusResponse>> {
    let status = StatusResponse::collect(&state.config.server_name, &state.world_status, &state.sessions);
    Json(ApiResponse::success("Server status", status))
}
