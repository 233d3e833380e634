//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
    pub connections: usize,
    pub waiting: usize,
}

pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness plus a snapshot of in-memory load
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.coordinator.registry();
    Json(HealthResponse {
        status: "ok",
        rooms: registry.room_count(),
        connections: registry.connection_count(),
        waiting: state.matchmaking.len(),
    })
}
