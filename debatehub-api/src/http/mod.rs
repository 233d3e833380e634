// Module: http
// Signaling WebSockets plus the few plain HTTP routes around them

pub mod error;
pub mod health;
pub mod identity;
pub mod matchmaking;
pub mod transcribe;
pub mod turns;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use debatehub_core::{
    repository::RoomStore,
    service::{Authenticator, SpeechToText},
};
use debatehub_sync::{MatchmakingQueue, RoomCoordinator};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RoomCoordinator,
    pub matchmaking: MatchmakingQueue,
    /// Durable store, read directly for turn history
    pub store: Arc<dyn RoomStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub transcriber: Arc<dyn SpeechToText>,
    /// Largest inbound WebSocket frame accepted
    pub max_message_bytes: usize,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::create_health_router())
        .route("/ws/room/{room_code}", get(websocket::room_websocket))
        .route("/ws/room/{room_code}/", get(websocket::room_websocket))
        .route("/ws/matchmaking", get(matchmaking::matchmaking_websocket))
        .route("/ws/matchmaking/", get(matchmaking::matchmaking_websocket))
        .route("/api/transcribe", post(transcribe::transcribe))
        .route("/api/me", get(identity::me))
        .route("/api/rooms/{room_code}/turns", get(turns::list_turns))
        .route("/api/rooms/{room_code}/turns/", get(turns::list_turns))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
