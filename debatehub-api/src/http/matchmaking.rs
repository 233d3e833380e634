//! Anonymous matchmaking WebSocket

use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use debatehub_core::models::ConnectionId;
use debatehub_sync::{MatchmakingRequest, MatchmakingResponse};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::http::AppState;

/// `ws://host/ws/matchmaking/`: send `{"action":"find_match"}`, receive
/// `waiting` and later `matched` with a room code
pub async fn matchmaking_websocket(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_matchmaking_socket(socket, state))
}

async fn handle_matchmaking_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    let (mut sink, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<MatchmakingResponse>();

    info!(connection_id = %connection_id, "Matchmaking connection established");

    let writer = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let json = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to encode matchmaking response");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "Matchmaking socket error");
                break;
            }
        };

        let response = match serde_json::from_str::<MatchmakingRequest>(text.as_str()) {
            Ok(request) => state.matchmaking.handle(&connection_id, &tx, request).await,
            Err(e) => MatchmakingResponse::Error {
                message: format!("invalid request: {e}"),
            },
        };
        if tx.send(response).is_err() {
            break;
        }
    }

    if state.matchmaking.remove(&connection_id) {
        debug!(connection_id = %connection_id, "Removed from matchmaking queue");
    }
    drop(tx);
    let _ = writer.await;
    info!(connection_id = %connection_id, "Matchmaking connection closed");
}
