//! Room signaling WebSocket
//!
//! Room code and token are checked before the upgrade. After the upgrade the
//! connection is handed to the room coordinator; a writer task drains the
//! connection's outbound queue into the socket while `RoomSession::run`
//! consumes inbound frames.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, CloseFrame, Message, Utf8Bytes, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use debatehub_core::models::{IdentityClaims, RoomCode};
use debatehub_sync::{CloseCode, Outbound, SignalStream};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::http::identity::{authenticate, TokenQuery};
use crate::http::{AppError, AppResult, AppState};

/// How long the writer gets to flush queued frames after the session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Inbound half of an upgraded socket
pub struct WebSocketStream {
    receiver: SplitStream<WebSocket>,
}

impl WebSocketStream {
    #[must_use]
    pub const fn new(receiver: SplitStream<WebSocket>) -> Self {
        Self { receiver }
    }
}

#[async_trait::async_trait]
impl SignalStream for WebSocketStream {
    async fn recv(&mut self) -> Option<Result<String, String>> {
        loop {
            match self.receiver.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => return Some(Err(format!("WebSocket error: {e}"))),
                // Binary, ping and pong frames carry no signaling payload
                Some(Ok(_)) => {}
            }
        }
    }
}

pub(crate) fn close_message(code: CloseCode) -> Message {
    Message::Close(Some(CloseFrame {
        code: code.as_u16(),
        reason: Utf8Bytes::from_static(code.reason()),
    }))
}

/// WebSocket handler for a debate room
///
/// `ws://host/ws/room/{room_code}?token={jwt}`; the token may also be sent
/// as `Authorization: Bearer`.
pub async fn room_websocket(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let room_code = RoomCode::parse(&room_code)?;
    let claims = authenticate(&state, &query, &headers).await?;
    let ws = ws.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    Ok(ws
        .max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_room_socket(socket, state, room_code, claims)))
}

async fn handle_room_socket(
    mut socket: WebSocket,
    state: AppState,
    room_code: RoomCode,
    claims: IdentityClaims,
) {
    let (tx, rx) = mpsc::unbounded_channel();

    let session = match state
        .coordinator
        .connect(room_code.clone(), claims.clone(), tx)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            info!(
                room_code = %room_code,
                identity = %claims.identity,
                error = %e,
                "Room admission rejected"
            );
            if let Err(e) = socket.send(close_message(e.close_code())).await {
                debug!(error = %e, "Failed to send close frame");
            }
            return;
        }
    };

    info!(
        room_code = %room_code,
        identity = %claims.identity,
        connection_id = %session.connection_id(),
        role = %session.role(),
        "WebSocket connection established"
    );

    let (sink, receiver) = socket.split();
    let mut writer = tokio::spawn(write_outbound(sink, rx));

    let mut stream = WebSocketStream::new(receiver);
    tokio::select! {
        () = session.run(&mut stream) => {}
        _ = &mut writer => {
            debug!(connection_id = %session.connection_id(), "Writer stopped first");
            session.close();
        }
    }

    let connection_id = session.connection_id().clone();
    // Dropping the session releases the last sender once it is unregistered
    drop(session);
    if !writer.is_finished() && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(
        room_code = %room_code,
        connection_id = %connection_id,
        "WebSocket connection closed"
    );
}

async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(outbound) = rx.recv().await {
        let message = match outbound {
            Outbound::Event(event) => match event.to_json() {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    error!(event_type = event.event_type(), error = %e, "Failed to encode event");
                    continue;
                }
            },
            Outbound::Close(code) => {
                if let Err(e) = sink.send(close_message(code)).await {
                    debug!(error = %e, "Failed to send close frame");
                }
                return;
            }
        };
        if let Err(e) = sink.send(message).await {
            warn!(error = %e, "Failed to send WebSocket message");
            return;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use crate::http::{create_router, test_support};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    async fn status(uri: &str) -> StatusCode {
        create_router(test_support::state())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_invalid_room_code_rejected_before_upgrade() {
        assert_eq!(status("/ws/room/ab-12!?token=x").await, StatusCode::BAD_REQUEST);
        assert_eq!(status("/ws/room/abc").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_token_rejected_before_upgrade() {
        assert_eq!(status("/ws/room/ABC123").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_before_upgrade() {
        assert_eq!(
            status("/ws/room/ABC123?token=not.a.jwt").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_close_message() {
        match super::close_message(debatehub_sync::CloseCode::Replaced) {
            axum::extract::ws::Message::Close(Some(frame)) => {
                assert_eq!(frame.code, 4002);
                assert_eq!(frame.reason.as_str(), "replaced by a newer connection");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
