//! Room session lifecycle
//!
//! A connection moves `Connecting -> Admitted -> Active -> Closed`.
//! [`RoomCoordinator::connect`] covers the first two steps: role assignment
//! against the durable store, then admission into the registry. The returned
//! [`RoomSession`] handles inbound frames until the transport closes or the
//! session is evicted, and then cleans up exactly once.

use async_trait::async_trait;
use debatehub_core::{
    models::{ConnectionId, IdentityClaims, Participant, Role, RoomCode, RoomEventKind},
    repository::RoomStore,
    resilience::with_retry,
    service::RoleAssigner,
};
use serde_json::json;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::ClientMessage;
use crate::registry::{ConnectionRegistry, OutboundSender};
use crate::router::{BroadcastRouter, SideEffect};
use crate::Result;

/// Inbound half of a signaling transport
#[async_trait]
pub trait SignalStream: Send {
    /// Next text frame. `None` once the peer has closed the connection.
    async fn recv(&mut self) -> Option<std::result::Result<String, String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Admitted = 1,
    Active = 2,
    Closed = 3,
}

impl SessionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Admitted,
            2 => Self::Active,
            _ => Self::Closed,
        }
    }
}

/// Admits connections into rooms and owns the shared room state
#[derive(Clone)]
pub struct RoomCoordinator {
    registry: ConnectionRegistry,
    router: BroadcastRouter,
    roles: RoleAssigner,
    store: Arc<dyn RoomStore>,
}

impl RoomCoordinator {
    #[must_use]
    pub fn new(
        registry: ConnectionRegistry,
        roles: RoleAssigner,
        store: Arc<dyn RoomStore>,
        max_chat_length: usize,
    ) -> Self {
        Self {
            router: BroadcastRouter::new(registry.clone(), max_chat_length),
            registry,
            roles,
            store,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Assign a role and admit the connection
    ///
    /// On success the `room_state` snapshot is already queued on `sender`.
    /// On failure nothing was registered or broadcast; the caller closes the
    /// transport with [`crate::Error::close_code`].
    pub async fn connect(
        &self,
        room_code: RoomCode,
        claims: IdentityClaims,
        sender: OutboundSender,
    ) -> Result<RoomSession> {
        let connection_id = ConnectionId::new();
        debug!(
            room_code = %room_code,
            identity = %claims.identity,
            connection_id = %connection_id,
            "Connecting"
        );

        let role = self.roles.assign_role(&room_code, &claims.identity).await?;

        let participant = Participant::new(connection_id.clone(), &claims, role);
        let cancel = CancellationToken::new();
        let admission = self
            .registry
            .admit(&room_code, participant, sender, cancel.clone())?;

        for old in &admission.evicted {
            self.spawn_side_effect(
                &room_code,
                &old.identity,
                role,
                SideEffect::RecordEvent {
                    kind: RoomEventKind::Evicted,
                    metadata: json!({ "connection_id": old.connection_id }),
                },
            );
        }
        self.spawn_side_effect(
            &room_code,
            &claims.identity,
            role,
            SideEffect::RecordEvent {
                kind: RoomEventKind::Join,
                metadata: json!({ "role": role, "connection_id": connection_id }),
            },
        );

        Ok(RoomSession {
            coordinator: self.clone(),
            room_code,
            connection_id,
            identity: claims.identity,
            role,
            cancel,
            state: Arc::new(AtomicU8::new(SessionState::Admitted as u8)),
        })
    }

    /// Run a durable write in the background
    ///
    /// Transient failures (including a lost turn-number race) are retried
    /// under the store retry policy; what still fails is only logged.
    fn spawn_side_effect(&self, room_code: &RoomCode, identity: &str, role: Role, effect: SideEffect) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(room_code = %room_code, "No runtime, side effect skipped");
            return;
        };
        let store = Arc::clone(&self.store);
        let retry = *self.roles.retry_policy();
        let room_code = room_code.clone();
        let identity = identity.to_string();

        handle.spawn(async move {
            let result = match effect {
                SideEffect::RecordEvent { kind, metadata } => {
                    with_retry("record_event", &retry, || {
                        store.record_event(&room_code, &identity, kind, metadata.clone())
                    })
                    .await
                }
                SideEffect::AppendTurn { text } => {
                    with_retry("append_turn", &retry, || {
                        store.append_turn(&room_code, &identity, role, &text)
                    })
                    .await
                    .map(|turn| {
                        debug!(room_code = %room_code, turn_number = turn.turn_number, "Turn stored");
                    })
                }
            };
            if let Err(e) = result {
                warn!(room_code = %room_code, identity = %identity, error = %e, "Best-effort store write failed");
            }
        });
    }
}

/// One admitted connection
pub struct RoomSession {
    coordinator: RoomCoordinator,
    room_code: RoomCode,
    connection_id: ConnectionId,
    identity: String,
    role: Role,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
}

impl RoomSession {
    #[must_use]
    pub const fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    #[must_use]
    pub const fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Cancelled on eviction by a newer connection and on server shutdown
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Decode and route one inbound text frame
    ///
    /// Malformed and unknown frames are logged and ignored.
    pub fn handle_text(&self, text: &str) {
        if self.state() == SessionState::Closed {
            return;
        }
        let message = match ClientMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    room_code = %self.room_code,
                    connection_id = %self.connection_id,
                    error = %e,
                    "Ignoring malformed frame"
                );
                return;
            }
        };

        let _ = self.state.compare_exchange(
            SessionState::Admitted as u8,
            SessionState::Active as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        if let Some(effect) =
            self.coordinator
                .router
                .dispatch(&self.room_code, &self.connection_id, message)
        {
            self.coordinator
                .spawn_side_effect(&self.room_code, &self.identity, self.role, effect);
        }
    }

    /// Process inbound frames until the peer closes or the session is cancelled
    pub async fn run<S: SignalStream + ?Sized>(&self, stream: &mut S) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!(
                        room_code = %self.room_code,
                        connection_id = %self.connection_id,
                        "Session cancelled by the server"
                    );
                    break;
                }
                frame = stream.recv() => match frame {
                    Some(Ok(text)) => self.handle_text(&text),
                    Some(Err(e)) => {
                        warn!(connection_id = %self.connection_id, error = %e, "Transport error");
                        break;
                    }
                    None => {
                        debug!(connection_id = %self.connection_id, "Client disconnected");
                        break;
                    }
                },
            }
        }
        self.close();
    }

    /// Leave the room. Only the first call has any effect.
    ///
    /// Returns whether this call performed the cleanup.
    pub fn close(&self) -> bool {
        let previous = self.state.swap(SessionState::Closed as u8, Ordering::AcqRel);
        if previous == SessionState::Closed as u8 {
            return false;
        }

        // Evicted sessions are already gone from the registry
        if let Some(left) = self
            .coordinator
            .registry
            .remove(&self.room_code, &self.connection_id)
        {
            self.coordinator.spawn_side_effect(
                &self.room_code,
                &left.identity,
                self.role,
                SideEffect::RecordEvent {
                    kind: RoomEventKind::Leave,
                    metadata: json!({ "connection_id": self.connection_id }),
                },
            );
        }
        info!(
            room_code = %self.room_code,
            identity = %self.identity,
            connection_id = %self.connection_id,
            "Session closed"
        );
        true
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_code", &self.room_code)
            .field("connection_id", &self.connection_id)
            .field("identity", &self.identity)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CloseCode, Outbound, ServerMessage};
    use debatehub_core::repository::MemoryRoomStore;
    use debatehub_core::resilience::RetryPolicy;
    use tokio::sync::mpsc;

    fn coordinator(store: Arc<MemoryRoomStore>) -> RoomCoordinator {
        let store: Arc<dyn RoomStore> = store;
        RoomCoordinator::new(
            ConnectionRegistry::new(),
            RoleAssigner::new(Arc::clone(&store), RetryPolicy::default()),
            store,
            2000,
        )
    }

    struct ScriptedStream(mpsc::UnboundedReceiver<String>);

    #[async_trait]
    impl SignalStream for ScriptedStream {
        async fn recv(&mut self) -> Option<std::result::Result<String, String>> {
            self.0.recv().await.map(Ok)
        }
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let coordinator = coordinator(Arc::new(MemoryRoomStore::new()));
        let code = RoomCode::parse("ABC123").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let session = coordinator
            .connect(code, IdentityClaims::new("a@x.com", "Alice"), tx)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Admitted);

        session.handle_text("not json");
        assert_eq!(session.state(), SessionState::Admitted);

        session.handle_text(r#"{"type":"toggle_audio","muted":true}"#);
        assert_eq!(session.state(), SessionState::Active);

        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_run_ends_on_disconnect_and_cleans_up() {
        let coordinator = coordinator(Arc::new(MemoryRoomStore::new()));
        let code = RoomCode::parse("ABC123").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = coordinator
            .connect(code, IdentityClaims::new("a@x.com", "Alice"), tx)
            .await
            .unwrap();

        let (frames, inbound) = mpsc::unbounded_channel();
        frames.send(r#"{"type":"chat_message","message":"hi"}"#.to_string()).unwrap();
        drop(frames);

        session.run(&mut ScriptedStream(inbound)).await;
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(coordinator.registry().room_count(), 0);
    }

    #[tokio::test]
    async fn test_run_ends_on_eviction() {
        let coordinator = coordinator(Arc::new(MemoryRoomStore::new()));
        let code = RoomCode::parse("ABC123").unwrap();
        let (tx_old, mut rx_old) = mpsc::unbounded_channel();
        let old = coordinator
            .connect(code.clone(), IdentityClaims::new("a@x.com", "Alice"), tx_old)
            .await
            .unwrap();

        let (_frames, inbound) = mpsc::unbounded_channel::<String>();
        let (tx_new, _rx_new) = mpsc::unbounded_channel();
        let run = async { old.run(&mut ScriptedStream(inbound)).await };
        let replace = async {
            coordinator
                .connect(code, IdentityClaims::new("a@x.com", "Alice"), tx_new)
                .await
                .unwrap()
        };
        let ((), new) = tokio::join!(run, replace);

        assert_eq!(old.state(), SessionState::Closed);
        assert_eq!(new.state(), SessionState::Admitted);
        assert_eq!(coordinator.registry().connection_count(), 1);

        let mut seen = Vec::new();
        while let Ok(item) = rx_old.try_recv() {
            seen.push(item);
        }
        assert!(matches!(seen.first(), Some(Outbound::Event(ServerMessage::RoomState { .. }))));
        assert_eq!(seen.last(), Some(&Outbound::Close(CloseCode::Replaced)));
    }

    #[tokio::test]
    async fn test_drop_cleans_up() {
        let coordinator = coordinator(Arc::new(MemoryRoomStore::new()));
        let code = RoomCode::parse("ABC123").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = coordinator
            .connect(code, IdentityClaims::new("a@x.com", "Alice"), tx)
            .await
            .unwrap();
        assert_eq!(coordinator.registry().connection_count(), 1);

        drop(session);
        assert_eq!(coordinator.registry().connection_count(), 0);
    }
}
