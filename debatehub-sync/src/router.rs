use debatehub_core::models::{ConnectionId, Participant, RoomCode, RoomEventKind};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::events::{ClientMessage, ServerMessage};
use crate::registry::ConnectionRegistry;

/// Durable write requested by a routed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    RecordEvent {
        kind: RoomEventKind,
        metadata: JsonValue,
    },
    AppendTurn {
        text: String,
    },
}

/// Maps inbound room messages to outbound events and fans them out
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: ConnectionRegistry,
    max_chat_length: usize,
}

impl BroadcastRouter {
    #[must_use]
    pub const fn new(registry: ConnectionRegistry, max_chat_length: usize) -> Self {
        Self {
            registry,
            max_chat_length,
        }
    }

    /// Route one inbound message from `connection_id`
    ///
    /// Sender fields come from the registry record. Returns the durable
    /// write the message asks for, if any. Messages from connections no
    /// longer registered are dropped.
    pub fn dispatch(
        &self,
        room_code: &RoomCode,
        connection_id: &ConnectionId,
        message: ClientMessage,
    ) -> Option<SideEffect> {
        let Some(sender) = self.registry.participant(room_code, connection_id) else {
            debug!(room_code = %room_code, connection_id = %connection_id, "Message from unregistered connection dropped");
            return None;
        };

        let (outbound, effect) = self.translate(sender, message)?;
        let delivered = self
            .registry
            .broadcast(room_code, &outbound, Some(connection_id));
        debug!(
            room_code = %room_code,
            connection_id = %connection_id,
            event_type = outbound.event_type(),
            delivered,
            "Message routed"
        );
        effect
    }

    fn translate(
        &self,
        sender: Participant,
        message: ClientMessage,
    ) -> Option<(ServerMessage, Option<SideEffect>)> {
        match message {
            ClientMessage::ChatMessage { message } => {
                if message.trim().is_empty() || message.chars().count() > self.max_chat_length {
                    debug!(connection_id = %sender.connection_id, "Chat message ignored");
                    return None;
                }
                Some((ServerMessage::ChatMessage { message, sender }, None))
            }
            ClientMessage::ToggleAudio { muted } => Some((
                ServerMessage::AudioStatus {
                    muted,
                    user_id: sender.identity,
                },
                Some(SideEffect::RecordEvent {
                    kind: RoomEventKind::ToggleAudio,
                    metadata: json!({ "muted": muted }),
                }),
            )),
            ClientMessage::SpeakingStatus { is_speaking } => Some((
                ServerMessage::SpeakingStatus {
                    is_speaking,
                    user_id: ServerMessage::OPPONENT.to_string(),
                },
                Some(SideEffect::RecordEvent {
                    kind: RoomEventKind::SpeakingStatus,
                    metadata: json!({ "is_speaking": is_speaking }),
                }),
            )),
            ClientMessage::SpeechTranscript { transcript } => {
                if transcript.trim().is_empty() {
                    return None;
                }
                let effect = SideEffect::AppendTurn {
                    text: transcript.clone(),
                };
                Some((
                    ServerMessage::SpeechTranscript { sender, transcript },
                    Some(effect),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Outbound;
    use debatehub_core::models::{IdentityClaims, Role};
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio_util::sync::CancellationToken;

    struct Room {
        router: BroadcastRouter,
        code: RoomCode,
        a: Participant,
        rx_a: UnboundedReceiver<Outbound>,
        rx_b: UnboundedReceiver<Outbound>,
    }

    fn room() -> Room {
        let registry = ConnectionRegistry::new();
        let code = RoomCode::parse("ABC123").unwrap();
        let join = |conn: &str, identity: &str, role| {
            let p = Participant::new(
                ConnectionId::from_string(conn.to_string()),
                &IdentityClaims::new(identity, identity),
                role,
            );
            let (tx, mut rx) = mpsc::unbounded_channel();
            registry
                .admit(&code, p.clone(), tx, CancellationToken::new())
                .unwrap();
            while rx.try_recv().is_ok() {}
            (p, rx)
        };
        let (a, rx_a) = join("c1", "a@x.com", Role::Challenger);
        let (_, rx_b) = join("c2", "b@y.com", Role::Defender);
        let mut room = Room {
            router: BroadcastRouter::new(registry, 10),
            code,
            a,
            rx_a,
            rx_b,
        };
        while room.rx_a.try_recv().is_ok() {}
        room
    }

    fn next_event(rx: &mut UnboundedReceiver<Outbound>) -> Option<ServerMessage> {
        match rx.try_recv() {
            Ok(Outbound::Event(msg)) => Some(msg),
            _ => None,
        }
    }

    #[test]
    fn test_every_broadcast_type_skips_sender() {
        let mut room = room();
        let messages = [
            ClientMessage::ChatMessage {
                message: "hello".to_string(),
            },
            ClientMessage::ToggleAudio { muted: true },
            ClientMessage::SpeakingStatus { is_speaking: true },
            ClientMessage::SpeechTranscript {
                transcript: "my point".to_string(),
            },
        ];

        for message in messages {
            room.router
                .dispatch(&room.code, &room.a.connection_id, message);
            assert!(next_event(&mut room.rx_b).is_some());
            assert!(next_event(&mut room.rx_a).is_none());
        }
    }

    #[test]
    fn test_sender_fields_are_authoritative() {
        let mut room = room();
        room.router.dispatch(
            &room.code,
            &room.a.connection_id,
            ClientMessage::ChatMessage {
                message: "hi".to_string(),
            },
        );
        assert_eq!(
            next_event(&mut room.rx_b),
            Some(ServerMessage::ChatMessage {
                message: "hi".to_string(),
                sender: room.a.clone(),
            })
        );

        room.router.dispatch(
            &room.code,
            &room.a.connection_id,
            ClientMessage::SpeakingStatus { is_speaking: false },
        );
        assert_eq!(
            next_event(&mut room.rx_b),
            Some(ServerMessage::SpeakingStatus {
                is_speaking: false,
                user_id: "opponent".to_string(),
            })
        );
    }

    #[test]
    fn test_side_effects() {
        let room = room();
        let effect = room.router.dispatch(
            &room.code,
            &room.a.connection_id,
            ClientMessage::SpeechTranscript {
                transcript: "rebuttal".to_string(),
            },
        );
        assert_eq!(
            effect,
            Some(SideEffect::AppendTurn {
                text: "rebuttal".to_string()
            })
        );

        let effect = room.router.dispatch(
            &room.code,
            &room.a.connection_id,
            ClientMessage::ToggleAudio { muted: false },
        );
        assert!(matches!(
            effect,
            Some(SideEffect::RecordEvent {
                kind: RoomEventKind::ToggleAudio,
                ..
            })
        ));

        let effect = room.router.dispatch(
            &room.code,
            &room.a.connection_id,
            ClientMessage::ChatMessage {
                message: "hi".to_string(),
            },
        );
        assert!(effect.is_none());
    }

    #[test]
    fn test_empty_and_oversized_messages_dropped() {
        let mut room = room();
        for message in [
            ClientMessage::ChatMessage {
                message: "   ".to_string(),
            },
            ClientMessage::ChatMessage {
                message: "x".repeat(11),
            },
            ClientMessage::SpeechTranscript {
                transcript: String::new(),
            },
        ] {
            assert!(room
                .router
                .dispatch(&room.code, &room.a.connection_id, message)
                .is_none());
        }
        assert!(next_event(&mut room.rx_b).is_none());
    }

    #[test]
    fn test_unregistered_sender_dropped() {
        let mut room = room();
        let ghost = ConnectionId::from_string("ghost".to_string());
        room.router.dispatch(
            &room.code,
            &ghost,
            ClientMessage::ToggleAudio { muted: true },
        );
        assert!(next_event(&mut room.rx_b).is_none());
    }
}
