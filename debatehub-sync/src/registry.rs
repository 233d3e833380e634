use dashmap::DashMap;
use debatehub_core::models::{ConnectionId, Participant, RoomCode};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{CloseCode, Outbound, ServerMessage};
use crate::{Error, Result};

/// Live connections a room admits at once
pub const ROOM_CAPACITY: usize = 2;

/// Outbound queue of one connection
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// One live connection in a room
#[derive(Debug, Clone)]
struct Member {
    participant: Participant,
    sender: OutboundSender,
    cancel: CancellationToken,
}

impl Member {
    fn send(&self, room_code: &RoomCode, message: ServerMessage) -> bool {
        let event_type = message.event_type();
        match self.sender.send(Outbound::Event(message)) {
            Ok(()) => {
                debug!(
                    room_code = %room_code,
                    connection_id = %self.participant.connection_id,
                    event_type,
                    "Event queued"
                );
                true
            }
            Err(_) => {
                // The session's own cleanup removes it
                warn!(
                    room_code = %room_code,
                    connection_id = %self.participant.connection_id,
                    event_type,
                    "Outbound queue closed, event dropped"
                );
                false
            }
        }
    }
}

type Members = IndexMap<ConnectionId, Member>;

/// Result of a successful admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Older connections of the same identity that were closed
    pub evicted: Vec<Participant>,
    /// Members already present when the new connection joined
    pub peers: Vec<Participant>,
}

/// Per-room live membership
///
/// Every read-modify-write on a room runs under that room's `DashMap` entry
/// guard, which is the room's critical section. Nothing here awaits, so the
/// guard is never held across a suspension point.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    rooms: Arc<DashMap<RoomCode, Members>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `participant` into `room_code`
    ///
    /// Evicts other connections of the same identity, enforces capacity,
    /// inserts, queues the private `room_state` snapshot and then the
    /// `participant_joined` broadcast, all in one critical section.
    pub fn admit(
        &self,
        room_code: &RoomCode,
        participant: Participant,
        sender: OutboundSender,
        cancel: CancellationToken,
    ) -> Result<Admission> {
        let mut entry = self.rooms.entry(room_code.clone()).or_default();
        let members = entry.value_mut();

        let stale: Vec<ConnectionId> = members
            .values()
            .filter(|m| {
                m.participant.identity == participant.identity
                    && m.participant.connection_id != participant.connection_id
            })
            .map(|m| m.participant.connection_id.clone())
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for connection_id in stale {
            if let Some(old) = members.shift_remove(&connection_id) {
                let _ = old.sender.send(Outbound::Close(CloseCode::Replaced));
                old.cancel.cancel();
                info!(
                    room_code = %room_code,
                    identity = %old.participant.identity,
                    connection_id = %connection_id,
                    "Evicted older connection of the same identity"
                );
                evicted.push(old.participant);
            }
        }

        if members.len() >= ROOM_CAPACITY {
            warn!(
                room_code = %room_code,
                identity = %participant.identity,
                "Room at capacity, connection rejected"
            );
            return Err(Error::RoomFull(room_code.to_string()));
        }

        let peers: Vec<Participant> = members.values().map(|m| m.participant.clone()).collect();
        let member = Member {
            participant: participant.clone(),
            sender,
            cancel,
        };

        member.send(
            room_code,
            ServerMessage::RoomState {
                me: participant.clone(),
                participants: peers.clone(),
            },
        );
        for peer in members.values() {
            peer.send(
                room_code,
                ServerMessage::ParticipantJoined {
                    participant: participant.clone(),
                },
            );
        }
        members.insert(participant.connection_id.clone(), member);

        info!(
            room_code = %room_code,
            identity = %participant.identity,
            connection_id = %participant.connection_id,
            role = %participant.role,
            members = members.len(),
            "Participant admitted"
        );

        Ok(Admission { evicted, peers })
    }

    /// Remove a connection and tell the remaining members
    ///
    /// Returns `None` when the connection is not registered (already evicted
    /// or never admitted); nothing is broadcast in that case.
    pub fn remove(&self, room_code: &RoomCode, connection_id: &ConnectionId) -> Option<Participant> {
        let removed = {
            let mut members = self.rooms.get_mut(room_code)?;
            let removed = members.shift_remove(connection_id)?;
            for peer in members.values() {
                peer.send(
                    room_code,
                    ServerMessage::ParticipantLeft {
                        user_id: removed.participant.identity.clone(),
                        user_name: removed.participant.name.clone(),
                    },
                );
            }
            removed
        };

        if self
            .rooms
            .remove_if(room_code, |_, members| members.is_empty())
            .is_some()
        {
            debug!(room_code = %room_code, "Room has no more members, removed");
        }

        info!(
            room_code = %room_code,
            identity = %removed.participant.identity,
            connection_id = %connection_id,
            "Participant removed"
        );
        Some(removed.participant)
    }

    /// Send `message` to every member of the room except `exclude`
    pub fn broadcast(
        &self,
        room_code: &RoomCode,
        message: &ServerMessage,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let Some(members) = self.rooms.get(room_code) else {
            return 0;
        };
        members
            .values()
            .filter(|m| Some(&m.participant.connection_id) != exclude)
            .filter(|m| m.send(room_code, message.clone()))
            .count()
    }

    /// Ask every live connection to close with `code`
    ///
    /// Members stay registered; each session unregisters itself as it winds
    /// down, so the usual leave handling still runs.
    pub fn close_all(&self, code: CloseCode) -> usize {
        let mut closed = 0;
        for room in self.rooms.iter() {
            for member in room.value().values() {
                let _ = member.sender.send(Outbound::Close(code));
                member.cancel.cancel();
                closed += 1;
            }
        }
        closed
    }

    /// Authoritative record of a registered connection
    #[must_use]
    pub fn participant(&self, room_code: &RoomCode, connection_id: &ConnectionId) -> Option<Participant> {
        self.rooms
            .get(room_code)
            .and_then(|members| members.get(connection_id).map(|m| m.participant.clone()))
    }

    /// Members of a room in admission order
    #[must_use]
    pub fn members(&self, room_code: &RoomCode) -> Vec<Participant> {
        self.rooms
            .get(room_code)
            .map(|members| members.values().map(|m| m.participant.clone()).collect())
            .unwrap_or_default()
    }

    /// Rooms with at least one live connection
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.rooms.iter().map(|r| r.value().len()).sum()
    }
}
