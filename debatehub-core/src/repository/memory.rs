use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::RoomStore;
use crate::models::{Role, Room, RoomCode, RoomEvent, RoomEventKind, Turn};
use crate::{Error, Result};

/// Process-local store used when no database is configured, and in tests
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<DashMap<RoomCode, Room>>,
    turns: Arc<DashMap<RoomCode, Vec<Turn>>>,
    events: Arc<DashMap<RoomCode, Vec<RoomEvent>>>,
}

impl MemoryRoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded for a room, oldest first
    #[must_use]
    pub fn events(&self, code: &RoomCode) -> Vec<RoomEvent> {
        self.events
            .get(code)
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn room(&self, code: &RoomCode) -> Option<Room> {
        self.rooms.get(code).map(|room| room.clone())
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn get_or_create_room(&self, code: &RoomCode, first_identity: &str) -> Result<Room> {
        let room = self
            .rooms
            .entry(code.clone())
            .or_insert_with(|| Room::new(code.clone(), first_identity.to_string()));
        Ok(room.clone())
    }

    async fn claim_second_identity(&self, code: &RoomCode, identity: &str) -> Result<Room> {
        let mut room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| Error::NotFound(format!("room {code}")))?;
        if room.second_identity.is_none() && room.first_identity != identity {
            room.second_identity = Some(identity.to_string());
        }
        Ok(room.clone())
    }

    async fn room_exists(&self, code: &RoomCode) -> Result<bool> {
        Ok(self.rooms.contains_key(code))
    }

    async fn record_event(
        &self,
        code: &RoomCode,
        identity: &str,
        kind: RoomEventKind,
        metadata: JsonValue,
    ) -> Result<()> {
        self.events.entry(code.clone()).or_default().push(RoomEvent {
            room_code: code.clone(),
            identity: identity.to_string(),
            kind,
            metadata,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn append_turn(
        &self,
        code: &RoomCode,
        identity: &str,
        role: Role,
        text: &str,
    ) -> Result<Turn> {
        let mut turns = self.turns.entry(code.clone()).or_default();
        let turn = Turn {
            room_code: code.clone(),
            turn_number: i32::try_from(turns.len() + 1)
                .map_err(|_| Error::Internal("turn counter overflow".to_string()))?,
            identity: identity.to_string(),
            role,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        turns.push(turn.clone());
        Ok(turn)
    }

    async fn list_turns(&self, code: &RoomCode, limit: usize) -> Result<Vec<Turn>> {
        Ok(self
            .turns
            .get(code)
            .map(|turns| {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            })
            .unwrap_or_default())
    }
}
