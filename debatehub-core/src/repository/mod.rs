//! Durable room, turn and event storage
//!
//! The signaling engine only talks to [`RoomStore`]. Slot atomicity lives in
//! the store: `get_or_create_room` is create-if-absent and
//! `claim_second_identity` only writes while the slot is still empty.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::models::{Role, Room, RoomCode, RoomEventKind, Turn};
use crate::Result;

pub use memory::MemoryRoomStore;
pub use postgres::PgRoomStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Return the room, creating it with `first_identity` when the code is unseen
    async fn get_or_create_room(&self, code: &RoomCode, first_identity: &str) -> Result<Room>;

    /// Fill the second slot with `identity` if it is still empty, and return
    /// the room as stored afterwards
    async fn claim_second_identity(&self, code: &RoomCode, identity: &str) -> Result<Room>;

    async fn room_exists(&self, code: &RoomCode) -> Result<bool>;

    async fn record_event(
        &self,
        code: &RoomCode,
        identity: &str,
        kind: RoomEventKind,
        metadata: JsonValue,
    ) -> Result<()>;

    async fn append_turn(
        &self,
        code: &RoomCode,
        identity: &str,
        role: Role,
        text: &str,
    ) -> Result<Turn>;

    /// Latest `limit` turns, oldest first
    async fn list_turns(&self, code: &RoomCode, limit: usize) -> Result<Vec<Turn>>;
}
