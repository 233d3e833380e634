use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::RoomStore;
use crate::models::{Role, Room, RoomCode, RoomEventKind, Turn};
use crate::{Error, Result};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_room(&self, code: &RoomCode) -> Result<Option<Room>> {
        let row = sqlx::query(
            "SELECT room_code, first_identity, second_identity, created_at
             FROM debate_rooms
             WHERE room_code = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_room(&row)).transpose()
    }

    fn row_to_room(row: &PgRow) -> Result<Room> {
        let code: String = row.try_get("room_code")?;
        Ok(Room {
            code: RoomCode::parse(&code)?,
            first_identity: row.try_get("first_identity")?,
            second_identity: row.try_get("second_identity")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_turn(row: &PgRow) -> Result<Turn> {
        let code: String = row.try_get("room_code")?;
        let role: String = row.try_get("role")?;
        Ok(Turn {
            room_code: RoomCode::parse(&code)?,
            turn_number: row.try_get("turn_number")?,
            identity: row.try_get("identity")?,
            role: role.parse()?,
            text: row.try_get("text")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn get_or_create_room(&self, code: &RoomCode, first_identity: &str) -> Result<Room> {
        sqlx::query(
            "INSERT INTO debate_rooms (room_code, first_identity, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (room_code) DO NOTHING",
        )
        .bind(code.as_str())
        .bind(first_identity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.fetch_room(code)
            .await?
            .ok_or_else(|| Error::Internal(format!("room {code} missing after insert")))
    }

    async fn claim_second_identity(&self, code: &RoomCode, identity: &str) -> Result<Room> {
        sqlx::query(
            "UPDATE debate_rooms
             SET second_identity = $2
             WHERE room_code = $1 AND second_identity IS NULL AND first_identity <> $2",
        )
        .bind(code.as_str())
        .bind(identity)
        .execute(&self.pool)
        .await?;

        self.fetch_room(code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("room {code}")))
    }

    async fn room_exists(&self, code: &RoomCode) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM debate_rooms WHERE room_code = $1)")
                .bind(code.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn record_event(
        &self,
        code: &RoomCode,
        identity: &str,
        kind: RoomEventKind,
        metadata: JsonValue,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO room_events (room_code, identity, event_type, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(code.as_str())
        .bind(identity)
        .bind(kind.as_str())
        .bind(metadata)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_turn(
        &self,
        code: &RoomCode,
        identity: &str,
        role: Role,
        text: &str,
    ) -> Result<Turn> {
        let mut tx = self.pool.begin().await?;

        // Lock the room row so turn numbers are assigned one writer at a time
        let locked = sqlx::query("SELECT room_code FROM debate_rooms WHERE room_code = $1 FOR UPDATE")
            .bind(code.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(Error::NotFound(format!("room {code}")));
        }

        let row = sqlx::query(
            "INSERT INTO debate_turns (room_code, turn_number, identity, role, text, created_at)
             SELECT $1, COALESCE(MAX(turn_number), 0) + 1, $2, $3, $4, $5
             FROM debate_turns
             WHERE room_code = $1
             RETURNING room_code, turn_number, identity, role, text, created_at",
        )
        .bind(code.as_str())
        .bind(identity)
        .bind(role.as_str())
        .bind(text)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Self::row_to_turn(&row)
    }

    async fn list_turns(&self, code: &RoomCode, limit: usize) -> Result<Vec<Turn>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT room_code, turn_number, identity, role, text, created_at
             FROM debate_turns
             WHERE room_code = $1
             ORDER BY turn_number DESC
             LIMIT $2",
        )
        .bind(code.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }
}
