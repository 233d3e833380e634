use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::id::RoomCode;
use super::room::Role;

/// One spoken argument in a debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub room_code: RoomCode,
    /// 1-based, assigned by the store per room
    pub turn_number: i32,
    pub identity: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of analytics event recorded against a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomEventKind {
    Join,
    Leave,
    Evicted,
    ToggleAudio,
    SpeakingStatus,
}

impl RoomEventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Evicted => "evicted",
            Self::ToggleAudio => "toggle_audio",
            Self::SpeakingStatus => "speaking_status",
        }
    }
}

impl std::fmt::Display for RoomEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded room event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub room_code: RoomCode,
    pub identity: String,
    pub kind: RoomEventKind,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}
