use debatehub_core::models::{Participant, RoomCode};
use serde::{Deserialize, Serialize};

/// WebSocket close codes used by the signaling endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    /// Unexpected server-side failure
    InternalError,
    /// Room already holds two identities or two live connections
    RoomFull,
    /// A newer connection of the same identity took over
    Replaced,
    /// Durable store unreachable during admission
    StorageUnavailable,
}

impl CloseCode {
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::InternalError => 1011,
            Self::RoomFull => 4001,
            Self::Replaced => 4002,
            Self::StorageUnavailable => 4003,
        }
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Normal => "bye",
            Self::InternalError => "internal error",
            Self::RoomFull => "room full",
            Self::Replaced => "replaced by a newer connection",
            Self::StorageUnavailable => "storage unavailable",
        }
    }
}

/// Inbound room frames
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ChatMessage {
        message: String,
    },
    ToggleAudio {
        muted: bool,
    },
    SpeakingStatus {
        #[serde(rename = "isSpeaking")]
        is_speaking: bool,
    },
    SpeechTranscript {
        transcript: String,
    },
}

impl ClientMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Outbound room frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Private snapshot sent once on admission
    RoomState {
        #[serde(rename = "self")]
        me: Participant,
        participants: Vec<Participant>,
    },
    ParticipantJoined {
        participant: Participant,
    },
    ParticipantLeft {
        user_id: String,
        user_name: String,
    },
    ChatMessage {
        message: String,
        sender: Participant,
    },
    AudioStatus {
        muted: bool,
        user_id: String,
    },
    SpeakingStatus {
        #[serde(rename = "isSpeaking")]
        is_speaking: bool,
        /// Always [`ServerMessage::OPPONENT`]; a room has one peer
        user_id: String,
    },
    SpeechTranscript {
        sender: Participant,
        transcript: String,
    },
}

impl ServerMessage {
    /// Placeholder identity carried by `speaking_status`
    pub const OPPONENT: &'static str = "opponent";

    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RoomState { .. } => "room_state",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
            Self::ChatMessage { .. } => "chat_message",
            Self::AudioStatus { .. } => "audio_status",
            Self::SpeakingStatus { .. } => "speaking_status",
            Self::SpeechTranscript { .. } => "speech_transcript",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Item on a connection's outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Event(ServerMessage),
    /// Close the transport with this code and stop writing
    Close(CloseCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    FindMatch,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchmakingRequest {
    pub action: MatchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchmakingResponse {
    Waiting,
    Matched { room_code: RoomCode },
    Cancelled,
    Error { message: String },
}
