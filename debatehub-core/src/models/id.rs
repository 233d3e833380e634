use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Shortest accepted room code
pub const ROOM_CODE_MIN_LEN: usize = 6;

/// Longest accepted room code (matches the `debate_rooms.room_code` column)
pub const ROOM_CODE_MAX_LEN: usize = 16;

/// Alphabet used for generated room codes
const ROOM_CODE_ALPHABET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Room code: 6-16 ASCII alphanumerics, normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate and normalize a client-supplied code
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if !(ROOM_CODE_MIN_LEN..=ROOM_CODE_MAX_LEN).contains(&trimmed.len()) {
            return Err(Error::InvalidRoomCode(format!(
                "room code must be {ROOM_CODE_MIN_LEN}-{ROOM_CODE_MAX_LEN} characters"
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidRoomCode(
                "room code must be alphanumeric".to_string(),
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Generate a random code of `len` characters (clamped to the valid range)
    #[must_use]
    pub fn generate(len: usize) -> Self {
        let len = len.clamp(ROOM_CODE_MIN_LEN, ROOM_CODE_MAX_LEN);
        Self(nanoid!(len, &ROOM_CODE_ALPHABET))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Identifier of one live transport connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(nanoid!(12))
    }

    #[must_use]
    pub const fn from_string(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_is_upper_cased() {
        let code = RoomCode::parse("abc123").unwrap();
        assert_eq!(code.as_str(), "ABC123");
        assert_eq!(code, RoomCode::parse("ABC123").unwrap());
    }

    #[test]
    fn test_room_code_length_bounds() {
        assert!(RoomCode::parse("ab12").is_err());
        assert!(RoomCode::parse("a".repeat(17).as_str()).is_err());
        assert!(RoomCode::parse("a".repeat(16).as_str()).is_ok());
    }

    #[test]
    fn test_room_code_rejects_symbols() {
        let err = RoomCode::parse("abc-123").unwrap_err();
        assert!(matches!(err, Error::InvalidRoomCode(_)));
    }

    #[test]
    fn test_generated_room_code_round_trips() {
        let code = RoomCode::generate(6);
        assert_eq!(code.as_str().len(), 6);
        assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 12);
    }
}
