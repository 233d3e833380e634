use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::RoomCode;
use crate::Error;

/// Debate role, bound to an identity slot of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Challenger,
    Defender,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Challenger => "challenger",
            Self::Defender => "defender",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "challenger" => Ok(Self::Challenger),
            "defender" => Ok(Self::Defender),
            other => Err(Error::InvalidInput(format!("unknown role: {other}"))),
        }
    }
}

/// Durable two-identity room record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub first_identity: String,
    pub second_identity: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn new(code: RoomCode, first_identity: String) -> Self {
        Self {
            code,
            first_identity,
            second_identity: None,
            created_at: Utc::now(),
        }
    }

    /// Role held by `identity`, if it owns one of the two slots
    #[must_use]
    pub fn role_of(&self, identity: &str) -> Option<Role> {
        if self.first_identity == identity {
            Some(Role::Challenger)
        } else if self.second_identity.as_deref() == Some(identity) {
            Some(Role::Defender)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.second_identity.is_some()
    }
}
