use serde::{Deserialize, Serialize};

use super::id::ConnectionId;
use super::room::Role;

/// Verified identity of the user behind a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Token subject
    pub subject: String,
    /// Stable identity used for room slots (email, falling back to subject)
    pub identity: String,
    /// Display name
    pub name: String,
}

impl IdentityClaims {
    #[must_use]
    pub fn new(identity: impl Into<String>, name: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            subject: identity.clone(),
            identity,
            name: name.into(),
        }
    }
}

/// Live, per-connection presence of one identity in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    #[serde(rename = "user_id")]
    pub identity: String,
    #[serde(rename = "user_name")]
    pub name: String,
    pub role: Role,
    pub active: bool,
}

impl Participant {
    #[must_use]
    pub fn new(connection_id: ConnectionId, claims: &IdentityClaims, role: Role) -> Self {
        Self {
            connection_id,
            identity: claims.identity.clone(),
            name: claims.name.clone(),
            role,
            active: true,
        }
    }
}
