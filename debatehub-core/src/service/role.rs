use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    models::{Role, RoomCode},
    repository::RoomStore,
    resilience::{with_retry, RetryPolicy},
    Error, Result,
};

/// Decides which debate role a joining identity holds
///
/// Roles come from the durable identity slots of the room, never from join
/// order, so a reconnecting identity always gets its original role back.
#[derive(Clone)]
pub struct RoleAssigner {
    store: Arc<dyn RoomStore>,
    retry: RetryPolicy,
}

impl RoleAssigner {
    #[must_use]
    pub fn new(store: Arc<dyn RoomStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Retry policy applied to store calls
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Assign a role for `identity` in `code`, creating the room on first use
    pub async fn assign_role(&self, code: &RoomCode, identity: &str) -> Result<Role> {
        let room = with_retry("get_or_create_room", &self.retry, || {
            self.store.get_or_create_room(code, identity)
        })
        .await?;

        if let Some(role) = room.role_of(identity) {
            debug!(room_code = %code, identity, role = %role, "Identity already holds a slot");
            return Ok(role);
        }

        if room.is_full() {
            return Err(Error::RoomFull(code.to_string()));
        }

        let room = with_retry("claim_second_identity", &self.retry, || {
            self.store.claim_second_identity(code, identity)
        })
        .await?;

        // Another identity may have won the conditional claim
        let role = room
            .role_of(identity)
            .ok_or_else(|| Error::RoomFull(code.to_string()))?;

        info!(room_code = %code, identity, role = %role, "Second identity slot claimed");
        Ok(role)
    }
}
