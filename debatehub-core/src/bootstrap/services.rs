//! Collaborator construction

use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    repository::{MemoryRoomStore, PgRoomStore, RoomStore},
    service::{AssemblyAiTranscriber, Authenticator, JwtAuthenticator, RoleAssigner, SpeechToText},
    Config,
};

/// Collaborators shared by the session layer and the HTTP handlers
#[derive(Clone)]
pub struct Services {
    /// Durable room, turn and event store
    pub store: Arc<dyn RoomStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub transcriber: Arc<dyn SpeechToText>,
    /// Role assignment over `store`
    pub roles: RoleAssigner,
}

/// Build the collaborators. `pool` selects the PostgreSQL store; `None`
/// keeps everything in memory.
pub fn init_services(pool: Option<PgPool>, config: &Config) -> anyhow::Result<Services> {
    let store: Arc<dyn RoomStore> = if let Some(pool) = pool {
        info!("Using PostgreSQL room store");
        Arc::new(PgRoomStore::new(pool))
    } else {
        warn!("database.url is empty, rooms are kept in memory only");
        Arc::new(MemoryRoomStore::new())
    };

    let authenticator = JwtAuthenticator::from_config(&config.auth)?;
    info!(mode = ?config.auth.mode, "Authenticator initialized");

    if config.transcription.api_key.is_empty() {
        warn!("transcription.api_key is empty, /api/transcribe will fail");
    }
    let transcriber = AssemblyAiTranscriber::new(&config.transcription);

    let roles = RoleAssigner::new(Arc::clone(&store), config.session.retry_policy());

    Ok(Services {
        store,
        authenticator: Arc::new(authenticator),
        transcriber: Arc::new(transcriber),
        roles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMode;
    use crate::models::RoomCode;

    #[tokio::test]
    async fn test_memory_services_assign_roles() {
        let mut config = Config::default();
        config.auth.mode = AuthMode::Unverified;

        let services = init_services(None, &config).unwrap();
        let code = RoomCode::parse("abc123").unwrap();
        services.roles.assign_role(&code, "a@x.com").await.unwrap();
        assert!(services.store.room_exists(&code).await.unwrap());
    }

    #[test]
    fn test_rs256_without_key_file_fails() {
        let mut config = Config::default();
        config.auth.mode = AuthMode::Rs256;
        config.auth.public_key_path = Some("/nonexistent/key.pem".to_string());
        assert!(init_services(None, &config).is_err());
    }
}
