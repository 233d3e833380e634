mod server;

use anyhow::Result;
use tracing::{error, info};

use debatehub_api::AppState;
use debatehub_core::{
    bootstrap::{init_database, init_services, load_config},
    logging,
};
use debatehub_sync::{ConnectionRegistry, MatchmakingQueue, RoomCoordinator};

use server::DebateHubServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("DebateHub server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Initialize database and run migrations (optional)
    let pool = if config.uses_database() {
        let pool = init_database(&config.database).await?;

        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                anyhow::anyhow!("Migration failed: {e}")
            })?;
        info!("Migrations completed");
        Some(pool)
    } else {
        None
    };

    // 4. Initialize collaborators
    let services = init_services(pool.clone(), &config)?;
    info!("Services initialized");

    // 5. Session layer
    let registry = ConnectionRegistry::new();
    let coordinator = RoomCoordinator::new(
        registry,
        services.roles.clone(),
        services.store.clone(),
        config.session.max_chat_length,
    );
    let matchmaking = MatchmakingQueue::new(
        services.store.clone(),
        config.matchmaking.room_code_length,
        config.matchmaking.max_code_attempts,
    );
    info!(
        max_chat_length = config.session.max_chat_length,
        room_code_length = config.matchmaking.room_code_length,
        "Room coordinator and matchmaking queue ready"
    );

    let state = AppState {
        coordinator,
        matchmaking,
        store: services.store.clone(),
        authenticator: services.authenticator.clone(),
        transcriber: services.transcriber.clone(),
        max_message_bytes: config.server.max_message_bytes,
    };

    // 6. Serve until shutdown
    let server = DebateHubServer::new(config, state, pool);
    server.start().await?;

    info!("DebateHub server stopped");
    Ok(())
}
