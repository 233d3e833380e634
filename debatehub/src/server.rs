use debatehub_api::{create_router, AppState};
use debatehub_core::Config;
use debatehub_sync::CloseCode;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long open WebSockets get to close after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct DebateHubServer {
    config: Config,
    state: AppState,
    pool: Option<PgPool>,
}

impl DebateHubServer {
    pub const fn new(config: Config, state: AppState, pool: Option<PgPool>) -> Self {
        Self {
            config,
            state,
            pool,
        }
    }

    /// Bind the HTTP listener and serve until a shutdown signal arrives
    pub async fn start(self) -> anyhow::Result<()> {
        let http_address = self.config.http_address();
        let http_addr: SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;
        info!("HTTP server listening on {}", http_addr);

        let router = create_router(self.state.clone());
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("HTTP server error: {}", e);
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&self) {
        info!("Shutting down DebateHub server...");

        // 1. Close room connections and wait for them to drain (with timeout)
        let registry = self.state.coordinator.registry();
        let active = registry.close_all(CloseCode::Normal);
        if active > 0 {
            info!(
                "Waiting up to {}s for {} room connection(s) to drain...",
                DRAIN_TIMEOUT.as_secs(),
                active
            );
            let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
            loop {
                let remaining = registry.connection_count();
                if remaining == 0 {
                    info!("All connections drained");
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    warn!(
                        "Drain timeout reached with {} connection(s) still active",
                        remaining
                    );
                    break;
                }
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        }

        // 2. Close the database connection pool
        if let Some(pool) = &self.pool {
            info!("Closing database connection pool...");
            pool.close().await;
            info!("Database pool closed");
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
