use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secrets_auth::middleware::{auth_routes, AuthConfig};
use secrets_auth::{IdentityStore, MemoryIdentityStore, MemorySessionStore};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AuthConfig::from_env().context("invalid configuration")?;

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let sweep_secs: u64 = match std::env::var("SESSION_SWEEP_SECS") {
        Ok(raw) => raw
            .parse()
            .ok()
            .filter(|secs| *secs > 0)
            .context("SESSION_SWEEP_SECS must be a positive integer")?,
        Err(_) => 60,
    };

    let sessions = Arc::new(MemorySessionStore::new(config.idle_timeout()));
    let sweeper = sessions.clone().spawn_sweeper(Duration::from_secs(sweep_secs));

    let result = match std::env::var("DATABASE_URL").ok() {
        #[cfg(feature = "sqlite")]
        Some(url) => {
            let identities = secrets_auth::SqliteIdentityStore::connect(&url)
                .await
                .context("opening identity database")?;
            info!(database = %url, "Using SQLite identity store");
            serve(&bind, config, Arc::new(identities), sessions).await
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => anyhow::bail!("DATABASE_URL is set but the sqlite feature is disabled"),
        None => {
            info!("DATABASE_URL unset, using in-memory identity store");
            serve(&bind, config, Arc::new(MemoryIdentityStore::new()), sessions).await
        }
    };

    sweeper.abort();
    result
}

async fn serve<I: IdentityStore>(
    bind: &str,
    config: AuthConfig,
    identities: Arc<I>,
    sessions: Arc<MemorySessionStore>,
) -> anyhow::Result<()> {
    info!(
        provider = config.provider(),
        idle_timeout_secs = config.idle_timeout().whole_seconds(),
        "Starting secrets-auth on {bind}"
    );

    let app = auth_routes(config, identities, sessions);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for shutdown signal");
    }
    info!("Shutting down");
}
