use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use carelog_api::app::{router, AppState};
use carelog_api::auth::JwtKeys;
use carelog_api::clock::SystemClock;
use carelog_api::database::{DatabaseManager, MemoryStore, PgStore, SharedStore};
use carelog_api::services::catalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    // Initialize configuration (this loads the config singleton)
    let config = carelog_api::config::config();

    let default_filter = if config.api.enable_request_logging {
        "carelog_api=info,tower_http=info"
    } else {
        "carelog_api=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("Starting CareLog API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store: SharedStore = match config.database.url {
        Some(_) => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to Postgres")?;
            DatabaseManager::migrate(&pool)
                .await
                .context("failed to apply migrations")?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    catalog::seed_if_empty(&store)
        .await
        .context("failed to seed reward catalogs")?;

    let state = AppState::new(
        store,
        Arc::new(SystemClock),
        &config.rewards,
        JwtKeys::from_config(&config.security),
    );
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("CareLog API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
