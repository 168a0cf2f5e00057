use std::sync::Arc;
use std::time::Duration;

use jobrec_api::{
    config::{Config, StoreBackend},
    db::{self, FavoritesStore, MemoryFavoritesStore, PgFavoritesStore},
    routes::{create_router, AppState},
    services::{JobBoardProvider, SearchProvider},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jobrec_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn FavoritesStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(
                &config.database_url,
                config.db_max_connections,
                Duration::from_millis(config.db_acquire_timeout_ms),
            )?;
            if config.run_migrations {
                // An unreachable database is not fatal; requests degrade instead
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::warn!(error = %e, "Migrations not applied");
                }
            }
            Arc::new(PgFavoritesStore::new(pool))
        }
        StoreBackend::Memory => Arc::new(MemoryFavoritesStore::new()),
    };

    let provider: Arc<dyn SearchProvider> = Arc::new(JobBoardProvider::new(
        config.search_api_url.clone(),
        Duration::from_millis(config.search_timeout_ms),
    )?);

    tracing::info!(
        store = store.name(),
        provider = provider.name(),
        search_api_url = %config.search_api_url,
        "Backends configured"
    );

    let state = Arc::new(AppState::new(store, provider, config.recommend_options()));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
