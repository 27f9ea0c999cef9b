use std::sync::Arc;

use cinelist_api::{
    api::{create_router, AppState},
    config::{Config, RecordStoreKind},
    db::{create_redis_client, Cache, RedisRecordStore},
    services::{CatalogClient, MemorySynchronizer, RecordSynchronizer, TmdbCatalog},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let redis_client = create_redis_client(&config.redis_url)?;

    let synchronizer: Arc<dyn RecordSynchronizer> = match config.record_store {
        RecordStoreKind::Redis => Arc::new(RedisRecordStore::new(redis_client.clone())),
        RecordStoreKind::Memory => Arc::new(MemorySynchronizer::new()),
    };

    let (cache, cache_writer) = Cache::new(redis_client);
    let catalog: Arc<dyn CatalogClient> = Arc::new(TmdbCatalog::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.catalog_cache_ttl,
    ));

    tracing::info!(
        record_store = synchronizer.name(),
        catalog = catalog.name(),
        "Services initialized"
    );

    let app = create_router(AppState::new(synchronizer, catalog));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
