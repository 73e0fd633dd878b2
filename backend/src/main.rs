//! Service entry-point: loads settings, wires the store, cache and deletion
//! pool into the banner service, then runs until interrupted.

use std::sync::Arc;

use ortho_config::OrthoConfig;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use banners::config::{BannerSettings, SettingsError};
use banners::domain::ports::LiveContentCacheError;
use banners::domain::{BannerService, DeletionPoolError, DeletionWorkerPool};
use banners::outbound::cache::RedisLiveContentCache;
use banners::outbound::persistence::{
    DbPool, DieselBannerRepository, MigrationError, PoolError, run_migrations,
};

/// Failures that abort startup.
#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to apply migrations: {0}")]
    Migrations(#[from] MigrationError),
    #[error("migration task failed: {0}")]
    MigrationTask(#[from] tokio::task::JoinError),
    #[error("failed to build database pool: {0}")]
    Database(#[from] PoolError),
    #[error("failed to connect to cache: {0}")]
    Cache(#[from] LiveContentCacheError),
    #[error("failed to start deletion workers: {0}")]
    Deletions(#[from] DeletionPoolError),
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = BannerSettings::load().map_err(|e| StartupError::Load(e.to_string()))?;
    let pool_config = settings.pool_config()?;

    if settings.run_migrations() {
        let url = pool_config.database_url().to_owned();
        let applied = tokio::task::spawn_blocking(move || run_migrations(&url)).await??;
        info!(applied, "database migrations applied");
    }

    let db_pool = DbPool::new(pool_config).await?;
    let repository = Arc::new(DieselBannerRepository::new(db_pool));
    let cache = Arc::new(RedisLiveContentCache::connect(settings.redis_config()).await?);
    let deletions = Arc::new(DeletionWorkerPool::new(settings.deletion_pool_config()?)?);

    let service = BannerService::new(
        repository,
        cache,
        Arc::clone(&deletions),
        settings.cache_ttl(),
    );
    info!(
        cache_ttl_secs = service.cache_ttl().as_secs(),
        deletion_workers = deletions.worker_count(),
        "banner service ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested; draining deletion workers");
    deletions.shutdown().await;
    info!("banner service stopped");
    Ok(())
}
