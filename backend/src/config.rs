//! Service configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `BANNERS_*` environment variables and an
//! optional configuration file. Only `database_url` is required.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{DEFAULT_CACHE_TTL, DEFAULT_DELETION_WORKERS, DeletionPoolConfig};
use crate::outbound::cache::RedisCacheConfig;
use crate::outbound::persistence::PoolConfig;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_IDLE: u32 = 2;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_COMMAND_TIMEOUT_MS: u64 = 2_000;

/// Raised when loaded settings cannot be turned into adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A required value was not provided.
    #[error("missing required setting `{name}`")]
    Missing { name: &'static str },
    /// A value was provided but cannot be used.
    #[error("setting `{name}` is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Configuration for the banner service process.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BANNERS")]
pub struct BannerSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub database_max_connections: Option<u32>,
    /// Idle database connections kept open.
    pub database_min_idle: Option<u32>,
    /// Seconds to wait for a database connection checkout.
    pub database_connection_timeout_secs: Option<u64>,
    /// Redis connection string for the live content cache.
    pub redis_url: Option<String>,
    /// Lifetime of cached live content in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// Per-command Redis deadline in milliseconds.
    pub cache_command_timeout_ms: Option<u64>,
    /// Number of deferred deletion workers.
    pub deletion_workers: Option<usize>,
    /// Deletions that may wait while every worker is busy.
    pub deletion_queue_capacity: Option<usize>,
    /// Leave the schema untouched on startup instead of applying pending
    /// migrations.
    #[ortho_config(default = false)]
    pub skip_migrations: bool,
}

impl BannerSettings {
    /// Configured PostgreSQL URL; blank values count as missing.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SettingsError::Missing {
                name: "database_url",
            })
    }

    /// Database pool configuration with defaults applied.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let max_size = self
            .database_max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_size == 0 {
            return Err(SettingsError::Invalid {
                name: "database_max_connections",
                reason: "must be at least 1".to_owned(),
            });
        }
        let min_idle = self.database_min_idle.unwrap_or(DEFAULT_MIN_IDLE).min(max_size);

        Ok(PoolConfig::new(self.database_url()?)
            .with_max_size(max_size)
            .with_min_idle(Some(min_idle))
            .with_connection_timeout(Duration::from_secs(
                self.database_connection_timeout_secs
                    .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS),
            )))
    }

    /// Redis URL, falling back to a local default.
    pub fn redis_url(&self) -> &str {
        self.redis_url.as_deref().unwrap_or(DEFAULT_REDIS_URL)
    }

    /// Cache adapter configuration with the command deadline applied.
    pub fn redis_config(&self) -> RedisCacheConfig {
        RedisCacheConfig::new(self.redis_url()).with_command_timeout(Duration::from_millis(
            self.cache_command_timeout_ms
                .unwrap_or(DEFAULT_CACHE_COMMAND_TIMEOUT_MS),
        ))
    }

    /// Lifetime written alongside each cached live content entry.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL)
    }

    /// Worker pool sizing; zero workers is rejected.
    pub fn deletion_pool_config(&self) -> Result<DeletionPoolConfig, SettingsError> {
        let worker_count = self.deletion_workers.unwrap_or(DEFAULT_DELETION_WORKERS);
        if worker_count == 0 {
            return Err(SettingsError::Invalid {
                name: "deletion_workers",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(DeletionPoolConfig {
            worker_count,
            queue_capacity: self.deletion_queue_capacity.unwrap_or(0),
        })
    }

    /// Whether startup applies pending migrations. True unless
    /// `skip_migrations` is set.
    pub fn run_migrations(&self) -> bool {
        !self.skip_migrations
    }
}
