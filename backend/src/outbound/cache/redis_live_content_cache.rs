//! Redis-backed live content cache.
//!
//! Values are JSON-encoded [`LiveContent`] stored under
//! `banner:{tag}:{feature}` with a millisecond expiry. Every round trip is
//! bounded by the configured command timeout; an expired deadline surfaces as
//! a backend failure.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::{self, RedisError};
use bb8_redis::RedisConnectionManager;
use tracing::{debug, info};

use crate::domain::ports::{LiveContentCache, LiveContentCacheError, LiveContentCacheKey};
use crate::domain::LiveContent;

/// Connection settings for the Redis cache.
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    url: String,
    max_connections: u32,
    command_timeout: Duration,
}

impl RedisCacheConfig {
    /// Eight pooled connections and a two second command timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 8,
            command_timeout: Duration::from_millis(2_000),
        }
    }

    /// Cap the Redis connection pool.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Deadline applied to each Redis round trip.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Redis connection string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Per-command deadline.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }
}

/// [`LiveContentCache`] adapter over a pooled Redis client.
#[derive(Clone)]
pub struct RedisLiveContentCache {
    pool: Pool<RedisConnectionManager>,
    command_timeout: Duration,
}

impl RedisLiveContentCache {
    /// Build the pool and verify the server answers `PING`.
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, LiveContentCacheError> {
        let manager = RedisConnectionManager::new(config.url.as_str()).map_err(map_redis_error)?;
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(config.command_timeout)
            .build(manager)
            .await
            .map_err(map_redis_error)?;

        let cache = Self {
            pool,
            command_timeout: config.command_timeout,
        };
        cache.ping().await?;
        info!(max_connections = config.max_connections, "redis live content cache ready");
        Ok(cache)
    }

    /// Round-trip a `PING` to the server.
    pub async fn ping(&self) -> Result<(), LiveContentCacheError> {
        self.bounded(async {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|err| LiveContentCacheError::backend(err.to_string()))?;
            let _pong: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;
            Ok(())
        })
        .await
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, LiveContentCacheError>
    where
        F: Future<Output = Result<T, LiveContentCacheError>>,
    {
        tokio::time::timeout(self.command_timeout, operation)
            .await
            .map_err(|_| {
                LiveContentCacheError::backend(format!(
                    "redis command timed out after {} ms",
                    self.command_timeout.as_millis()
                ))
            })?
    }
}

fn map_redis_error(error: RedisError) -> LiveContentCacheError {
    LiveContentCacheError::backend(error.to_string())
}

pub(crate) fn encode_content(content: &LiveContent) -> Result<String, LiveContentCacheError> {
    serde_json::to_string(content)
        .map_err(|err| LiveContentCacheError::serialization(err.to_string()))
}

pub(crate) fn decode_content(raw: &str) -> Result<LiveContent, LiveContentCacheError> {
    serde_json::from_str(raw).map_err(|err| LiveContentCacheError::serialization(err.to_string()))
}

/// Expiry in milliseconds; Redis rejects a zero `PX`.
pub(crate) fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl LiveContentCache for RedisLiveContentCache {
    async fn get(
        &self,
        key: &LiveContentCacheKey,
    ) -> Result<Option<LiveContent>, LiveContentCacheError> {
        let raw: Option<String> = self
            .bounded(async {
                let mut conn = self
                    .pool
                    .get()
                    .await
                    .map_err(|err| LiveContentCacheError::backend(err.to_string()))?;
                redis::cmd("GET")
                    .arg(key.as_str())
                    .query_async(&mut *conn)
                    .await
                    .map_err(map_redis_error)
            })
            .await?;

        match raw {
            Some(raw) => decode_content(&raw).map(Some),
            None => {
                debug!(%key, "live content cache miss");
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &LiveContentCacheKey,
        content: &LiveContent,
        ttl: Duration,
    ) -> Result<(), LiveContentCacheError> {
        let payload = encode_content(content)?;
        self.bounded(async {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|err| LiveContentCacheError::backend(err.to_string()))?;
            let _: () = redis::cmd("SET")
                .arg(key.as_str())
                .arg(payload)
                .arg("PX")
                .arg(expiry_millis(ttl))
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;
            Ok(())
        })
        .await
    }
}
