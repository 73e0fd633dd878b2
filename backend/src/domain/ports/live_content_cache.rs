//! Port interface for the live content lookaside cache.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::LiveContentCacheKey;
use crate::domain::LiveContent;

/// Errors surfaced by the caching adapter.
///
/// A missing key is not an error: `get` reports it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveContentCacheError {
    /// Cache backend is unavailable or timing out.
    #[error("live content cache backend failure: {message}")]
    Backend { message: String },
    /// Serialisation or deserialisation of cached content failed.
    #[error("live content cache serialisation failed: {message}")]
    Serialization { message: String },
}

impl LiveContentCacheError {
    /// Helper for backend-level failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Helper for serialisation failures.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Volatile projection of live content keyed by `(tag, feature)`.
///
/// Entries are disposable copies of store data and must never drive write
/// decisions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveContentCache: Send + Sync {
    /// Read a cached entry; `Ok(None)` signals a miss.
    async fn get(
        &self,
        key: &LiveContentCacheKey,
    ) -> Result<Option<LiveContent>, LiveContentCacheError>;

    /// Store an entry that expires after `ttl`, replacing any existing value.
    async fn set(
        &self,
        key: &LiveContentCacheKey,
        content: &LiveContent,
        ttl: Duration,
    ) -> Result<(), LiveContentCacheError>;
}
