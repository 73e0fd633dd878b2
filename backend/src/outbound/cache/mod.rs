//! Redis cache adapter for the live content lookaside cache.
//!
//! Connections are pooled with `bb8-redis`. Cached values are disposable
//! projections of the revision store; losing the cache only costs extra
//! store reads.

mod redis_live_content_cache;

pub use redis_live_content_cache::{RedisCacheConfig, RedisLiveContentCache};
