//! Domain ports and supporting types for the hexagonal boundary.

mod banner_repository;
mod live_content_cache;
mod live_content_cache_key;

#[cfg(test)]
pub use banner_repository::MockBannerRepository;
pub use banner_repository::{BannerRepository, BannerRepositoryError, FixtureBannerRepository};
#[cfg(test)]
pub use live_content_cache::MockLiveContentCache;
pub use live_content_cache::{LiveContentCache, LiveContentCacheError};
pub use live_content_cache_key::{LiveContentCacheKey, LiveContentCacheKeyError};
