//! Test utilities for the banners crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and when the `test-support` feature is enabled.

mod clock;
mod in_memory_cache;
mod in_memory_repository;

pub use clock::MutableClock;
pub use in_memory_cache::InMemoryLiveContentCache;
pub use in_memory_repository::InMemoryBannerRepository;
