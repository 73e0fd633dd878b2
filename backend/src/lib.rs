//! Banner revision service library.
//!
//! `domain` holds the banner model, the cache-aside service and the
//! deferred deletion pool. `outbound` carries the PostgreSQL and Redis
//! adapters. `config` loads process settings.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
