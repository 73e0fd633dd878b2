//! PostgreSQL persistence adapter using Diesel ORM.
//!
//! This module implements the revision store port on PostgreSQL through
//! `diesel-async` with `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapter**: the repository translates between Diesel rows and
//!   domain types. No cache or scheduling policy lives here.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Atomic writes**: create, select, patch and delete each run in a single
//!   transaction.
//! - **Strongly typed errors**: driver failures map to
//!   `BannerRepositoryError` with stable messages.
//!
//! # Example
//!
//! ```no_run
//! use banners::outbound::persistence::{DbPool, DieselBannerRepository, PoolConfig};
//!
//! # async fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/banners")).await?;
//! let repository = DieselBannerRepository::new(pool);
//! # let _ = repository;
//! # Ok(())
//! # }
//! ```

mod diesel_banner_repository;
mod diesel_error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;
mod tag_list;

pub use diesel_banner_repository::DieselBannerRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
pub use tag_list::{TagListError, parse_tag_list};
