//! Domain primitives, services and ports.
//!
//! Purpose: define the banner aggregate, the revision resolution service and
//! the deferred deletion pool independently of any storage or cache engine.
//! Adapters live under `crate::outbound` and plug in through `ports`.
//!
//! Public surface:
//! - BannerService (alias to `banner_service::BannerService`) - cache-aside
//!   reads and pass-through writes.
//! - DeletionWorkerPool (alias to `deletion_worker::DeletionWorkerPool`) -
//!   bounded background execution of criteria deletes.
//! - Error (alias to `error::Error`) - caller-facing error payload.
//! - PageRequest (alias to `page::PageRequest`) - validated pagination window.

pub mod banner;
pub mod banner_service;
pub mod deletion_worker;
pub mod error;
pub mod page;
pub mod ports;

pub use self::banner::{
    BannerId, BannerPatch, DeletionAccepted, FeatureId, LiveBanner, LiveContent, NewBanner,
    Revision, RevisionId, TagId, TagIds,
};
pub use self::banner_service::{BannerService, BannerServiceError, DEFAULT_CACHE_TTL};
pub use self::deletion_worker::{
    DEFAULT_DELETION_WORKERS, DeletionPoolConfig, DeletionPoolError, DeletionTask,
    DeletionWorkerPool,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::page::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, PageRequest, PageRequestError};

/// Convenient result alias for callers that only need the payload error.
///
/// # Examples
/// ```
/// use banners::domain::{BannerResult, Error};
///
/// fn lookup() -> BannerResult<()> {
///     Err(Error::not_found("no live content"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type BannerResult<T> = Result<T, Error>;
