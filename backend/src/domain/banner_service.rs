//! Revision resolution service.
//!
//! Orchestrates the revision store, the lookaside cache and the deferred
//! deletion pool. This is the only component aware of the cache-aside policy;
//! everything else is a pass-through that adds the operation name to failures.
//!
//! Writes never invalidate cached live content. A cached entry may therefore
//! lag behind `patch_banner`, `select_revision` or deletes for up to the
//! configured TTL.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::domain::deletion_worker::{DeletionPoolError, DeletionTask, DeletionWorkerPool};
use crate::domain::ports::{
    BannerRepository, BannerRepositoryError, LiveContentCache, LiveContentCacheError,
    LiveContentCacheKey,
};
use crate::domain::{
    BannerId, BannerPatch, DeletionAccepted, Error, ErrorCode, FeatureId, LiveBanner, LiveContent,
    NewBanner, PageRequest, PageRequestError, Revision, RevisionId, TagId,
};

/// Lifetime of cached live content when nothing else is configured.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Failures surfaced by [`BannerService`], tagged with the failing operation.
#[derive(Debug, Error)]
pub enum BannerServiceError {
    /// No live content, banner or revision matched the request.
    #[error("{operation}: {message}")]
    NotFound {
        operation: &'static str,
        message: String,
    },
    /// Caller-supplied input was rejected.
    #[error("{operation}: invalid request: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },
    /// The revision store failed.
    #[error("{operation}: storage failure: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: BannerRepositoryError,
    },
    /// The cache transport or payload failed. A miss is never reported here.
    #[error("{operation}: cache failure: {source}")]
    Cache {
        operation: &'static str,
        #[source]
        source: LiveContentCacheError,
    },
    /// The deletion could not be queued.
    #[error("{operation}: deletion not scheduled: {source}")]
    Scheduling {
        operation: &'static str,
        #[source]
        source: DeletionPoolError,
    },
}

impl BannerServiceError {
    /// Name of the service operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::NotFound { operation, .. }
            | Self::Validation { operation, .. }
            | Self::Storage { operation, .. }
            | Self::Cache { operation, .. }
            | Self::Scheduling { operation, .. } => operation,
        }
    }

    /// Collapse the failure into the caller-facing code set.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Validation { .. } => ErrorCode::InvalidRequest,
            Self::Storage {
                source: BannerRepositoryError::Connection { .. },
                ..
            }
            | Self::Scheduling { .. } => ErrorCode::ServiceUnavailable,
            Self::Storage { .. } | Self::Cache { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<PageRequestError> for BannerServiceError {
    fn from(value: PageRequestError) -> Self {
        Self::Validation {
            operation: "paginate",
            message: value.to_string(),
        }
    }
}

impl From<BannerServiceError> for Error {
    fn from(value: BannerServiceError) -> Self {
        let message = match &value {
            BannerServiceError::NotFound { message, .. }
            | BannerServiceError::Validation { message, .. } => message.clone(),
            BannerServiceError::Storage { .. } => "banner storage is unavailable".to_owned(),
            BannerServiceError::Cache { .. } => "banner cache is unavailable".to_owned(),
            BannerServiceError::Scheduling { .. } => {
                "banner deletion could not be scheduled".to_owned()
            }
        };
        Error::new(value.code(), message)
    }
}

fn map_repository_error(
    operation: &'static str,
) -> impl FnOnce(BannerRepositoryError) -> BannerServiceError {
    move |err| {
        if err.is_not_found() {
            debug!(operation, error = %err, "banner lookup missed");
            BannerServiceError::NotFound {
                operation,
                message: err.to_string(),
            }
        } else {
            error!(operation, error = %err, "banner repository failure");
            BannerServiceError::Storage {
                operation,
                source: err,
            }
        }
    }
}

fn map_cache_error(
    operation: &'static str,
) -> impl FnOnce(LiveContentCacheError) -> BannerServiceError {
    move |err| {
        warn!(operation, error = %err, "live content cache failure");
        BannerServiceError::Cache {
            operation,
            source: err,
        }
    }
}

/// Revision resolution service.
pub struct BannerService<R, C> {
    repository: Arc<R>,
    cache: Arc<C>,
    deletions: Arc<DeletionWorkerPool>,
    cache_ttl: Duration,
}

impl<R, C> Clone for BannerService<R, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
            deletions: Arc::clone(&self.deletions),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<R, C> BannerService<R, C>
where
    R: BannerRepository + 'static,
    C: LiveContentCache,
{
    /// Create a service over the store, cache and deletion pool.
    pub fn new(
        repository: Arc<R>,
        cache: Arc<C>,
        deletions: Arc<DeletionWorkerPool>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repository,
            cache,
            deletions,
            cache_ttl,
        }
    }

    /// TTL applied to cache writes.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Content served for `(tag_id, feature_id)`.
    ///
    /// With `use_latest` unset the cache is consulted first and filled from the
    /// store on a miss; a failed fill fails the read. With `use_latest` set the
    /// store is read directly and the cache is left untouched.
    pub async fn get_live_content(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        use_latest: bool,
    ) -> Result<LiveContent, BannerServiceError> {
        const OPERATION: &str = "get_live_content";

        if use_latest {
            return self.resolve_from_store(OPERATION, tag_id, feature_id).await;
        }

        let key = LiveContentCacheKey::new(tag_id, feature_id);
        if let Some(cached) = self
            .cache
            .get(&key)
            .await
            .map_err(map_cache_error(OPERATION))?
        {
            debug!(%key, "live content served from cache");
            return Ok(cached);
        }

        let content = self.resolve_from_store(OPERATION, tag_id, feature_id).await?;
        self.cache
            .set(&key, &content, self.cache_ttl)
            .await
            .map_err(map_cache_error(OPERATION))?;
        Ok(content)
    }

    async fn resolve_from_store(
        &self,
        operation: &'static str,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<LiveContent, BannerServiceError> {
        self.repository
            .resolve_live_content(tag_id, feature_id)
            .await
            .map_err(map_repository_error(operation))?
            .ok_or_else(|| BannerServiceError::NotFound {
                operation,
                message: format!("no live content for tag {tag_id} and feature {feature_id}"),
            })
    }

    /// Overwrite the cached content for `(tag_id, feature_id)`.
    pub async fn set_live_content_cache(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
        content: &LiveContent,
    ) -> Result<(), BannerServiceError> {
        let key = LiveContentCacheKey::new(tag_id, feature_id);
        self.cache
            .set(&key, content, self.cache_ttl)
            .await
            .map_err(map_cache_error("set_live_content_cache"))
    }

    /// Create a banner and its first revision, which becomes the chosen one.
    pub async fn create_banner(&self, banner: &NewBanner) -> Result<BannerId, BannerServiceError> {
        self.repository
            .create_banner(banner)
            .await
            .map_err(map_repository_error("create_banner"))
    }

    /// Make `revision_id` the banner's chosen revision.
    ///
    /// Fails with `NotFound` when the revision belongs to another banner or
    /// does not exist; the current choice is left as it was.
    pub async fn select_revision(
        &self,
        banner_id: BannerId,
        revision_id: RevisionId,
    ) -> Result<(), BannerServiceError> {
        self.repository
            .select_revision(banner_id, revision_id)
            .await
            .map_err(map_repository_error("select_revision"))
    }

    /// Revisions of a banner. An empty page short-circuits without a query.
    pub async fn list_revisions(
        &self,
        banner_id: BannerId,
        page: PageRequest,
    ) -> Result<Vec<Revision>, BannerServiceError> {
        if page.is_empty() {
            return Ok(Vec::new());
        }
        self.repository
            .list_revisions(banner_id, page)
            .await
            .map_err(map_repository_error("list_revisions"))
    }

    /// Banners currently live for `(feature_id, tag_id)`.
    pub async fn list_live(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
        page: PageRequest,
    ) -> Result<Vec<LiveBanner>, BannerServiceError> {
        if page.is_empty() {
            return Ok(Vec::new());
        }
        self.repository
            .list_live(feature_id, tag_id, page)
            .await
            .map_err(map_repository_error("list_live"))
    }

    /// Apply a partial update to the banner's chosen revision in place.
    pub async fn patch_banner(
        &self,
        banner_id: BannerId,
        patch: &BannerPatch,
    ) -> Result<(), BannerServiceError> {
        const OPERATION: &str = "patch_banner";
        if patch.is_empty() {
            return Err(BannerServiceError::Validation {
                operation: OPERATION,
                message: "patch must set at least one field".to_owned(),
            });
        }
        self.repository
            .patch_chosen_revision(banner_id, patch)
            .await
            .map_err(map_repository_error(OPERATION))
    }

    /// Remove a banner with every revision and tag association it owns.
    pub async fn delete_banner(&self, banner_id: BannerId) -> Result<(), BannerServiceError> {
        self.repository
            .delete_banner(banner_id)
            .await
            .map_err(map_repository_error("delete_banner"))
    }

    /// Queue deletion of every banner live for `(feature_id, tag_id)`.
    ///
    /// Returns once the task is queued. Completion is not reported back and a
    /// failed task is only logged.
    pub async fn delete_by_feature_tag(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<DeletionAccepted, BannerServiceError> {
        let repository = Arc::clone(&self.repository);
        let task = DeletionTask::new(feature_id, tag_id, async move {
            repository
                .delete_by_feature_tag(feature_id, tag_id)
                .await
                .map(|deleted| {
                    debug!(%feature_id, %tag_id, deleted, "banners deleted by feature and tag");
                })
        });

        self.deletions.submit(task).await.map_err(|source| {
            error!(%feature_id, %tag_id, error = %source, "failed to queue banner deletion");
            BannerServiceError::Scheduling {
                operation: "delete_by_feature_tag",
                source,
            }
        })?;

        Ok(DeletionAccepted { feature_id, tag_id })
    }
}

#[cfg(test)]
#[path = "banner_service_tests.rs"]
mod tests;
