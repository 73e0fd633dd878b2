//! Port for the relational revision store.
//!
//! The store owns all durable banner state. Multi-step writes (create, patch,
//! delete) are atomic: adapters must run them in one transaction so either
//! every step applies or none does. Pagination windows arrive pre-validated
//! and are not re-checked here.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    BannerId, BannerPatch, FeatureId, LiveBanner, LiveContent, NewBanner, PageRequest, Revision,
    RevisionId, TagId,
};

/// Errors raised by revision store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BannerRepositoryError {
    /// Repository connection could not be established.
    #[error("banner repository connection failed: {message}")]
    Connection { message: String },
    /// Query, transaction or row decoding failed.
    #[error("banner repository query failed: {message}")]
    Query { message: String },
    /// No banner exists with the given id.
    #[error("banner {banner_id} not found")]
    BannerNotFound { banner_id: BannerId },
    /// The banner does not own a revision with the given id.
    #[error("revision {revision_id} does not belong to banner {banner_id}")]
    RevisionNotFound {
        banner_id: BannerId,
        revision_id: RevisionId,
    },
    /// The banner has no chosen revision to patch.
    #[error("banner {banner_id} has no chosen revision")]
    NoChosenRevision { banner_id: BannerId },
}

impl BannerRepositoryError {
    /// Helper for connectivity failures.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for query failures.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Whether the error reports a missing entity rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BannerNotFound { .. } | Self::RevisionNotFound { .. } | Self::NoChosenRevision { .. }
        )
    }
}

/// Port for banner, revision and tag association persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BannerRepository: Send + Sync {
    /// Insert a banner and its first revision, bind the revision as chosen
    /// and return the new banner id.
    async fn create_banner(&self, banner: &NewBanner) -> Result<BannerId, BannerRepositoryError>;

    /// Content of the chosen revision matching `feature_id` that carries
    /// `tag_id`, or `None` when nothing matches.
    async fn resolve_live_content(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<Option<LiveContent>, BannerRepositoryError>;

    /// Point the banner at one of its own revisions.
    async fn select_revision(
        &self,
        banner_id: BannerId,
        revision_id: RevisionId,
    ) -> Result<(), BannerRepositoryError>;

    /// Revisions owned by the banner in storage order.
    async fn list_revisions(
        &self,
        banner_id: BannerId,
        page: PageRequest,
    ) -> Result<Vec<Revision>, BannerRepositoryError>;

    /// Banners whose chosen revision matches `feature_id` and carries `tag_id`.
    async fn list_live(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
        page: PageRequest,
    ) -> Result<Vec<LiveBanner>, BannerRepositoryError>;

    /// Overwrite the supplied fields of the banner's chosen revision in place.
    async fn patch_chosen_revision(
        &self,
        banner_id: BannerId,
        patch: &BannerPatch,
    ) -> Result<(), BannerRepositoryError>;

    /// Delete a banner with its revisions and tag associations.
    async fn delete_banner(&self, banner_id: BannerId) -> Result<(), BannerRepositoryError>;

    /// Delete every banner whose chosen revision matches `feature_id` and
    /// carries `tag_id`, returning how many banners were removed.
    async fn delete_by_feature_tag(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<u64, BannerRepositoryError>;
}

/// Fixture implementation for tests that do not exercise banner persistence.
///
/// Reads are empty, lookups miss and writes succeed without storing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureBannerRepository;

#[async_trait]
impl BannerRepository for FixtureBannerRepository {
    async fn create_banner(&self, _banner: &NewBanner) -> Result<BannerId, BannerRepositoryError> {
        Ok(BannerId::new(1))
    }

    async fn resolve_live_content(
        &self,
        _tag_id: TagId,
        _feature_id: FeatureId,
    ) -> Result<Option<LiveContent>, BannerRepositoryError> {
        Ok(None)
    }

    async fn select_revision(
        &self,
        banner_id: BannerId,
        revision_id: RevisionId,
    ) -> Result<(), BannerRepositoryError> {
        Err(BannerRepositoryError::RevisionNotFound {
            banner_id,
            revision_id,
        })
    }

    async fn list_revisions(
        &self,
        _banner_id: BannerId,
        _page: PageRequest,
    ) -> Result<Vec<Revision>, BannerRepositoryError> {
        Ok(Vec::new())
    }

    async fn list_live(
        &self,
        _feature_id: FeatureId,
        _tag_id: TagId,
        _page: PageRequest,
    ) -> Result<Vec<LiveBanner>, BannerRepositoryError> {
        Ok(Vec::new())
    }

    async fn patch_chosen_revision(
        &self,
        banner_id: BannerId,
        _patch: &BannerPatch,
    ) -> Result<(), BannerRepositoryError> {
        Err(BannerRepositoryError::BannerNotFound { banner_id })
    }

    async fn delete_banner(&self, banner_id: BannerId) -> Result<(), BannerRepositoryError> {
        Err(BannerRepositoryError::BannerNotFound { banner_id })
    }

    async fn delete_by_feature_tag(
        &self,
        _feature_id: FeatureId,
        _tag_id: TagId,
    ) -> Result<u64, BannerRepositoryError> {
        Ok(0)
    }
}
