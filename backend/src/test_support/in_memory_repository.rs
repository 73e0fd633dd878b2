//! In-memory revision store mirroring the PostgreSQL adapter's semantics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use serde_json::Value;

use crate::domain::ports::{BannerRepository, BannerRepositoryError};
use crate::domain::{
    BannerId, BannerPatch, FeatureId, LiveBanner, LiveContent, NewBanner, PageRequest, Revision,
    RevisionId, TagId, TagIds,
};

#[derive(Debug, Clone)]
struct StoredRevision {
    banner_id: i64,
    feature_id: FeatureId,
    tag_ids: TagIds,
    content: Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    next_banner_id: i64,
    next_revision_id: i64,
    /// banner id -> chosen revision id
    banners: BTreeMap<i64, Option<i64>>,
    revisions: BTreeMap<i64, StoredRevision>,
}

impl Store {
    fn to_revision(revision_id: i64, stored: &StoredRevision) -> Revision {
        Revision {
            revision_id: RevisionId::new(revision_id),
            banner_id: BannerId::new(stored.banner_id),
            feature_id: stored.feature_id,
            tag_ids: stored.tag_ids.clone(),
            content: stored.content.clone(),
            is_active: stored.is_active,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    /// Chosen revisions matching the criterion, in banner order.
    fn live(&self, feature_id: FeatureId, tag_id: TagId) -> Vec<(i64, i64, &StoredRevision)> {
        self.banners
            .iter()
            .filter_map(|(banner_id, chosen)| {
                let revision_id = (*chosen)?;
                let stored = self.revisions.get(&revision_id)?;
                (stored.feature_id == feature_id && stored.tag_ids.contains(tag_id))
                    .then_some((*banner_id, revision_id, stored))
            })
            .collect()
    }

    fn remove_banner(&mut self, banner_id: i64) {
        self.banners.remove(&banner_id);
        self.revisions
            .retain(|_, stored| stored.banner_id != banner_id);
    }
}

fn window<T>(items: impl Iterator<Item = T>, page: PageRequest) -> Vec<T> {
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let take = usize::try_from(page.limit()).unwrap_or(0);
    items.skip(skip).take(take).collect()
}

/// [`BannerRepository`] double holding banners in memory.
///
/// Writes are applied all-or-nothing under a single lock. Counters record
/// how often the store was consulted so cache-aside tests can assert on
/// store traffic.
pub struct InMemoryBannerRepository {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
    resolves: AtomicUsize,
    failure: Mutex<Option<BannerRepositoryError>>,
}

impl Default for InMemoryBannerRepository {
    fn default() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl InMemoryBannerRepository {
    /// Empty instance driven by the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty instance driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store {
                next_banner_id: 1,
                next_revision_id: 1,
                ..Store::default()
            }),
            clock,
            resolves: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Number of `resolve_live_content` calls so far.
    pub fn resolve_calls(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    /// Make every later call fail with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<BannerRepositoryError>) {
        *lock(&self.failure) = error;
    }

    /// Add another revision to an existing banner without choosing it.
    pub fn add_revision(
        &self,
        banner_id: BannerId,
        feature_id: FeatureId,
        tag_ids: TagIds,
        content: Value,
    ) -> Option<RevisionId> {
        let now = self.clock.utc();
        let mut store = lock(&self.store);
        if !store.banners.contains_key(&banner_id.get()) {
            return None;
        }
        let revision_id = store.next_revision_id;
        store.next_revision_id += 1;
        store.revisions.insert(
            revision_id,
            StoredRevision {
                banner_id: banner_id.get(),
                feature_id,
                tag_ids,
                content,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );
        Some(RevisionId::new(revision_id))
    }

    /// Revision a banner currently serves, if any.
    pub fn chosen_revision(&self, banner_id: BannerId) -> Option<RevisionId> {
        lock(&self.store)
            .banners
            .get(&banner_id.get())
            .copied()
            .flatten()
            .map(RevisionId::new)
    }

    /// Banners currently stored.
    pub fn banner_count(&self) -> usize {
        lock(&self.store).banners.len()
    }

    /// Revisions currently stored across all banners.
    pub fn revision_count(&self) -> usize {
        lock(&self.store).revisions.len()
    }

    fn injected_failure(&self) -> Result<(), BannerRepositoryError> {
        lock(&self.failure).clone().map_or(Ok(()), Err)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("in-memory repository mutex poisoned"),
    }
}

#[async_trait]
impl BannerRepository for InMemoryBannerRepository {
    async fn create_banner(&self, banner: &NewBanner) -> Result<BannerId, BannerRepositoryError> {
        self.injected_failure()?;
        let now = self.clock.utc();
        let mut store = lock(&self.store);

        let banner_id = store.next_banner_id;
        let revision_id = store.next_revision_id;
        store.next_banner_id += 1;
        store.next_revision_id += 1;
        store.revisions.insert(
            revision_id,
            StoredRevision {
                banner_id,
                feature_id: banner.feature_id,
                tag_ids: banner.tag_ids.clone(),
                content: banner.content.clone(),
                is_active: banner.is_active,
                created_at: now,
                updated_at: now,
            },
        );
        store.banners.insert(banner_id, Some(revision_id));
        Ok(BannerId::new(banner_id))
    }

    async fn resolve_live_content(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<Option<LiveContent>, BannerRepositoryError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;
        let store = lock(&self.store);
        Ok(store
            .live(feature_id, tag_id)
            .first()
            .map(|(_, _, stored)| LiveContent {
                content: stored.content.clone(),
                is_active: stored.is_active,
            }))
    }

    async fn select_revision(
        &self,
        banner_id: BannerId,
        revision_id: RevisionId,
    ) -> Result<(), BannerRepositoryError> {
        self.injected_failure()?;
        let mut store = lock(&self.store);
        let owned = store
            .revisions
            .get(&revision_id.get())
            .is_some_and(|stored| stored.banner_id == banner_id.get());
        if !owned {
            return Err(BannerRepositoryError::RevisionNotFound {
                banner_id,
                revision_id,
            });
        }
        store
            .banners
            .insert(banner_id.get(), Some(revision_id.get()));
        Ok(())
    }

    async fn list_revisions(
        &self,
        banner_id: BannerId,
        page: PageRequest,
    ) -> Result<Vec<Revision>, BannerRepositoryError> {
        self.injected_failure()?;
        let store = lock(&self.store);
        let owned = store
            .revisions
            .iter()
            .filter(|(_, stored)| stored.banner_id == banner_id.get())
            .map(|(revision_id, stored)| Store::to_revision(*revision_id, stored));
        Ok(window(owned, page))
    }

    async fn list_live(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
        page: PageRequest,
    ) -> Result<Vec<LiveBanner>, BannerRepositoryError> {
        self.injected_failure()?;
        let store = lock(&self.store);
        let live = store
            .live(feature_id, tag_id)
            .into_iter()
            .map(|(banner_id, revision_id, stored)| LiveBanner {
                banner_id: BannerId::new(banner_id),
                revision: Store::to_revision(revision_id, stored),
            });
        Ok(window(live, page))
    }

    async fn patch_chosen_revision(
        &self,
        banner_id: BannerId,
        patch: &BannerPatch,
    ) -> Result<(), BannerRepositoryError> {
        self.injected_failure()?;
        let now = self.clock.utc();
        let mut store = lock(&self.store);
        let revision_id = match store.banners.get(&banner_id.get()) {
            None => return Err(BannerRepositoryError::BannerNotFound { banner_id }),
            Some(None) => return Err(BannerRepositoryError::NoChosenRevision { banner_id }),
            Some(Some(revision_id)) => *revision_id,
        };
        let stored = store
            .revisions
            .get_mut(&revision_id)
            .ok_or_else(|| BannerRepositoryError::query("chosen revision is missing"))?;

        if let Some(is_active) = patch.is_active {
            stored.is_active = is_active;
        }
        if let Some(feature_id) = patch.feature_id {
            stored.feature_id = feature_id;
        }
        if let Some(content) = &patch.content {
            stored.content = content.clone();
        }
        if let Some(tag_ids) = &patch.tag_ids {
            stored.tag_ids = tag_ids.clone();
        }
        stored.updated_at = now;
        Ok(())
    }

    async fn delete_banner(&self, banner_id: BannerId) -> Result<(), BannerRepositoryError> {
        self.injected_failure()?;
        let mut store = lock(&self.store);
        if !store.banners.contains_key(&banner_id.get()) {
            return Err(BannerRepositoryError::BannerNotFound { banner_id });
        }
        store.remove_banner(banner_id.get());
        Ok(())
    }

    async fn delete_by_feature_tag(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<u64, BannerRepositoryError> {
        self.injected_failure()?;
        let mut store = lock(&self.store);
        let doomed: Vec<i64> = store
            .live(feature_id, tag_id)
            .into_iter()
            .map(|(banner_id, _, _)| banner_id)
            .collect();
        for banner_id in &doomed {
            store.remove_banner(*banner_id);
        }
        Ok(doomed.len() as u64)
    }
}
