//! In-memory live content cache with clock-driven expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};

use crate::domain::LiveContent;
use crate::domain::ports::{LiveContentCache, LiveContentCacheError, LiveContentCacheKey};

struct Entry {
    content: LiveContent,
    expires_at: Option<DateTime<Utc>>,
}

/// [`LiveContentCache`] double that counts calls and expires entries once
/// the clock reaches `set time + ttl`.
pub struct InMemoryLiveContentCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    failure: Mutex<Option<LiveContentCacheError>>,
}

impl Default for InMemoryLiveContentCache {
    fn default() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl InMemoryLiveContentCache {
    /// Empty instance driven by the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty instance driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Number of `get` calls so far.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls so far.
    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Make every later call fail with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<LiveContentCacheError>) {
        *lock(&self.failure) = error;
    }

    fn injected_failure(&self) -> Result<(), LiveContentCacheError> {
        lock(&self.failure).clone().map_or(Ok(()), Err)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("in-memory cache mutex poisoned"),
    }
}

#[async_trait]
impl LiveContentCache for InMemoryLiveContentCache {
    async fn get(
        &self,
        key: &LiveContentCacheKey,
    ) -> Result<Option<LiveContent>, LiveContentCacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;

        let now = self.clock.utc();
        let mut entries = lock(&self.entries);
        let expired = entries
            .get(key.as_str())
            .and_then(|entry| entry.expires_at)
            .is_some_and(|expires_at| now >= expires_at);
        if expired {
            entries.remove(key.as_str());
            return Ok(None);
        }
        Ok(entries.get(key.as_str()).map(|entry| entry.content.clone()))
    }

    async fn set(
        &self,
        key: &LiveContentCacheKey,
        content: &LiveContent,
        ttl: Duration,
    ) -> Result<(), LiveContentCacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;

        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.utc().checked_add_signed(ttl));
        lock(&self.entries).insert(
            key.as_str().to_owned(),
            Entry {
                content: content.clone(),
                expires_at,
            },
        );
        Ok(())
    }
}
