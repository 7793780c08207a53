//! Bounded, time-limited response cache.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{CacheError, CacheKey, DEFAULT_SIZE, DEFAULT_TTL};
use crate::network::Response;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_SIZE) {
    Some(n) => n,
    None => panic!("default cache size must be non-zero"),
};

struct CacheEntry {
    response: Response,
    fetched_at: Instant,
}

/// An in-memory `key → response` cache bounded by entry count and age.
///
/// - Holds at most [`capacity`](Self::capacity) entries; inserting into a full
///   cache first drops expired entries, then the least recently used one.
/// - An entry is served for `ttl` after it was stored. Reading an older entry
///   removes it and reports a miss.
/// - A hit marks the entry as most recently used.
///
/// The cache is internally synchronized and is meant to be shared behind an
/// [`Arc`](std::sync::Arc).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use relay_cache::cache::{CacheKey, QueryResponseCache};
/// use relay_cache::network::{Response, Variables};
/// use serde_json::json;
///
/// # fn main() -> Result<(), relay_cache::cache::CacheError> {
/// let cache = QueryResponseCache::new(10, Duration::from_secs(60));
/// let key = CacheKey::new("ViewerQuery", &Variables::new());
///
/// cache.set(key.clone(), Response::new(json!({"viewer": null})))?;
/// assert!(cache.get(&key)?.is_some());
///
/// cache.clear()?;
/// assert!(cache.get(&key)?.is_none());
/// # Ok(())
/// # }
/// ```
pub struct QueryResponseCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl QueryResponseCache {
    /// Creates a cache holding up to `size` entries for `ttl` each.
    ///
    /// A `size` of zero falls back to [`DEFAULT_SIZE`] and a zero `ttl` to
    /// [`DEFAULT_TTL`].
    pub fn new(size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(size).unwrap_or(DEFAULT_CAPACITY);
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns the cached response for `key` if it has not expired.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Response>, CacheError> {
        let mut entries = self.lock()?;

        match entries.get(key) {
            None => {
                trace!(key = %key, "response cache miss");
                return Ok(None);
            }
            Some(entry) if self.is_current(entry) => {
                trace!(key = %key, "response cache hit");
                return Ok(Some(entry.response.clone()));
            }
            Some(_) => {}
        }

        entries.pop(key);
        debug!(key = %key, "response cache entry expired");
        Ok(None)
    }

    /// Stores `response` under `key`, replacing and re-stamping any previous entry.
    pub fn set(&self, key: CacheKey, response: Response) -> Result<(), CacheError> {
        let mut entries = self.lock()?;

        if !entries.contains(&key) && entries.len() == entries.cap().get() {
            self.purge_expired(&mut entries);
        }

        let entry = CacheEntry {
            response,
            fetched_at: Instant::now(),
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(key = %evicted, "response cache evicted least recently used entry");
            }
        }
        Ok(())
    }

    /// Removes every entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "response cache cleared");
        Ok(())
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.lock()?.is_empty())
    }

    pub fn capacity(&self) -> usize {
        // A poisoned lock still reports the configured bound.
        match self.entries.lock() {
            Ok(entries) => entries.cap().get(),
            Err(poisoned) => poisoned.into_inner().cap().get(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Poisons the entry lock, making every later access fail.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.entries.lock();
            panic!("poison the response cache lock");
        }));
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<CacheKey, CacheEntry>>, CacheError> {
        self.entries.lock().map_err(|_| CacheError::Poisoned)
    }

    fn is_current(&self, entry: &CacheEntry) -> bool {
        entry.fetched_at.elapsed() <= self.ttl
    }

    fn purge_expired(&self, entries: &mut LruCache<CacheKey, CacheEntry>) {
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| !self.is_current(entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            debug!(purged = expired.len(), "response cache purged expired entries");
        }
    }
}

impl std::fmt::Debug for QueryResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResponseCache")
            .field("capacity", &self.capacity())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
