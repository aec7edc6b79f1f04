//! Time-bounded cache for the loaded record snapshot.
//!
//! The cache is an ordinary value: whoever owns it decides its TTL and calls
//! [`SnapshotCache::invalidate`] after anything that changes the underlying
//! records. Nothing in the engine reaches for it implicitly.

use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
struct CacheEntry<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct SnapshotCache<T> {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T> SnapshotCache<T> {
    pub fn new(ttl: Duration) -> Self {
        SnapshotCache {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A loader that panicked mid-store leaves the lock poisoned; the slot
    // itself is still a whole `Option`, so keep using it.
    fn slot(&self) -> MutexGuard<'_, Option<CacheEntry<T>>> {
        self.entry.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("snapshot cache lock was poisoned; recovering");
            self.entry.clear_poison();
            poisoned.into_inner()
        })
    }

    /// The cached snapshot if it is younger than the TTL.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot()
            .as_ref()
            .filter(|e| e.loaded_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    /// Return the fresh cached snapshot, or run `loader` and cache its
    /// result. Loader errors are returned as-is and leave the cache empty.
    pub fn get_or_load<F>(&self, loader: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get() {
            debug!("snapshot cache hit");
            return Ok(value);
        }
        debug!("snapshot cache miss; loading");
        let value = Arc::new(loader()?);
        *self.slot() = Some(CacheEntry {
            value: Arc::clone(&value),
            loaded_at: Instant::now(),
        });
        Ok(value)
    }

    pub fn invalidate(&self) {
        if self.slot().take().is_some() {
            debug!("snapshot cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use std::cell::Cell;

    #[test]
    fn loads_once_within_ttl() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok(vec![1, 2, 3])
        };
        let first = cache.get_or_load(load).unwrap();
        let second = cache.get_or_load(load).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalidate_forces_a_reload() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.get_or_load(|| Ok("old")).unwrap();
        cache.invalidate();
        assert!(cache.get().is_none());
        assert_eq!(*cache.get_or_load(|| Ok("new")).unwrap(), "new");
    }

    #[test]
    fn zero_ttl_never_serves_stale_data() {
        let cache = SnapshotCache::new(Duration::ZERO);
        cache.get_or_load(|| Ok(1)).unwrap();
        assert_eq!(*cache.get_or_load(|| Ok(2)).unwrap(), 2);
    }

    #[test]
    fn poisoned_lock_still_caches() {
        let cache = Arc::new(SnapshotCache::new(Duration::from_secs(60)));
        let shared = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = shared.entry.lock().unwrap();
            panic!("loader blew up");
        })
        .join();
        assert!(cache.entry.is_poisoned());

        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok("fresh")
        };
        assert_eq!(*cache.get_or_load(load).unwrap(), "fresh");
        assert_eq!(*cache.get_or_load(load).unwrap(), "fresh");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_load(|| Err(ReportError::Validation("bad".into())))
            .unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)));
        assert!(cache.get().is_none());
    }
}
