use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Keyed cache of fetched series, bounded in entries and in age.
///
/// Least recently used entries are evicted once `capacity` is reached; an
/// entry older than the validity window is dropped when it is read. Owned by
/// whoever serves chart data and shared through an `Arc`; there is no
/// process-wide instance.
pub struct SeriesCache<K, V> {
    ttl: Duration,
    entries: Mutex<LruCache<K, (Instant, V)>>,
}

impl<K, V> SeriesCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A zero `capacity` is treated as one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Returns the cached value while it is still inside the validity window
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => {
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.lock();
        entries.put(key, (Instant::now(), value));
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.lock().pop(key).is_some()
    }

    /// Drops every entry past its validity window, returning how many went
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, (stored_at, _))| stored_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            debug!("Purged {} expired series cache entries", expired.len());
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, (Instant, V)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
