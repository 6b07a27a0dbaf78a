//! # Snapshot Cache
//!
//! Read-through, time-bounded copies of ledger records for display paths.
//! Never authoritative: every manager invalidates a key before it issues a
//! write that depends on that record, and decisions are always made on a
//! fresh ledger read.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct SnapshotCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
    enabled: bool,
}

impl<K, V> SnapshotCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: config.ttl(),
            enabled: config.enabled && !config.ttl().is_zero(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    /// Cached value if it is younger than the TTL; stale entries are dropped
    pub fn get_fresh(&self, key: &K) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let fresh = {
            let entry = self.entries.get(key)?;
            (entry.stored_at.elapsed() < self.ttl).then(|| entry.value.clone())
        };
        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn put(&self, key: K, value: V) {
        if self.enabled {
            self.entries.insert(
                key,
                Entry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_ms: u64) -> SnapshotCache<String, u64> {
        SnapshotCache::new(&CacheConfig {
            enabled: true,
            ttl_ms,
        })
    }

    #[test]
    fn test_put_then_get() {
        let cache = cache(60_000);
        cache.put("alice".to_string(), 10);
        assert_eq!(cache.get_fresh(&"alice".to_string()), Some(10));

        cache.invalidate(&"alice".to_string());
        assert_eq!(cache.get_fresh(&"alice".to_string()), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = cache(1);
        cache.put("alice".to_string(), 10);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get_fresh(&"alice".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache: SnapshotCache<String, u64> = SnapshotCache::disabled();
        cache.put("alice".to_string(), 10);
        assert!(cache.is_empty());
        assert_eq!(cache.get_fresh(&"alice".to_string()), None);
    }
}
