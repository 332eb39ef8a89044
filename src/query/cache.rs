use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use crate::config::CacheConfig;
use crate::query::results::ResultRow;

#[derive(Debug, Clone)]
struct CacheEntry {
    results: Arc<Vec<ResultRow>>,
    inserted_at: Instant,
    generation: u64,
}

impl CacheEntry {
    fn is_live(&self, now: Instant, ttl: Duration, generation: u64) -> bool {
        self.generation == generation && now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Cache of finished search rows keyed by `term|app|filterType|filterValue`.
///
/// Entries expire after the TTL or as soon as the index generation they were
/// computed against is replaced. The size cap is soft: expired entries are
/// purged on insert, then at most one oldest entry is evicted.
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn get(&self, key: &str, generation: u64) -> Option<Arc<Vec<ResultRow>>> {
        self.get_at(key, generation, Instant::now())
    }

    pub fn get_at(&self, key: &str, generation: u64, now: Instant) -> Option<Arc<Vec<ResultRow>>> {
        let found = self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now, self.ttl, generation))
            .map(|entry| Arc::clone(&entry.results));

        match found {
            Some(results) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key, "Result cache hit");
                Some(results)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, generation: u64, results: Arc<Vec<ResultRow>>) {
        self.insert_at(key, generation, results, Instant::now());
    }

    pub fn insert_at(&self, key: String, generation: u64, results: Arc<Vec<ResultRow>>, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                results,
                inserted_at: now,
                generation,
            },
        );

        self.entries
            .retain(|_, entry| entry.is_live(now, self.ttl, generation));

        if self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&self) {
        // No shard guard may be held across the remove
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            trace!(key = %key, "Evicted oldest cache entry");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ShortcutRecord;

    fn results(n: usize) -> Arc<Vec<ResultRow>> {
        Arc::new(
            (0..n)
                .map(|i| ResultRow::listed(Arc::new(ShortcutRecord::new(format!("F{}", i), "Action", "tool"))))
                .collect(),
        )
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResultCache::new(Duration::from_secs(300), 100);
        let start = Instant::now();
        cache.insert_at("copy|||".to_string(), 1, results(2), start);

        let hit = cache.get_at("copy|||", 1, start + Duration::from_secs(299));
        assert_eq!(hit.map(|r| r.len()), Some(2));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ResultCache::new(Duration::from_secs(300), 100);
        let start = Instant::now();
        cache.insert_at("copy|||".to_string(), 1, results(1), start);

        assert!(cache.get_at("copy|||", 1, start + Duration::from_secs(300)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_generation_change_invalidates() {
        let cache = ResultCache::new(Duration::from_secs(300), 100);
        let start = Instant::now();
        cache.insert_at("copy|||".to_string(), 1, results(1), start);

        assert!(cache.get_at("copy|||", 2, start).is_none());
        // Inserting under the new generation purges the stale entry
        cache.insert_at("paste|||".to_string(), 2, results(1), start);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_purges_expired_entries() {
        let cache = ResultCache::new(Duration::from_secs(10), 100);
        let start = Instant::now();
        cache.insert_at("a".to_string(), 1, results(1), start);
        cache.insert_at("b".to_string(), 1, results(1), start + Duration::from_secs(5));
        cache.insert_at("c".to_string(), 1, results(1), start + Duration::from_secs(12));

        assert_eq!(cache.len(), 2);
        assert!(cache.get_at("a", 1, start + Duration::from_secs(12)).is_none());
        assert!(cache.get_at("b", 1, start + Duration::from_secs(12)).is_some());
    }

    #[test]
    fn test_over_capacity_evicts_single_oldest() {
        let cache = ResultCache::new(Duration::from_secs(300), 100);
        let start = Instant::now();
        for i in 0..100 {
            cache.insert_at(format!("term{}|||", i), 1, results(1), start + Duration::from_millis(i));
        }
        assert_eq!(cache.len(), 100);

        cache.insert_at("term100|||".to_string(), 1, results(1), start + Duration::from_millis(100));
        assert_eq!(cache.len(), 100);

        let now = start + Duration::from_millis(101);
        assert!(cache.get_at("term0|||", 1, now).is_none());
        assert!(cache.get_at("term1|||", 1, now).is_some());
        assert!(cache.get_at("term100|||", 1, now).is_some());
    }

    #[test]
    fn test_overwrite_same_key() {
        let cache = ResultCache::new(Duration::from_secs(300), 100);
        let start = Instant::now();
        cache.insert_at("k".to_string(), 1, results(1), start);
        cache.insert_at("k".to_string(), 1, results(3), start);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at("k", 1, start).map(|r| r.len()), Some(3));

        cache.clear();
        assert!(cache.is_empty());
    }
}
