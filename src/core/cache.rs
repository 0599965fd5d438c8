// src/core/cache.rs

use crate::core::clock::Clock;
use crate::core::models::AnalysisRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry {
    record: Arc<AnalysisRecord>,
    inserted_at: Instant,
}

/// TTL memoisation of finished analyses, keyed by normalised host.
///
/// Expired entries are evicted when a lookup touches them; there is no
/// background sweep and no size bound.
pub struct ResultCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<AnalysisRecord>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                debug!(key, "Cache hit.");
                Some(Arc::clone(&entry.record))
            }
            Some(_) => {
                debug!(key, "Cache entry expired, evicting.");
                entries.remove(key);
                None
            }
            None => {
                debug!(key, "Cache miss.");
                None
            }
        }
    }

    /// Replaces whatever was stored under `key`.
    pub fn put(&self, key: &str, record: Arc<AnalysisRecord>) {
        let entry = CacheEntry {
            record,
            inserted_at: self.clock.now(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
    }

    /// Stored entries, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::risk::tests::sample_record;

    fn cache(clock: Arc<ManualClock>) -> ResultCache {
        ResultCache::new(Duration::from_secs(300), clock)
    }

    #[test]
    fn test_put_then_get_returns_same_record() {
        let cache = cache(Arc::new(ManualClock::default()));
        let record = Arc::new(sample_record());
        cache.put("example.com", Arc::clone(&record));
        let hit = cache.get("example.com").unwrap();
        assert!(Arc::ptr_eq(&hit, &record));
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(clock.clone());
        cache.put("example.com", Arc::new(sample_record()));

        clock.advance(Duration::from_secs(299));
        assert!(cache.get("example.com").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("example.com").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(clock.clone());
        cache.put("example.com", Arc::new(sample_record()));
        clock.advance(Duration::from_secs(200));

        let mut rescanned = sample_record();
        rescanned.status_code = Some(503);
        cache.put("example.com", Arc::new(rescanned));

        // The TTL restarts with the replacement.
        clock.advance(Duration::from_secs(200));
        let hit = cache.get("example.com").unwrap();
        assert_eq!(hit.status_code, Some(503));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let cache = cache(Arc::new(ManualClock::default()));
        assert!(cache.get("nowhere.test").is_none());
    }
}
