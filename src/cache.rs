//! Bounded, time-to-live keyed store driving deduplication.
//!
//! Grounded on `geocoders::cache::Cache`, the teacher's only caching layer —
//! generalized from "wraps an inner geocoder, keyed by Redis" to "in-memory
//! map keyed by broadcast identifier". No `KeyValueStore` is needed here:
//! spec.md explicitly scopes persistence out (see DESIGN.md).

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::{counter, describe_counter};

use crate::model::CacheEntry;

/// Default bound on the number of tracked broadcast identifiers.
pub const MAX_ENTRIES: usize = 1_000;

/// Bounded TTL map: `broadcast_id -> (CacheEntry, inserted_at)`.
///
/// Single-owner (the scheduler loop owns it exclusively; see spec.md §5), so
/// no synchronization is needed.
pub struct BroadcastCache {
    entries: LruCache<String, (CacheEntry, Instant)>,
    ttl: Duration,
}

impl BroadcastCache {
    /// Create a cache bounded to `MAX_ENTRIES` keys, each expiring `ttl`
    /// after insertion.
    pub fn new(ttl: Duration) -> Self {
        describe_counter!("mowasbeacon.cache.hits.total", "Cache lookups that found a live entry");
        describe_counter!(
            "mowasbeacon.cache.misses.total",
            "Cache lookups that found nothing (absent or expired)"
        );
        describe_counter!("mowasbeacon.cache.evictions.total", "Entries evicted, by cause");
        BroadcastCache {
            entries: LruCache::new(NonZeroUsize::new(MAX_ENTRIES).expect("MAX_ENTRIES > 0")),
            ttl,
        }
    }

    /// Look up `identifier`, transparently treating an expired entry as
    /// absent (and evicting it).
    pub fn get(&mut self, identifier: &str) -> Option<CacheEntry> {
        let expired = match self.entries.peek(identifier) {
            Some((_, inserted_at)) => inserted_at.elapsed() >= self.ttl,
            None => {
                counter!("mowasbeacon.cache.misses.total", 1);
                return None;
            }
        };
        if expired {
            self.entries.pop(identifier);
            counter!("mowasbeacon.cache.evictions.total", 1, "cause" => "ttl");
            counter!("mowasbeacon.cache.misses.total", 1);
            return None;
        }
        counter!("mowasbeacon.cache.hits.total", 1);
        self.entries.get(identifier).map(|(entry, _)| entry.clone())
    }

    /// Insert or overwrite `identifier`. If the cache is already at
    /// [`MAX_ENTRIES`], the least-recently-used entry is dropped (the `lru`
    /// crate's normal behavior, which matches spec.md's "oldest entry is
    /// dropped" requirement).
    pub fn put(&mut self, identifier: String, entry: CacheEntry) {
        if self.entries.put(identifier, (entry, Instant::now())).is_none()
            && self.entries.len() > MAX_ENTRIES
        {
            // `lru` only evicts on `put` when over capacity; since the cache
            // is built with a bounded capacity this branch is unreachable in
            // practice, but we count it if it ever fires.
            counter!("mowasbeacon.cache.evictions.total", 1, "cause" => "capacity");
        }
    }

    /// Remove `identifier`, if present.
    pub fn evict(&mut self, identifier: &str) {
        if self.entries.pop(identifier).is_some() {
            counter!("mowasbeacon.cache.evictions.total", 1, "cause" => "lifecycle");
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoredMsgType;

    fn entry(sent: &str) -> CacheEntry {
        CacheEntry {
            msgtype: StoredMsgType::Alert,
            sent: sent.to_owned(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut cache = BroadcastCache::new(Duration::from_secs(3600));
        cache.put("id-1".to_owned(), entry("T1"));
        assert_eq!(cache.get("id-1"), Some(entry("T1")));
    }

    #[test]
    fn missing_key_is_none() {
        let mut cache = BroadcastCache::new(Duration::from_secs(3600));
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entry_is_evicted_and_reported_as_absent() {
        let mut cache = BroadcastCache::new(Duration::from_millis(1));
        cache.put("id-1".to_owned(), entry("T1"));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("id-1"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn explicit_evict_removes_entry() {
        let mut cache = BroadcastCache::new(Duration::from_secs(3600));
        cache.put("id-1".to_owned(), entry("T1"));
        cache.evict("id-1");
        assert_eq!(cache.get("id-1"), None);
    }

    #[test]
    fn bound_drops_oldest_entry() {
        let mut cache = BroadcastCache {
            entries: LruCache::new(NonZeroUsize::new(3).unwrap()),
            ttl: Duration::from_secs(3600),
        };
        cache.put("a".to_owned(), entry("1"));
        cache.put("b".to_owned(), entry("2"));
        cache.put("c".to_owned(), entry("3"));
        cache.put("d".to_owned(), entry("4"));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("d").is_some());
    }
}
