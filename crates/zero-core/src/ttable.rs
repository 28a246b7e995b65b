//! Bounded transposition cache (spec §4.3): Zobrist hash -> (priors, value).
//!
//! Capacity is derived from a byte budget rather than an entry count, same
//! as the reference `TranspositionTable` (`original_source/include/search/transposition_table.hpp`).
//! Writes are serialized behind a mutex; reads go through `contains` then
//! `get` and are allowed to race with an eviction — callers must treat an
//! unexpected miss after a successful `contains` as a cache miss and fall
//! back to evaluation (spec §9, "get_hash racing eviction").

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::board::Move;

#[derive(Clone, Debug)]
pub struct CachedEval {
    pub priors: Vec<(Move, f32)>,
    pub value: f32,
}

/// Rough per-entry footprint used to turn a byte budget into a capacity:
/// the key (8 bytes) plus a handful of (Move, f32) pairs and the LRU
/// list/map bookkeeping overhead.
const ASSUMED_ENTRY_BYTES: usize = 512;

pub struct TranspositionCache {
    inner: Mutex<LruCache<u64, CachedEval>>,
}

impl TranspositionCache {
    pub fn with_byte_budget(budget_bytes: usize) -> Self {
        let capacity = (budget_bytes / ASSUMED_ENTRY_BYTES).max(1);
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(capacity).unwrap())),
        }
    }

    /// Insert or refresh an entry, promoting it to most-recently-used.
    pub fn insert(&self, hash: u64, eval: CachedEval) {
        self.inner.lock().unwrap().put(hash, eval);
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.inner.lock().unwrap().contains(&hash)
    }

    /// Read-path lookup. Does *not* promote the entry's LRU order — the
    /// spec explicitly allows reads to be contention-free at the cost of
    /// stale ordering (§4.3).
    pub fn get(&self, hash: u64) -> Option<CachedEval> {
        self.inner.lock().unwrap().peek(&hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_hits() {
        let cache = TranspositionCache::with_byte_budget(1_000_000);
        cache.insert(42, CachedEval { priors: vec![], value: 0.5 });
        assert!(cache.contains(42));
        assert_eq!(cache.get(42).unwrap().value, 0.5);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = TranspositionCache::with_byte_budget(1_000_000);
        assert!(!cache.contains(7));
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn evicts_least_recently_used_over_capacity() {
        let cache = TranspositionCache::with_byte_budget(ASSUMED_ENTRY_BYTES * 2);
        cache.insert(1, CachedEval { priors: vec![], value: 0.1 });
        cache.insert(2, CachedEval { priors: vec![], value: 0.2 });
        cache.insert(3, CachedEval { priors: vec![], value: 0.3 });
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert!(cache.contains(3));
    }
}
