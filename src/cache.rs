//! Bounded in-memory transcription response cache.
//!
//! Capacity-bounded LRU with per-entry TTL. Expiry is lazy: a lookup past the
//! TTL pops the entry and reports a miss. The cache is a pure latency
//! optimization; a miss always falls through to the upstream call, so losing
//! contents on restart only costs time, never correctness.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;

struct CacheEntry {
    text: String,
    inserted_at: Instant,
}

/// Point-in-time counters exposed by `/health` and `/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Fingerprint-keyed transcript cache shared across request handlers.
pub struct TranscriptCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TranscriptCache {
    /// Creates a cache bounded to `capacity` entries with the given TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let bound = NonZeroUsize::new(capacity.max(1)).expect("capacity floor is 1");
        Self {
            inner: Mutex::new(LruCache::new(bound)),
            ttl,
            capacity: bound.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a cached transcript. Expired entries are removed and count as
    /// misses.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                let text = entry.text.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(text);
            }
            cache.pop(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts a transcript, evicting the least-recently-used entry when the
    /// capacity bound would be exceeded.
    pub fn put(&self, key: String, text: String) {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(
            key,
            CacheEntry {
                text,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Removes every entry and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = cache.len();
        cache.clear();
        removed
    }

    /// Current number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Snapshot of size and hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            size: self.len(),
            max_size: self.capacity,
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}
