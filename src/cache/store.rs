//! Named, TTL-bounded cache regions.
//!
//! Each region is an LRU map guarded by a `std::sync::RwLock`. Entries move
//! through `ABSENT → FRESH → EXPIRED`; expired entries read as misses and stay
//! in storage until the region's sweep removes them.
//!
//! Every write also appends `(stored_at, key)` to an expiry queue. The TTL is
//! fixed per region, so the queue front is always the next entry to expire and
//! the sweep never has to walk the map.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use super::clock::Clock;
use super::config::CacheConfig;
use super::lock::{mutex_lock, rw_read, rw_write};

/// Rendered client-site page as captured from the downstream renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct Stored<V> {
    value: V,
    stored_at: OffsetDateTime,
}

/// Entry counts of one region at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionStats {
    pub region: &'static str,
    pub entries: usize,
    pub fresh: usize,
    pub expired: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
}

pub struct CacheRegion<V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<LruCache<String, Stored<V>>>,
    /// Write order. May hold records for keys since overwritten, purged or evicted.
    expiry: Mutex<VecDeque<(OffsetDateTime, String)>>,
}

impl<V: Clone> CacheRegion<V> {
    pub fn new(
        name: &'static str,
        ttl: Duration,
        capacity: std::num::NonZeroUsize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            ttl,
            clock,
            entries: RwLock::new(LruCache::new(capacity)),
            expiry: Mutex::new(VecDeque::new()),
        }
    }

    fn is_expired(&self, stored_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        now - stored_at > self.ttl
    }

    /// Fresh value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, self.name, "get");
        let stored = entries.get(key)?;
        if self.is_expired(stored.stored_at, now) {
            return None;
        }
        Some(stored.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: String, value: V) {
        self.set_if(key, value, || true);
    }

    /// Store `value` only if `still_current` holds. The check runs under the
    /// region's write lock, so it is atomic with respect to [`Self::purge_prefix`].
    pub fn set_if(&self, key: String, value: V, still_current: impl FnOnce() -> bool) -> bool {
        let stored_at = self.clock.now();
        let stored = Stored { value, stored_at };
        let displaced = {
            let mut entries = rw_write(&self.entries, self.name, "set");
            if !still_current() {
                return false;
            }
            entries.push(key.clone(), stored)
        };
        mutex_lock(&self.expiry, self.name, "set.enqueue").push_back((stored_at, key.clone()));

        if let Some((evicted, _)) = displaced.filter(|(displaced_key, _)| *displaced_key != key) {
            counter!("amora_cache_evict_total", "region" => self.name).increment(1);
            debug!(
                target = "amora::cache",
                region = self.name,
                key = %evicted,
                "evicted least recently used entry"
            );
        }
        true
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count removed.
    pub fn purge_prefix(&self, prefix: &str) -> usize {
        let mut entries = rw_write(&self.entries, self.name, "purge_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) -> usize {
        // Queue first: a write racing the clear leaves a stale record, never an orphan entry.
        mutex_lock(&self.expiry, self.name, "clear").clear();
        let mut entries = rw_write(&self.entries, self.name, "clear");
        let count = entries.len();
        entries.clear();
        count
    }

    /// Reclaim expired entries.
    ///
    /// Drains expired records from the front of the expiry queue. Each lock is
    /// held for one queue pop or one map lookup-and-remove, never for a scan.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        loop {
            let next = {
                let mut expiry = mutex_lock(&self.expiry, self.name, "sweep.dequeue");
                let due = expiry
                    .front()
                    .is_some_and(|(stored_at, _)| self.is_expired(*stored_at, now));
                if due { expiry.pop_front() } else { None }
            };
            let Some((stored_at, key)) = next else {
                break;
            };

            let mut entries = rw_write(&self.entries, self.name, "sweep.pop");
            // Skip records whose key has been rewritten since.
            let current = entries
                .peek(&key)
                .is_some_and(|stored| stored.stored_at == stored_at);
            if current {
                entries.pop(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            counter!("amora_cache_expired_swept_total", "region" => self.name)
                .increment(removed as u64);
        }
        removed
    }

    pub fn stats(&self) -> RegionStats {
        let now = self.clock.now();
        let entries = rw_read(&self.entries, self.name, "stats");
        let expired = entries
            .iter()
            .filter(|(_, stored)| self.is_expired(stored.stored_at, now))
            .count();

        RegionStats {
            region: self.name,
            entries: entries.len(),
            fresh: entries.len() - expired,
            expired,
            capacity: entries.cap().get(),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

impl CacheRegion<CachedPage> {
    pub fn pages(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new("site", config.site_ttl, config.site_capacity, clock)
    }
}

impl CacheRegion<serde_json::Value> {
    pub fn templates(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new("template", config.template_ttl, config.template_capacity, clock)
    }
}
