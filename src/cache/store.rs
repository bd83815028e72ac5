//! TTL cache with stale-fallback reads.
//!
//! [`CacheStore`] keeps the authoritative entry map in memory and writes
//! through to the injected [`Storage`] capability for durability across
//! restarts. Two read paths exist on purpose:
//!
//! - [`get`](CacheStore::get) is strict: only fresh entries are returned,
//!   and expired entries are left in place rather than deleted.
//! - [`get_stale`](CacheStore::get_stale) is lenient: it returns the entry
//!   regardless of freshness. The orchestrator uses it only after the
//!   network path has definitively failed.
//!
//! Expired entries survive until [`sweep`](CacheStore::sweep) removes those
//! whose age exceeds a configured grace multiple of their TTL, bounding
//! growth while keeping stale reads possible for the grace period.
//!
//! Storage failures never fail the request path: they are logged and the
//! operation degrades to a cache miss or a memory-only write.

use crate::cache::storage::Storage;
use crate::config::CacheConfig;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Current wall-clock time as epoch milliseconds.
///
/// Wall clock rather than `Instant` so persisted entries stay meaningful
/// across restarts.
fn epoch_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// One cached value with its freshness metadata.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    stored_at_ms: u64,
    ttl_ms: u64,
}

impl CacheEntry {
    fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.stored_at_ms)
    }

    /// An entry is fresh iff `now - stored_at <= ttl`.
    fn is_fresh(&self, now_ms: u64) -> bool {
        self.age_ms(now_ms) <= self.ttl_ms
    }

    /// True once the entry has outlived its stale grace period.
    fn past_grace(&self, now_ms: u64, grace_multiplier: u32) -> bool {
        self.age_ms(now_ms) > self.ttl_ms.saturating_mul(grace_multiplier as u64)
    }
}

/// Serialized envelope written to the storage capability.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    stored_at_ms: u64,
    ttl_ms: u64,
    value: Vec<u8>,
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh reads served by `get`.
    pub hits: u64,
    /// `get` calls that found nothing fresh.
    pub misses: u64,
    /// Expired entries served by `get_stale`.
    pub stale_hits: u64,
    /// Successful `set` calls.
    pub writes: u64,
    /// Entries removed by `sweep`.
    pub evictions: u64,
}

/// TTL-keyed value store with write-through persistence.
pub struct CacheStore<S: Storage> {
    entries: Mutex<HashMap<String, CacheEntry>>,
    storage: S,
    config: CacheConfig,
    stats: Mutex<CacheStats>,
}

impl<S: Storage> CacheStore<S> {
    /// Creates a store and hydrates the in-memory index from storage.
    ///
    /// Entries that cannot be decoded are dropped with a warning; a failing
    /// storage listing yields an empty cache rather than an error.
    pub async fn load(storage: S, config: CacheConfig) -> Self {
        let mut entries = HashMap::new();

        match storage.list().await {
            Ok(keys) => {
                for key in keys {
                    match storage.get(&key).await {
                        Ok(Some(raw)) => match serde_json::from_slice::<PersistedEntry>(&raw) {
                            Ok(persisted) => {
                                entries.insert(
                                    key,
                                    CacheEntry {
                                        value: Bytes::from(persisted.value),
                                        stored_at_ms: persisted.stored_at_ms,
                                        ttl_ms: persisted.ttl_ms,
                                    },
                                );
                            }
                            Err(e) => {
                                warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                            }
                        },
                        Ok(None) => {}
                        Err(e) => {
                            warn!(key = %key, error = %e, "Failed to read cache entry from storage");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Cache hydration failed; starting empty");
            }
        }

        debug!(entries = entries.len(), "Cache store loaded");

        Self {
            entries: Mutex::new(entries),
            storage,
            config,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Returns the value for `key` only if it is fresh.
    ///
    /// Expired entries are not deleted on read; they remain available to
    /// [`get_stale`](Self::get_stale) until swept.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now_ms = epoch_ms();
        let entries = self.entries.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now_ms) => {
                stats.hits += 1;
                Some(entry.value.clone())
            }
            _ => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Returns the value for `key` regardless of freshness.
    ///
    /// Last-resort fallback for when all retries are exhausted.
    pub fn get_stale(&self, key: &str) -> Option<Bytes> {
        let now_ms = epoch_ms();
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;

        let mut stats = self.stats.lock().unwrap();
        if entry.is_fresh(now_ms) {
            stats.hits += 1;
        } else {
            stats.stale_hits += 1;
        }
        Some(entry.value.clone())
    }

    /// Inserts or overwrites the value for `key`.
    ///
    /// `ttl` falls back to the configured default when `None`. The entry is
    /// persisted to storage; a persistence failure is logged and the entry
    /// stays memory-only.
    pub async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        let ttl_ms = ttl.unwrap_or(self.config.default_ttl()).as_millis() as u64;
        let entry = CacheEntry {
            value,
            stored_at_ms: epoch_ms(),
            ttl_ms,
        };

        let persisted = PersistedEntry {
            stored_at_ms: entry.stored_at_ms,
            ttl_ms: entry.ttl_ms,
            value: entry.value.to_vec(),
        };

        {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(key.to_string(), entry);
            self.stats.lock().unwrap().writes += 1;
        }

        match serde_json::to_vec(&persisted) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(key, raw).await {
                    warn!(key = %key, error = %e, "Cache persistence failed; entry is memory-only");
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache entry serialization failed");
            }
        }
    }

    /// Removes the entry for `key` (forced refresh).
    pub async fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
        if let Err(e) = self.storage.delete(key).await {
            warn!(key = %key, error = %e, "Cache delete did not reach storage");
        }
    }

    /// Removes entries whose age exceeds `ttl * stale_grace_multiplier`.
    ///
    /// Returns the number of entries evicted. Entries that are merely
    /// expired but within grace are kept for stale reads.
    pub async fn sweep(&self) -> usize {
        let now_ms = epoch_ms();
        let grace = self.config.stale_grace_multiplier();

        let evicted: Vec<String> = {
            let mut entries = self.entries.lock().unwrap();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.past_grace(now_ms, grace))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };

        if !evicted.is_empty() {
            self.stats.lock().unwrap().evictions += evicted.len() as u64;
            debug!(count = evicted.len(), "Swept stale cache entries");
        }

        for key in &evicted {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key = %key, error = %e, "Swept entry still present in storage");
            }
        }

        evicted.len()
    }

    /// Returns true if any entry (fresh or stale) exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Current number of entries, fresh and stale.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap()
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> CacheConfig {
        self.config
    }
}
