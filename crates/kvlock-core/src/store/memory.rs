// In-process lock store with the same atomic semantics as the Redis adapter.
// Used by tests and by single-process deployments that do not need Redis.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

use super::{LockStore, Route, SetWhen};
use crate::error::StoreResult;

struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct StatsCollector {
    set_calls: AtomicU64,
    delete_calls: AtomicU64,
    primary_routed: AtomicU64,
}

/// Snapshot of the calls a [`MemoryLockStore`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub set_calls: u64,
    pub delete_calls: u64,
    pub primary_routed: u64,
}

/// DashMap-backed lock store. Clones share the same keyspace.
///
/// Expiry uses `tokio::time::Instant`, so a paused test clock drives TTLs.
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    entries: Arc<DashMap<String, StoredValue>>,
    stats: Arc<StatsCollector>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live value of `key`, if any.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remaining TTL of `key`, if it is live.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(count = purged, "Purged expired lock entries");
        }
        purged
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            set_calls: self.stats.set_calls.load(Ordering::Relaxed),
            delete_calls: self.stats.delete_calls.load(Ordering::Relaxed),
            primary_routed: self.stats.primary_routed.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        self.stats.set_calls.fetch_add(1, Ordering::Relaxed);
        if route == Route::Primary {
            self.stats.primary_routed.fetch_add(1, Ordering::Relaxed);
        }

        let now = Instant::now();
        let stored = StoredValue {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        // The entry guard holds the shard lock, so check and write are atomic.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if when == SetWhen::NotExists && !occupied.get().is_expired(now) {
                    return Ok(false);
                }
                occupied.insert(stored);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(stored);
                Ok(true)
            }
        }
    }

    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64> {
        self.stats.delete_calls.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| !entry.is_expired(now) && entry.value == expected);
        Ok(u64::from(removed.is_some()))
    }
}
