// Shared fixtures for HTTP API tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvlock_core::{
    CancelSignal, LockFactory, LockStore, MemoryLockStore, Route, SetWhen, StoreError, StoreResult,
};
use kvlock_server::AppState;
use kvlock_server::cache::{CacheLimits, DistributedCache, HybridCache, MemoryDistributedCache};

pub struct Fixture {
    pub state: AppState,
    pub remote: MemoryDistributedCache,
}

/// App state over the given lock store and a fresh in-memory remote tier.
pub fn fixture(store: Arc<dyn LockStore>) -> Fixture {
    let remote = MemoryDistributedCache::new();
    let remote_tier: Arc<dyn DistributedCache> = Arc::new(remote.clone());
    let cache = HybridCache::new(remote_tier, CacheLimits::default());
    let state = AppState::new(Arc::new(LockFactory::new(store)), cache, CancelSignal::new());
    Fixture { state, remote }
}

pub fn memory_fixture() -> (Fixture, MemoryLockStore) {
    let store = MemoryLockStore::new();
    (fixture(Arc::new(store.clone())), store)
}

/// Occupy the counter lock on behalf of another process.
pub async fn hold_counter_lock(store: &MemoryLockStore, ttl: Duration) {
    let written = store
        .conditional_set("lock:count", "other-host:1", ttl, SetWhen::NotExists, Route::Primary)
        .await
        .unwrap();
    assert!(written);
}

/// Every conditional set fails as if the store were unreachable.
pub struct UnreachableStore;

#[async_trait]
impl LockStore for UnreachableStore {
    async fn conditional_set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
        _when: SetWhen,
        _route: Route,
    ) -> StoreResult<bool> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn conditional_delete(&self, _key: &str, _expected: &str) -> StoreResult<u64> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Every conditional set fails with a non-transient error.
pub struct MisconfiguredStore;

#[async_trait]
impl LockStore for MisconfiguredStore {
    async fn conditional_set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
        _when: SetWhen,
        _route: Route,
    ) -> StoreResult<bool> {
        Err(StoreError::Command(
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
        ))
    }

    async fn conditional_delete(&self, _key: &str, _expected: &str) -> StoreResult<u64> {
        Ok(0)
    }
}

/// Writes each conditional set straight away and answers `latency` later.
#[derive(Clone)]
pub struct DelayedReplyStore {
    pub inner: MemoryLockStore,
    pub latency: Duration,
}

#[async_trait]
impl LockStore for DelayedReplyStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        let written = self.inner.conditional_set(key, value, ttl, when, route).await;
        tokio::time::sleep(self.latency).await;
        written
    }

    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64> {
        self.inner.conditional_delete(key, expected).await
    }
}
