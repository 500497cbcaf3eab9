// Shared test doubles for lock protocol tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kvlock_core::{LockStore, MemoryLockStore, Route, SetWhen, StoreError, StoreResult};
use tokio::time::Instant;

/// Fails the first `failures` conditional sets with a transient error, then
/// delegates to an in-memory store. `u32::MAX` means "always fail".
pub struct FlakyStore {
    pub inner: MemoryLockStore,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryLockStore::new(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockStore for FlakyStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.conditional_set(key, value, ttl, when, route).await
    }

    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64> {
        self.inner.conditional_delete(key, expected).await
    }
}

/// Every call fails with a non-transient error.
#[derive(Default)]
pub struct BrokenStore {
    calls: AtomicU32,
}

impl BrokenStore {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockStore for BrokenStore {
    async fn conditional_set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
        _when: SetWhen,
        _route: Route,
    ) -> StoreResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Command("WRONGTYPE Operation against a key".to_string()))
    }

    async fn conditional_delete(&self, _key: &str, _expected: &str) -> StoreResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection reset".to_string()))
    }
}

/// Delays every conditional set by `latency` before delegating.
pub struct SlowStore {
    pub inner: MemoryLockStore,
    latency: Duration,
}

impl SlowStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            inner: MemoryLockStore::new(),
            latency,
        }
    }
}

#[async_trait]
impl LockStore for SlowStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        tokio::time::sleep(self.latency).await;
        self.inner.conditional_set(key, value, ttl, when, route).await
    }

    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64> {
        self.inner.conditional_delete(key, expected).await
    }
}

/// Applies every conditional set immediately but holds back the reply for
/// `latency`, like a store whose response is lost in transit.
pub struct LateReplyStore {
    pub inner: MemoryLockStore,
    latency: Duration,
}

impl LateReplyStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            inner: MemoryLockStore::new(),
            latency,
        }
    }
}

#[async_trait]
impl LockStore for LateReplyStore {
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

/// Records when each conditional set was issued.
pub struct RecordingStore {
    pub inner: MemoryLockStore,
    set_times: Mutex<Vec<Instant>>,
}

impl RecordingStore {
    pub fn new(inner: MemoryLockStore) -> Self {
        Self {
            inner,
            set_times: Mutex::new(Vec::new()),
        }
    }

    pub fn set_times(&self) -> Vec<Instant> {
        self.set_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl LockStore for RecordingStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        self.set_times.lock().unwrap().push(Instant::now());
        self.inner.conditional_set(key, value, ttl, when, route).await
    }

    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64> {
        self.inner.conditional_delete(key, expected).await
    }
}

/// Occupy `lock:<resource>` on behalf of a foreign holder.
pub async fn hold_foreign(store: &MemoryLockStore, resource: &str, ttl: Duration) {
    let written = store
        .conditional_set(
            &format!("lock:{}", resource),
            "foreign-holder",
            ttl,
            SetWhen::NotExists,
            Route::Primary,
        )
        .await
        .unwrap();
    assert!(written);
}

/// Grants every conditional set but fails every conditional delete.
#[derive(Default)]
pub struct ReleaseFailStore {
    pub inner: MemoryLockStore,
    delete_calls: AtomicU32,
}

impl ReleaseFailStore {
    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockStore for ReleaseFailStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        self.inner.conditional_set(key, value, ttl, when, route).await
    }

    async fn conditional_delete(&self, _key: &str, _expected: &str) -> StoreResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection reset by peer".to_string()))
    }
}
