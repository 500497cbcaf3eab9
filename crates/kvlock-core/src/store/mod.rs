//! Store adapter capability consumed by the lock.
//!
//! A [`LockStore`] only needs two atomic primitives: a conditional set that
//! writes the value and its TTL in one step, and a compare-and-delete executed
//! indivisibly on the server. Everything else (retry, backoff, ownership
//! bookkeeping) lives in [`crate::lock`].

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use self::memory::{MemoryLockStore, MemoryStoreStats};
pub use self::redis::{RELEASE_SCRIPT, RedisLockStore};

/// Precondition for [`LockStore::conditional_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetWhen {
    /// Write only if the key does not exist.
    NotExists,
    /// Write unconditionally.
    Always,
}

/// Which node should serve a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// The authoritative primary. Required for lock operations.
    #[default]
    Primary,
    /// Any node, replicas included.
    Any,
}

/// Atomic primitives a key-value store must offer to back a distributed lock.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key = value` with expiration `ttl`, subject to `when`.
    ///
    /// The TTL must be applied in the same command as the write.
    /// Returns `true` if the value was written.
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns the number of keys deleted (0 or 1).
    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64>;
}
