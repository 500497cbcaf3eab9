//! Lock factory: the single entry point callers use to acquire locks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::backoff::{Backoff, DEFAULT_BACKOFF_CAP};
use crate::error::LockResult;
use crate::lock::{AcquireOptions, AcquireParams, DEFAULT_RETRY, DEFAULT_WAIT, DistributedLock};
use crate::store::LockStore;

/// Acquire locks on named resources.
#[async_trait]
pub trait DistributedLockFactory: Send + Sync {
    /// Acquire `resource` for at most `expiry`, waiting per `options`.
    ///
    /// ## Returns
    /// - `Ok(lock)` with `lock.is_acquired()` true when the lock is held
    /// - `Ok(lock)` with `TimedOut` / `Cancelled` outcome when it is not
    /// - `Err(LockError::Unavailable)` when the store stayed unreachable
    async fn acquire(
        &self,
        resource: &str,
        expiry: Duration,
        options: AcquireOptions,
    ) -> LockResult<DistributedLock>;
}

/// Defaults applied when [`AcquireOptions`] leaves a field unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockDefaults {
    pub wait: Duration,
    pub retry: Duration,
    pub backoff_cap: Duration,
}

impl Default for LockDefaults {
    fn default() -> Self {
        Self {
            wait: DEFAULT_WAIT,
            retry: DEFAULT_RETRY,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

/// Store-backed lock factory.
///
/// Holds a shared handle to the store and nothing else; constructing it does
/// no I/O and clones are interchangeable.
#[derive(Clone)]
pub struct LockFactory {
    store: Arc<dyn LockStore>,
    defaults: LockDefaults,
}

impl LockFactory {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            defaults: LockDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: LockDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> LockDefaults {
        self.defaults
    }

    pub fn store(&self) -> Arc<dyn LockStore> {
        self.store.clone()
    }

    fn resolve(&self, options: AcquireOptions) -> AcquireParams {
        let retry = options.retry.unwrap_or(self.defaults.retry);
        AcquireParams {
            wait: options.wait.unwrap_or(self.defaults.wait),
            retry,
            backoff: Backoff::new(retry).with_cap(self.defaults.backoff_cap),
            cancel: options.cancel.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl DistributedLockFactory for LockFactory {
    async fn acquire(
        &self,
        resource: &str,
        expiry: Duration,
        options: AcquireOptions,
    ) -> LockResult<DistributedLock> {
        let params = self.resolve(options);
        DistributedLock::acquire(self.store.clone(), resource, expiry, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLockStore;

    #[test]
    fn test_defaults() {
        let defaults = LockDefaults::default();
        assert_eq!(defaults.wait, Duration::from_secs(30));
        assert_eq!(defaults.retry, Duration::from_millis(200));
        assert_eq!(defaults.backoff_cap, Duration::from_millis(5000));
    }

    #[test]
    fn test_resolve_prefers_call_options() {
        let factory = LockFactory::new(Arc::new(MemoryLockStore::new()));
        let params = factory.resolve(
            AcquireOptions::new()
                .wait(Duration::from_secs(10))
                .retry(Duration::from_millis(100)),
        );
        assert_eq!(params.wait, Duration::from_secs(10));
        assert_eq!(params.retry, Duration::from_millis(100));
        assert_eq!(params.backoff.base, Duration::from_millis(100));
        assert!(!params.cancel.is_cancelled());
    }

    #[test]
    fn test_resolve_falls_back_to_factory_defaults() {
        let factory = LockFactory::new(Arc::new(MemoryLockStore::new())).with_defaults(LockDefaults {
            wait: Duration::from_secs(5),
            retry: Duration::from_millis(50),
            backoff_cap: Duration::from_secs(1),
        });
        let params = factory.resolve(AcquireOptions::default());
        assert_eq!(params.wait, Duration::from_secs(5));
        assert_eq!(params.retry, Duration::from_millis(50));
        assert_eq!(params.backoff.cap, Duration::from_secs(1));
    }

    #[test]
    fn test_construction_does_no_io() {
        let store = Arc::new(MemoryLockStore::new());
        let _factory = LockFactory::new(store.clone());
        assert_eq!(store.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_distinct_resources_do_not_contend() {
        let factory = LockFactory::new(Arc::new(MemoryLockStore::new()));
        let a = factory
            .acquire("a", Duration::from_secs(30), AcquireOptions::default())
            .await
            .unwrap();
        let b = factory
            .acquire("b", Duration::from_secs(30), AcquireOptions::default())
            .await
            .unwrap();
        assert!(a.is_acquired());
        assert!(b.is_acquired());
        assert_ne!(a.owner_token(), b.owner_token());
        a.release().await;
        b.release().await;
    }
}
