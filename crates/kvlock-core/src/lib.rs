//! kvlock Core - Distributed mutual exclusion over a shared key-value store
//!
//! This crate provides:
//! - A store adapter capability (`LockStore`) with Redis and in-memory adapters
//! - Lock acquisition with bounded wait, exponential backoff and jitter
//! - Ownership-checked, idempotent release
//! - A lock factory that binds a shared store to lock creation
//!
//! Mutual exclusion is decided by the store's atomic set-if-absent, never by
//! local synchronization, so any number of processes can share one store.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use kvlock_core::{AcquireOptions, DistributedLockFactory, LockFactory, MemoryLockStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = LockFactory::new(Arc::new(MemoryLockStore::new()));
//! let lock = factory
//!     .acquire(
//!         "count",
//!         Duration::from_secs(30),
//!         AcquireOptions::new()
//!             .wait(Duration::from_secs(10))
//!             .retry(Duration::from_millis(100)),
//!     )
//!     .await?;
//!
//! if lock.is_acquired() {
//!     lock.scope(async {
//!         // protected work
//!     })
//!     .await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod error;
pub mod factory;
pub mod lock;
pub mod signal;
pub mod store;

pub use backoff::Backoff;
pub use error::{LockError, LockResult, StoreError, StoreResult};
pub use factory::{DistributedLockFactory, LockDefaults, LockFactory};
pub use lock::{AcquireOptions, AcquireOutcome, DistributedLock, LOCK_KEY_PREFIX, resource_key};
pub use signal::CancelSignal;
pub use store::{LockStore, MemoryLockStore, RedisLockStore, Route, SetWhen};
