//! Error types for lock acquisition and the store adapter.
//!
//! Contention timeouts and cancellation are not errors: they are reported
//! through [`crate::AcquireOutcome`] on a returned lock. Only a store that stays
//! unreachable past the wait budget, invalid arguments, and unexpected store
//! faults cross the component boundary as [`LockError`].

use thiserror::Error;

/// Result type for store adapter operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors raised by a [`crate::store::LockStore`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connectivity or timeout class failure; the call may succeed if retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other store failure (bad reply, script error, wrong type, ...).
    #[error("store command failed: {0}")]
    Command(String),
}

impl StoreError {
    /// Whether the acquisition loop may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        let transient = err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_cluster_error()
            || matches!(
                err.kind(),
                redis::ErrorKind::TryAgain | redis::ErrorKind::BusyLoadingError
            );

        if transient {
            StoreError::Unavailable(format!("Redis error: {}", err))
        } else {
            StoreError::Command(format!("Redis error: {}", err))
        }
    }
}

/// Errors that escape [`crate::LockFactory::acquire`].
#[derive(Error, Debug)]
pub enum LockError {
    /// Rejected before any I/O (empty resource name, zero expiry, ...).
    #[error("invalid lock argument: {0}")]
    InvalidArgument(String),

    /// The store stayed unreachable until the wait budget ran out.
    #[error("failed to acquire lock for resource '{resource}' after {attempts} attempts: {source}")]
    Unavailable {
        resource: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A non-transient store failure; never retried.
    #[error("unexpected store error for resource '{resource}': {source}")]
    Store {
        resource: String,
        #[source]
        source: StoreError,
    },
}

impl LockError {
    /// True when the caller should answer with a retryable "unavailable" response.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LockError::Unavailable { .. })
    }
}
