//! Two-tier cache: an in-process moka tier in front of a shared remote tier.
//!
//! Entries are JSON encoded once and stored as bytes in both tiers, so any
//! process sharing the remote tier can read what another one wrote.

mod hybrid;
mod remote;

pub use hybrid::{CacheLimits, HybridCache, HybridCacheEntryOptions};
pub use remote::{DistributedCache, MemoryDistributedCache, RedisDistributedCache};

use std::sync::Arc;

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key length {length} exceeds maximum {max}")]
    KeyTooLong { length: usize, max: usize },

    #[error("cache payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote cache error: {0}")]
    Remote(String),

    /// Failure of a load shared with other callers waiting on the same key.
    #[error(transparent)]
    Shared(Arc<CacheError>),
}

impl CacheError {
    /// Unwrap an error returned by a coalesced load, keeping it shared only
    /// when other callers still hold it.
    pub(crate) fn from_shared(err: Arc<CacheError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(CacheError::Shared)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Remote(err.to_string())
    }
}
