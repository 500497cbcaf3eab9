use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{CacheError, CacheResult, DistributedCache};
use crate::metrics::{record_cache_hit, record_cache_miss};

const TIER_LOCAL: &str = "local";
const TIER_REMOTE: &str = "remote";

/// Per-entry expirations for both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridCacheEntryOptions {
    /// Lifetime in the remote tier.
    pub expiration: Duration,
    /// Lifetime in the local tier, never longer than `expiration`.
    pub local_expiration: Duration,
}

impl Default for HybridCacheEntryOptions {
    fn default() -> Self {
        Self {
            expiration: Duration::from_secs(600),
            local_expiration: Duration::from_secs(300),
        }
    }
}

impl HybridCacheEntryOptions {
    fn local_ttl(&self) -> Duration {
        self.local_expiration.min(self.expiration)
    }
}

/// Size limits enforced before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_payload_bytes: usize,
    pub max_key_length: usize,
    pub local_capacity: u64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1024 * 1024,
            max_key_length: 512,
            local_capacity: 10_000,
        }
    }
}

#[derive(Clone)]
struct LocalEntry {
    payload: Arc<Vec<u8>>,
    ttl: Duration,
}

impl LocalEntry {
    fn new(payload: Vec<u8>, options: HybridCacheEntryOptions) -> Self {
        Self {
            payload: Arc::new(payload),
            ttl: options.local_ttl(),
        }
    }
}

/// Expires each local entry after the TTL it was written with.
struct LocalExpiry;

impl Expiry<String, LocalEntry> for LocalExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Read-through cache over a fast local tier and a shared remote tier.
///
/// Reads check the local tier, then the remote tier, then fall back to the
/// caller's factory. Concurrent misses for the same key are coalesced into one
/// load; writes through [`HybridCache::set`] are not, so callers that need a
/// single writer serialize through a lock.
#[derive(Clone)]
pub struct HybridCache {
    local: Cache<String, LocalEntry>,
    remote: Arc<dyn DistributedCache>,
    limits: CacheLimits,
    default_options: HybridCacheEntryOptions,
}

impl HybridCache {
    pub fn new(remote: Arc<dyn DistributedCache>, limits: CacheLimits) -> Self {
        let local = Cache::builder()
            .max_capacity(limits.local_capacity)
            .expire_after(LocalExpiry)
            .build();
        Self {
            local,
            remote,
            limits,
            default_options: HybridCacheEntryOptions::default(),
        }
    }

    pub fn with_default_options(mut self, options: HybridCacheEntryOptions) -> Self {
        self.default_options = options;
        self
    }

    pub fn default_options(&self) -> HybridCacheEntryOptions {
        self.default_options
    }

    /// Return the cached value for `key`, creating it with `factory` on a
    /// miss in both tiers. Remote read and write failures are logged and
    /// degrade to the local tier.
    ///
    /// Concurrent misses for the same key share one load: a single caller
    /// reads the remote tier and runs its factory while the others wait for
    /// that entry.
    pub async fn get_or_create<T, F, Fut>(
        &self,
        key: &str,
        factory: F,
        options: Option<HybridCacheEntryOptions>,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.check_key(key)?;
        let options = options.unwrap_or(self.default_options);

        if let Some(entry) = self.local.get(key).await {
            match serde_json::from_slice(&entry.payload) {
                Ok(value) => {
                    record_cache_hit(TIER_LOCAL);
                    return Ok(value);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable local entry");
                    self.local.invalidate(key).await;
                }
            }
        }

        let mut loaded: Option<T> = None;
        let entry = self
            .local
            .try_get_with(key.to_string(), self.load(key, factory, options, &mut loaded))
            .await
            .map_err(CacheError::from_shared)?;

        if let Some(value) = loaded {
            return Ok(value);
        }
        // Filled by a concurrent caller's load.
        record_cache_hit(TIER_LOCAL);
        Ok(serde_json::from_slice(&entry.payload)?)
    }

    /// Load a missing local entry from the remote tier, or from `factory`
    /// when the remote tier has nothing usable. The decoded value is left in
    /// `loaded`.
    async fn load<T, F, Fut>(
        &self,
        key: &str,
        factory: F,
        options: HybridCacheEntryOptions,
        loaded: &mut Option<T>,
    ) -> CacheResult<LocalEntry>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        record_cache_miss(TIER_LOCAL);

        match self.remote.get(key).await {
            Ok(Some(payload)) => match serde_json::from_slice(&payload) {
                Ok(value) => {
                    record_cache_hit(TIER_REMOTE);
                    *loaded = Some(value);
                    return Ok(LocalEntry::new(payload, options));
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable remote entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Remote cache read failed, using factory"),
        }
        record_cache_miss(TIER_REMOTE);

        let value = factory().await;
        let payload = self.encode(&value)?;
        if let Err(e) = self
            .remote
            .set(key, payload.clone(), options.expiration)
            .await
        {
            warn!(key = %key, error = %e, "Remote cache write failed, caching locally only");
        }
        debug!(key = %key, "Cache entry created");
        *loaded = Some(value);
        Ok(LocalEntry::new(payload, options))
    }

    /// Overwrite `key` in both tiers. A remote failure is returned and leaves
    /// the local tier untouched.
    pub async fn set<T>(
        &self,
        key: &str,
        value: &T,
        options: Option<HybridCacheEntryOptions>,
    ) -> CacheResult<()>
    where
        T: Serialize,
    {
        self.check_key(key)?;
        let options = options.unwrap_or(self.default_options);
        let payload = self.encode(value)?;

        self.remote
            .set(key, payload.clone(), options.expiration)
            .await?;
        self.insert_local(key, payload, options).await;
        Ok(())
    }

    async fn insert_local(&self, key: &str, payload: Vec<u8>, options: HybridCacheEntryOptions) {
        self.local
            .insert(key.to_string(), LocalEntry::new(payload, options))
            .await;
    }

    fn check_key(&self, key: &str) -> CacheResult<()> {
        if key.len() > self.limits.max_key_length {
            return Err(CacheError::KeyTooLong {
                length: key.len(),
                max: self.limits.max_key_length,
            });
        }
        Ok(())
    }

    fn encode<T: Serialize>(&self, value: &T) -> CacheResult<Vec<u8>> {
        let payload = serde_json::to_vec(value)?;
        if payload.len() > self.limits.max_payload_bytes {
            return Err(CacheError::PayloadTooLarge {
                size: payload.len(),
                max: self.limits.max_payload_bytes,
            });
        }
        Ok(payload)
    }
}
