//! Store bootstrap: connects the lock store and the remote cache tier.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use kvlock_core::{CancelSignal, LockStore, MemoryLockStore, RedisLockStore};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::shutdown::run_with_shutdown;
use crate::cache::{DistributedCache, MemoryDistributedCache, RedisDistributedCache};
use crate::metrics::set_redis_connection_up;
use crate::model::StoreMode;

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub url: String,
    pub replica_url: Option<String>,
    /// Connection attempts made by the connection manager before giving up.
    pub connect_retry: u64,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Upper bound on the reconnect backoff delay.
    pub reconnect_max_delay: Duration,
    pub health_interval: Duration,
}

/// Everything the server needs from the store layer.
pub struct StoreBackends {
    pub lock_store: Arc<dyn LockStore>,
    pub remote_cache: Arc<dyn DistributedCache>,
    /// Housekeeping tasks; each exits once the shutdown signal fires.
    pub tasks: Vec<JoinHandle<()>>,
}

impl StoreBackends {
    /// In-process backends for single-node runs and tests.
    pub fn memory() -> Self {
        Self {
            lock_store: Arc::new(MemoryLockStore::new()),
            remote_cache: Arc::new(MemoryDistributedCache::new()),
            tasks: Vec::new(),
        }
    }
}

/// Build the store backends for `mode`.
///
/// In Redis mode this connects to the primary (and the replica when one is
/// configured) before returning. A primary that stays unreachable is fatal;
/// an unreachable replica is logged and reads fall back to the primary.
pub async fn init_store(
    mode: StoreMode,
    settings: &RedisSettings,
    shutdown: &CancelSignal,
) -> anyhow::Result<StoreBackends> {
    match mode {
        StoreMode::Memory => {
            info!("Using in-memory store; locks are only shared within this process");
            let lock_store = MemoryLockStore::new();
            let remote_cache = MemoryDistributedCache::new();
            let purge = spawn_memory_purge(
                lock_store.clone(),
                remote_cache.clone(),
                settings.health_interval,
                shutdown.clone(),
            );
            Ok(StoreBackends {
                lock_store: Arc::new(lock_store),
                remote_cache: Arc::new(remote_cache),
                tasks: vec![purge],
            })
        }
        StoreMode::Redis => {
            let primary = connect(&settings.url, settings, shutdown).await?;

            let mut lock_store = RedisLockStore::new(primary.clone());
            if let Some(replica_url) = &settings.replica_url {
                match connect(replica_url, settings, shutdown).await {
                    Ok(replica) => lock_store = lock_store.with_replica(replica),
                    Err(e) => warn!(error = %e, "Replica unavailable, routing all reads to primary"),
                }
            }

            let monitor = spawn_connection_monitor(
                primary.clone(),
                settings.health_interval,
                shutdown.clone(),
            );

            Ok(StoreBackends {
                lock_store: Arc::new(lock_store),
                remote_cache: Arc::new(RedisDistributedCache::new(primary)),
                tasks: vec![monitor],
            })
        }
    }
}

fn manager_config(settings: &RedisSettings) -> ConnectionManagerConfig {
    ConnectionManagerConfig::new()
        .set_number_of_retries(usize::try_from(settings.connect_retry).unwrap_or(usize::MAX))
        .set_max_delay(u64::try_from(settings.reconnect_max_delay.as_millis()).unwrap_or(u64::MAX))
        .set_connection_timeout(settings.connect_timeout)
        .set_response_timeout(settings.response_timeout)
}

/// Redact credentials before a URL is logged.
fn display_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

async fn connect(
    url: &str,
    settings: &RedisSettings,
    shutdown: &CancelSignal,
) -> anyhow::Result<ConnectionManager> {
    let endpoint = display_url(url);
    let client = redis::Client::open(url)
        .with_context(|| format!("invalid Redis URL {}", endpoint))?;

    info!(
        endpoint = %endpoint,
        retries = settings.connect_retry,
        "Connecting to Redis"
    );

    let attempt = ConnectionManager::new_with_config(client, manager_config(settings));
    match run_with_shutdown(attempt, shutdown).await {
        Some(Ok(manager)) => {
            info!(endpoint = %endpoint, "Redis connection established");
            Ok(manager)
        }
        Some(Err(e)) => {
            error!(endpoint = %endpoint, error = %e, "Redis connection failed");
            Err(e).with_context(|| format!("failed to connect to Redis at {}", endpoint))
        }
        None => bail!("shutdown requested while connecting to Redis at {}", endpoint),
    }
}

/// Probe the primary periodically and log connection state transitions.
fn spawn_connection_monitor(
    connection: ConnectionManager,
    interval: Duration,
    shutdown: CancelSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut healthy = true;
        set_redis_connection_up(true);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let mut conn = connection.clone();
            let probe: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            match (probe, healthy) {
                (Ok(_), false) => {
                    info!("Redis connection restored");
                    healthy = true;
                    set_redis_connection_up(true);
                }
                (Err(e), true) => {
                    error!(error = %e, "Redis connection failed");
                    healthy = false;
                    set_redis_connection_up(false);
                }
                _ => {}
            }
        }
    })
}

/// Expired memory entries are never read, but they still occupy memory.
fn spawn_memory_purge(
    lock_store: MemoryLockStore,
    remote_cache: MemoryDistributedCache,
    interval: Duration,
    shutdown: CancelSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let locks = lock_store.purge_expired();
            let entries = remote_cache.purge_expired();
            if locks + entries > 0 {
                tracing::debug!(locks, entries, "Purged expired in-memory entries");
            }
        }
    })
}
