//! Redis-backed lock store.
//!
//! Acquisition uses `SET key value NX PX ttl` so the write and its expiration
//! land in one command. Release runs [`RELEASE_SCRIPT`], which compares the
//! stored owner token and deletes in a single server-side step.

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{Script, cmd};
use async_trait::async_trait;
use tracing::trace;

use super::{LockStore, Route, SetWhen};
use crate::error::StoreResult;

/// Compare-and-delete executed atomically by the Redis server.
pub const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Lock store over a shared Redis [`ConnectionManager`].
///
/// Cloning is cheap; every clone multiplexes onto the same connection.
#[derive(Clone)]
pub struct RedisLockStore {
    primary: ConnectionManager,
    replica: Option<ConnectionManager>,
    release_script: Script,
}

impl RedisLockStore {
    /// Wrap an already established connection to the primary.
    pub fn new(primary: ConnectionManager) -> Self {
        Self {
            primary,
            replica: None,
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    /// Serve [`Route::Any`] commands from a replica connection.
    pub fn with_replica(mut self, replica: ConnectionManager) -> Self {
        self.replica = Some(replica);
        self
    }

    fn connection(&self, route: Route) -> ConnectionManager {
        match (route, &self.replica) {
            (Route::Any, Some(replica)) => replica.clone(),
            _ => self.primary.clone(),
        }
    }
}

/// Redis rejects `PX 0`; round sub-millisecond TTLs up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        when: SetWhen,
        route: Route,
    ) -> StoreResult<bool> {
        let mut conn = self.connection(route);

        let mut command = cmd("SET");
        command.arg(key).arg(value).arg("PX").arg(ttl_millis(ttl));
        if when == SetWhen::NotExists {
            command.arg("NX");
        }

        // Nil reply means the NX precondition failed.
        let reply: Option<String> = command.query_async(&mut conn).await?;
        trace!(key = %key, written = reply.is_some(), "SET reply");
        Ok(reply.is_some())
    }

    async fn conditional_delete(&self, key: &str, expected: &str) -> StoreResult<u64> {
        let mut conn = self.primary.clone();
        let deleted: u64 = self
            .release_script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted)
    }
}
