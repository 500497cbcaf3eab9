//! Configuration keys and default values for the kvlock server

use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const ENV_PREFIX: &str = "KVLOCK";
pub const ENV_SEPARATOR: &str = "__";

// Server
pub const SERVER_ADDRESS_PROPERTY: &str = "server.address";
pub const SERVER_PORT_PROPERTY: &str = "server.port";
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8080;

// Store
pub const STORE_MODE_PROPERTY: &str = "store.mode";
pub const STORE_MODE_REDIS: &str = "redis";
pub const STORE_MODE_MEMORY: &str = "memory";

// Redis
pub const REDIS_URL_PROPERTY: &str = "redis.url";
pub const REDIS_REPLICA_URL_PROPERTY: &str = "redis.replica_url";
pub const REDIS_CONNECT_RETRY_PROPERTY: &str = "redis.connect_retry";
pub const REDIS_CONNECT_TIMEOUT_MS_PROPERTY: &str = "redis.connect_timeout_ms";
pub const REDIS_RESPONSE_TIMEOUT_MS_PROPERTY: &str = "redis.response_timeout_ms";
pub const REDIS_RECONNECT_MAX_DELAY_MS_PROPERTY: &str = "redis.reconnect_max_delay_ms";
pub const REDIS_HEALTH_INTERVAL_MS_PROPERTY: &str = "redis.health_interval_ms";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_REDIS_CONNECT_RETRY: u64 = 5;
pub const DEFAULT_REDIS_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_REDIS_RECONNECT_MAX_DELAY_MS: u64 = 5000;
pub const DEFAULT_REDIS_HEALTH_INTERVAL_MS: u64 = 5000;

// Lock
pub const LOCK_DEFAULT_WAIT_MS_PROPERTY: &str = "lock.default_wait_ms";
pub const LOCK_DEFAULT_RETRY_MS_PROPERTY: &str = "lock.default_retry_ms";
pub const LOCK_BACKOFF_CAP_MS_PROPERTY: &str = "lock.backoff_cap_ms";

// Cache
pub const CACHE_EXPIRATION_SECS_PROPERTY: &str = "cache.expiration_secs";
pub const CACHE_LOCAL_EXPIRATION_SECS_PROPERTY: &str = "cache.local_expiration_secs";
pub const CACHE_MAX_PAYLOAD_BYTES_PROPERTY: &str = "cache.max_payload_bytes";
pub const CACHE_MAX_KEY_LENGTH_PROPERTY: &str = "cache.max_key_length";
pub const CACHE_LOCAL_CAPACITY_PROPERTY: &str = "cache.local_capacity";
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 600;
pub const DEFAULT_CACHE_LOCAL_EXPIRATION_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_PAYLOAD_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_CACHE_MAX_KEY_LENGTH: u64 = 512;
pub const DEFAULT_CACHE_LOCAL_CAPACITY: u64 = 10_000;

// Logging
pub const LOGGING_DIR_PROPERTY: &str = "logging.dir";
pub const LOGGING_CONSOLE_PROPERTY: &str = "logging.console";
pub const LOGGING_FILE_PROPERTY: &str = "logging.file";
pub const LOGGING_LEVEL_PROPERTY: &str = "logging.level";
pub const LOGGING_ROTATION_PROPERTY: &str = "logging.rotation";

// Shutdown
pub const SHUTDOWN_TIMEOUT_SECS_PROPERTY: &str = "shutdown.timeout_secs";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// Counter endpoint
pub const COUNTER_RESOURCE: &str = "count";
pub const COUNTER_CACHE_KEY: &str = "COUNT";
pub const COUNTER_LOCK_EXPIRY: Duration = Duration::from_secs(30);
pub const COUNTER_LOCK_WAIT: Duration = Duration::from_secs(10);
pub const COUNTER_LOCK_RETRY: Duration = Duration::from_millis(100);
pub const COUNTER_CACHE_EXPIRATION: Duration = Duration::from_secs(600);
pub const COUNTER_CACHE_LOCAL_EXPIRATION: Duration = Duration::from_secs(30);
