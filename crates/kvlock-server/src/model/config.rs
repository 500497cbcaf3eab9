//! Configuration management for the kvlock server
//!
//! Sources are layered lowest to highest: `conf/application.yml` (optional),
//! `KVLOCK_*` environment variables, then command line flags.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use config::{Config, Environment};
use kvlock_core::LockDefaults;

use super::constants::*;
use crate::cache::{CacheLimits, HybridCacheEntryOptions};
use crate::startup::{LogRotation, LoggingConfig, RedisSettings};

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "kvlock-server", version, about = "Shared counter guarded by a distributed lock")]
pub struct Cli {
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    #[arg(long = "redis-url", env = "REDIS_URL")]
    pub redis_url: Option<String>,
    #[arg(short = 'm', long = "store-mode")]
    pub store_mode: Option<String>,
}

/// Backing store for locks and the remote cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Redis,
    Memory,
}

impl FromStr for StoreMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            STORE_MODE_REDIS => Ok(StoreMode::Redis),
            STORE_MODE_MEMORY => Ok(StoreMode::Memory),
            other => Err(anyhow!(
                "unknown store mode '{}', expected '{}' or '{}'",
                other,
                STORE_MODE_REDIS,
                STORE_MODE_MEMORY
            )),
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreMode::Redis => write!(f, "{}", STORE_MODE_REDIS),
            StoreMode::Memory => write!(f, "{}", STORE_MODE_MEMORY),
        }
    }
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration using the process command line.
    pub fn new() -> anyhow::Result<Self> {
        Self::load(Cli::parse())
    }

    pub fn load(args: Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(&args.config).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );

        if let Some(port) = args.port {
            builder = builder.set_override(SERVER_PORT_PROPERTY, i64::from(port))?;
        }
        if let Some(url) = args.redis_url {
            builder = builder.set_override(REDIS_URL_PROPERTY, url)?;
        }
        if let Some(mode) = args.store_mode {
            builder = builder.set_override(STORE_MODE_PROPERTY, mode)?;
        }

        let config = builder
            .build()
            .with_context(|| format!("failed to build configuration from {}", args.config))?;

        let configuration = Self::from_config(config);
        configuration.store_mode()?;
        configuration.lock_defaults()?;
        Ok(configuration)
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    fn get_millis(&self, key: &str, default: u64) -> Duration {
        Duration::from_millis(self.get_u64(key, default))
    }

    fn get_secs(&self, key: &str, default: u64) -> Duration {
        Duration::from_secs(self.get_u64(key, default))
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS_PROPERTY)
            .unwrap_or(DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT_PROPERTY)
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.get_secs(SHUTDOWN_TIMEOUT_SECS_PROPERTY, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
    }

    // ========================================================================
    // Store Configuration
    // ========================================================================

    pub fn store_mode(&self) -> anyhow::Result<StoreMode> {
        self.config
            .get_string(STORE_MODE_PROPERTY)
            .unwrap_or(STORE_MODE_REDIS.to_string())
            .parse()
    }

    pub fn redis_url(&self) -> String {
        self.config
            .get_string(REDIS_URL_PROPERTY)
            .unwrap_or(DEFAULT_REDIS_URL.to_string())
    }

    pub fn redis_replica_url(&self) -> Option<String> {
        self.config
            .get_string(REDIS_REPLICA_URL_PROPERTY)
            .ok()
            .filter(|url| !url.trim().is_empty())
    }

    pub fn redis_settings(&self) -> RedisSettings {
        RedisSettings {
            url: self.redis_url(),
            replica_url: self.redis_replica_url(),
            connect_retry: self.get_u64(REDIS_CONNECT_RETRY_PROPERTY, DEFAULT_REDIS_CONNECT_RETRY),
            connect_timeout: self
                .get_millis(REDIS_CONNECT_TIMEOUT_MS_PROPERTY, DEFAULT_REDIS_TIMEOUT_MS),
            response_timeout: self
                .get_millis(REDIS_RESPONSE_TIMEOUT_MS_PROPERTY, DEFAULT_REDIS_TIMEOUT_MS),
            reconnect_max_delay: self.get_millis(
                REDIS_RECONNECT_MAX_DELAY_MS_PROPERTY,
                DEFAULT_REDIS_RECONNECT_MAX_DELAY_MS,
            ),
            health_interval: self.get_millis(
                REDIS_HEALTH_INTERVAL_MS_PROPERTY,
                DEFAULT_REDIS_HEALTH_INTERVAL_MS,
            ),
        }
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn lock_defaults(&self) -> anyhow::Result<LockDefaults> {
        let defaults = LockDefaults::default();
        let resolved = LockDefaults {
            wait: self.get_millis(
                LOCK_DEFAULT_WAIT_MS_PROPERTY,
                defaults.wait.as_millis() as u64,
            ),
            retry: self.get_millis(
                LOCK_DEFAULT_RETRY_MS_PROPERTY,
                defaults.retry.as_millis() as u64,
            ),
            backoff_cap: self.get_millis(
                LOCK_BACKOFF_CAP_MS_PROPERTY,
                defaults.backoff_cap.as_millis() as u64,
            ),
        };
        if resolved.retry.is_zero() {
            return Err(anyhow!("{} must be greater than zero", LOCK_DEFAULT_RETRY_MS_PROPERTY));
        }
        if resolved.backoff_cap.is_zero() {
            return Err(anyhow!("{} must be greater than zero", LOCK_BACKOFF_CAP_MS_PROPERTY));
        }
        Ok(resolved)
    }

    // ========================================================================
    // Cache Configuration
    // ========================================================================

    pub fn cache_entry_options(&self) -> HybridCacheEntryOptions {
        HybridCacheEntryOptions {
            expiration: self.get_secs(CACHE_EXPIRATION_SECS_PROPERTY, DEFAULT_CACHE_EXPIRATION_SECS),
            local_expiration: self.get_secs(
                CACHE_LOCAL_EXPIRATION_SECS_PROPERTY,
                DEFAULT_CACHE_LOCAL_EXPIRATION_SECS,
            ),
        }
    }

    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits {
            max_payload_bytes: self
                .get_u64(CACHE_MAX_PAYLOAD_BYTES_PROPERTY, DEFAULT_CACHE_MAX_PAYLOAD_BYTES)
                as usize,
            max_key_length: self
                .get_u64(CACHE_MAX_KEY_LENGTH_PROPERTY, DEFAULT_CACHE_MAX_KEY_LENGTH)
                as usize,
            local_capacity: self
                .get_u64(CACHE_LOCAL_CAPACITY_PROPERTY, DEFAULT_CACHE_LOCAL_CAPACITY),
        }
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        let rotation = self
            .config
            .get_string(LOGGING_ROTATION_PROPERTY)
            .ok()
            .and_then(|v| v.parse::<LogRotation>().ok())
            .unwrap_or(LogRotation::Daily);

        LoggingConfig::from_config(
            self.config.get_string(LOGGING_DIR_PROPERTY).ok(),
            self.config.get_bool(LOGGING_CONSOLE_PROPERTY).unwrap_or(true),
            self.config.get_bool(LOGGING_FILE_PROPERTY).unwrap_or(true),
            self.config
                .get_string(LOGGING_LEVEL_PROPERTY)
                .unwrap_or("info".to_string()),
        )
        .with_rotation(rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration(overrides: &[(&str, &str)]) -> Configuration {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        Configuration::from_config(builder.build().unwrap())
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = Configuration::default();
        assert_eq!(config.server_address(), "0.0.0.0");
        assert_eq!(config.server_port(), 8080);
        assert_eq!(config.store_mode().unwrap(), StoreMode::Redis);
        assert_eq!(config.redis_url(), "redis://127.0.0.1:6379");
        assert_eq!(config.redis_replica_url(), None);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));

        let redis = config.redis_settings();
        assert_eq!(redis.connect_retry, 5);
        assert_eq!(redis.connect_timeout, Duration::from_millis(5000));
        assert_eq!(redis.response_timeout, Duration::from_millis(5000));
        assert_eq!(redis.reconnect_max_delay, Duration::from_millis(5000));

        assert_eq!(config.lock_defaults().unwrap(), LockDefaults::default());

        let options = config.cache_entry_options();
        assert_eq!(options.expiration, Duration::from_secs(600));
        assert_eq!(options.local_expiration, Duration::from_secs(300));

        let limits = config.cache_limits();
        assert_eq!(limits.max_payload_bytes, 1024 * 1024);
        assert_eq!(limits.max_key_length, 512);
    }

    #[test]
    fn test_values_from_source() {
        let config = configuration(&[
            ("server.port", "9100"),
            ("store.mode", "Memory"),
            ("redis.replica_url", "redis://replica:6379"),
            ("lock.default_wait_ms", "1500"),
            ("lock.default_retry_ms", "50"),
            ("cache.max_key_length", "64"),
        ]);
        assert_eq!(config.server_port(), 9100);
        assert_eq!(config.store_mode().unwrap(), StoreMode::Memory);
        assert_eq!(
            config.redis_replica_url().as_deref(),
            Some("redis://replica:6379")
        );
        let defaults = config.lock_defaults().unwrap();
        assert_eq!(defaults.wait, Duration::from_millis(1500));
        assert_eq!(defaults.retry, Duration::from_millis(50));
        assert_eq!(config.cache_limits().max_key_length, 64);
    }

    #[test]
    fn test_zero_lock_retry_is_an_error() {
        let config = configuration(&[("lock.default_retry_ms", "0")]);
        assert!(config.lock_defaults().is_err());

        let config = configuration(&[("lock.backoff_cap_ms", "0")]);
        assert!(config.lock_defaults().is_err());
    }

    #[test]
    fn test_blank_replica_url_is_ignored() {
        let config = configuration(&[("redis.replica_url", "  ")]);
        assert_eq!(config.redis_replica_url(), None);
    }

    #[test]
    fn test_invalid_port_falls_back_to_default() {
        let config = configuration(&[("server.port", "70000")]);
        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_unknown_store_mode_is_an_error() {
        let config = configuration(&[("store.mode", "etcd")]);
        let err = config.store_mode().unwrap_err();
        assert!(err.to_string().contains("etcd"));
    }

    #[test]
    fn test_cli_overrides_and_missing_file() {
        let args = Cli::parse_from([
            "kvlock-server",
            "--config",
            "/nonexistent/kvlock/application.yml",
            "--port",
            "9090",
            "--store-mode",
            "memory",
        ]);
        let config = Configuration::load(args).unwrap();
        assert_eq!(config.server_port(), 9090);
        assert_eq!(config.store_mode().unwrap(), StoreMode::Memory);
    }

    #[test]
    fn test_cli_rejects_unknown_store_mode() {
        let args = Cli::parse_from([
            "kvlock-server",
            "--config",
            "/nonexistent/kvlock/application.yml",
            "--store-mode",
            "zookeeper",
        ]);
        assert!(Configuration::load(args).is_err());
    }

    #[test]
    fn test_store_mode_display_round_trips() {
        for mode in [StoreMode::Redis, StoreMode::Memory] {
            assert_eq!(mode.to_string().parse::<StoreMode>().unwrap(), mode);
        }
    }
}
