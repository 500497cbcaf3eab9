//! Application startup utilities

pub mod http;
pub mod logging;
pub mod shutdown;
pub mod store;

pub use http::counter_server;
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{run_with_shutdown, spawn_signal_listener};
pub use store::{RedisSettings, StoreBackends, init_store};
