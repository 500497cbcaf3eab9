//! Main entry point for the kvlock server.

use std::sync::Arc;

use kvlock_core::{CancelSignal, LockFactory};
use kvlock_server::{
    cache::HybridCache,
    model::{AppState, Configuration},
    startup,
};
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    let metrics_handle = kvlock_server::metrics::init_metrics()?;

    let shutdown = CancelSignal::new();
    let signal_listener = startup::spawn_signal_listener(shutdown.clone());

    let store_mode = configuration.store_mode()?;
    info!("Store mode: {}", store_mode);
    let backends =
        startup::init_store(store_mode, &configuration.redis_settings(), &shutdown).await?;

    let lock_factory = LockFactory::new(backends.lock_store.clone())
        .with_defaults(configuration.lock_defaults()?);
    let cache = HybridCache::new(backends.remote_cache.clone(), configuration.cache_limits())
        .with_default_options(configuration.cache_entry_options());

    let app_state = Arc::new(
        AppState::new(Arc::new(lock_factory), cache, shutdown.clone()).with_metrics(metrics_handle),
    );

    let address = configuration.server_address();
    let port = configuration.server_port();
    let server = startup::counter_server(
        app_state,
        address.clone(),
        port,
        configuration.shutdown_timeout(),
    )?;
    info!("kvlock server listening on {}:{}", address, port);

    let server_handle = server.handle();
    let stopper = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            info!("Stopping HTTP server");
            server_handle.stop(true).await;
        }
    });

    server.await?;

    // The server can also exit on its own; release the helpers either way.
    shutdown.cancel();
    let _ = stopper.await;
    let _ = signal_listener.await;
    for task in backends.tasks {
        let _ = task.await;
    }

    info!("Shutdown complete");
    Ok(())
}
