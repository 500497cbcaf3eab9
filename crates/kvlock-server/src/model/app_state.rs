//! Shared state handed to every request handler

use std::sync::Arc;

use kvlock_core::{CancelSignal, DistributedLockFactory};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::cache::HybridCache;

/// Application state shared across HTTP workers.
#[derive(Clone)]
pub struct AppState {
    pub lock_factory: Arc<dyn DistributedLockFactory>,
    pub cache: HybridCache,
    /// Tripped on server shutdown; in-flight lock waits observe it.
    pub shutdown: CancelSignal,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        lock_factory: Arc<dyn DistributedLockFactory>,
        cache: HybridCache,
        shutdown: CancelSignal,
    ) -> Self {
        Self {
            lock_factory,
            cache,
            shutdown,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
