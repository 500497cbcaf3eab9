//! Shared counter serialized through the `count` lock.

use std::time::Instant;

use actix_web::{HttpResponse, get, web};
use kvlock_core::{AcquireOptions, AcquireOutcome};
use tracing::{error, info, warn};

use crate::cache::{CacheResult, HybridCache, HybridCacheEntryOptions};
use crate::metrics::record_http_request;
use crate::model::constants::{
    COUNTER_CACHE_EXPIRATION, COUNTER_CACHE_KEY, COUNTER_CACHE_LOCAL_EXPIRATION,
    COUNTER_LOCK_EXPIRY, COUNTER_LOCK_RETRY, COUNTER_LOCK_WAIT, COUNTER_RESOURCE,
};
use crate::model::{AppState, CountResult, ErrorResult};

/// Increment the shared counter and return its new value.
#[get("/test")]
pub async fn increment(data: web::Data<AppState>) -> HttpResponse {
    let started = Instant::now();
    let response = increment_counter(&data).await;
    record_http_request(
        "/test",
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

async fn increment_counter(state: &AppState) -> HttpResponse {
    let options = AcquireOptions::new()
        .wait(COUNTER_LOCK_WAIT)
        .retry(COUNTER_LOCK_RETRY)
        // Only server shutdown yields 499; a client disconnect drops this future instead.
        .cancel(state.shutdown.clone());

    let lock = match state
        .lock_factory
        .acquire(COUNTER_RESOURCE, COUNTER_LOCK_EXPIRY, options)
        .await
    {
        Ok(lock) => lock,
        Err(e) if e.is_unavailable() => {
            error!(error = %e, "Lock store unavailable");
            return ErrorResult::store_unavailable();
        }
        Err(e) => {
            error!(error = %e, "Unexpected error while acquiring counter lock");
            return ErrorResult::unexpected();
        }
    };

    match lock.outcome() {
        AcquireOutcome::Acquired => {}
        AcquireOutcome::TimedOut => {
            warn!(attempts = lock.attempts(), "Could not acquire counter lock");
            return ErrorResult::lock_busy();
        }
        AcquireOutcome::Cancelled => {
            info!("Counter request cancelled before the lock was granted");
            return ErrorResult::client_closed();
        }
    }

    match lock.scope(bump(&state.cache)).await {
        Ok(count) => CountResult::http_success(count),
        Err(e) => {
            error!(error = %e, "Failed to update counter");
            ErrorResult::unexpected()
        }
    }
}

async fn bump(cache: &HybridCache) -> CacheResult<i64> {
    let options = HybridCacheEntryOptions {
        expiration: COUNTER_CACHE_EXPIRATION,
        local_expiration: COUNTER_CACHE_LOCAL_EXPIRATION,
    };

    let count: i64 = cache
        .get_or_create(COUNTER_CACHE_KEY, || async { 0 }, Some(options))
        .await?;
    let next = count + 1;
    cache.set(COUNTER_CACHE_KEY, &next, Some(options)).await?;
    Ok(next)
}
