//! Distributed lock acquisition and release.
//!
//! A [`DistributedLock`] is the terminal result of one acquisition attempt.
//! Whether it holds the lock is decided once, by the store's atomic
//! set-if-absent, and never changes afterwards; the only later transition is
//! `Held -> Released`, which happens at most once.
//!
//! ```text
//! Pending --set ok----------------> Acquired --release--> Released
//!         --wait budget spent-----> TimedOut
//!         --cancel signal---------> Cancelled
//!         --store down past budget-> Err(LockError::Unavailable)
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::error::{LockError, LockResult, StoreError};
use crate::signal::CancelSignal;
use crate::store::{LockStore, Route, SetWhen};

/// Namespace prepended to every resource name.
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Wait budget used when the caller does not give one.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Retry base interval used when the caller does not give one.
pub const DEFAULT_RETRY: Duration = Duration::from_millis(200);

/// How an acquisition attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The conditional set succeeded; this instance owns the key.
    Acquired,
    /// Contention did not clear within the wait budget.
    TimedOut,
    /// The cancellation signal fired before the lock was obtained.
    Cancelled,
}

impl AcquireOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AcquireOutcome::Acquired => "acquired",
            AcquireOutcome::TimedOut => "timed_out",
            AcquireOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AcquireOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call acquisition options. Unset fields fall back to factory defaults.
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    pub wait: Option<Duration>,
    pub retry: Option<Duration>,
    pub cancel: Option<CancelSignal>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Fully resolved parameters for one acquisition loop.
#[derive(Debug, Clone)]
pub(crate) struct AcquireParams {
    pub wait: Duration,
    pub retry: Duration,
    pub backoff: Backoff,
    pub cancel: CancelSignal,
}

/// Store key for a resource name.
pub fn resource_key(resource: &str) -> String {
    format!("{}{}", LOCK_KEY_PREFIX, resource)
}

fn host_identity() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown-host".to_string())
    })
}

/// Fresh owner token: host identity plus a random v4 UUID.
pub fn new_owner_token() -> String {
    format!("{}:{}", host_identity(), Uuid::new_v4().simple())
}

/// Handle for one acquisition of a named resource.
///
/// The handle borrows the shared store; it never owns a connection. Dropping a
/// held lock without calling [`DistributedLock::release`] schedules the release
/// on the current tokio runtime.
pub struct DistributedLock {
    store: Arc<dyn LockStore>,
    resource: String,
    key: String,
    owner_token: String,
    expiry: Duration,
    outcome: AcquireOutcome,
    attempts: u32,
    released: AtomicBool,
}

impl DistributedLock {
    /// Run the acquisition loop against `store`.
    pub(crate) async fn acquire(
        store: Arc<dyn LockStore>,
        resource: &str,
        expiry: Duration,
        params: AcquireParams,
    ) -> LockResult<Self> {
        if resource.is_empty() {
            return Err(LockError::InvalidArgument(
                "resource name must not be empty".to_string(),
            ));
        }
        if expiry.is_zero() {
            return Err(LockError::InvalidArgument(format!(
                "expiry for resource '{}' must be greater than zero",
                resource
            )));
        }
        if params.retry.is_zero() {
            return Err(LockError::InvalidArgument(format!(
                "retry interval for resource '{}' must be greater than zero",
                resource
            )));
        }
        if params.backoff.base.is_zero() || params.backoff.cap.is_zero() {
            return Err(LockError::InvalidArgument(format!(
                "backoff base and cap for resource '{}' must be greater than zero",
                resource
            )));
        }

        let key = resource_key(resource);
        let owner_token = new_owner_token();
        let AcquireParams {
            wait,
            retry,
            backoff,
            cancel,
        } = params;

        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut claim = InflightClaim::new(store.clone(), resource, &key, &owner_token);

        while !cancel.is_cancelled() {
            attempts += 1;

            claim.arm();
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    claim.abandon();
                    break;
                }
                result = store.conditional_set(&key, &owner_token, expiry, SetWhen::NotExists, Route::Primary) => result,
            };
            // The reply is in; from here the returned handle owns any release.
            claim.disarm();

            match attempt {
                Ok(true) => {
                    let waited = started.elapsed();
                    debug!(
                        resource = %resource,
                        attempts,
                        waited_ms = waited.as_millis() as u64,
                        "Lock acquired"
                    );
                    record_outcome(AcquireOutcome::Acquired, waited);
                    return Ok(Self::new(
                        store,
                        resource,
                        key,
                        owner_token,
                        expiry,
                        AcquireOutcome::Acquired,
                        attempts,
                    ));
                }
                Ok(false) => {
                    let elapsed = started.elapsed();
                    if elapsed >= wait {
                        warn!(
                            resource = %resource,
                            attempts,
                            wait_ms = wait.as_millis() as u64,
                            "Lock wait timeout, resource still held by another owner"
                        );
                        record_outcome(AcquireOutcome::TimedOut, elapsed);
                        return Ok(Self::new(
                            store,
                            resource,
                            key,
                            owner_token,
                            expiry,
                            AcquireOutcome::TimedOut,
                            attempts,
                        ));
                    }

                    let delay = backoff.next_delay(attempts).min(wait - elapsed);
                    if !sleep_or_cancel(delay, &cancel).await {
                        break;
                    }
                }
                Err(err) if err.is_transient() => {
                    error!(
                        resource = %resource,
                        attempt = attempts,
                        error = %err,
                        "Store error while acquiring lock"
                    );
                    counter!("lock_store_errors_total", "phase" => "acquire").increment(1);

                    let elapsed = started.elapsed();
                    if elapsed >= wait {
                        counter!("lock_acquire_total", "outcome" => "unavailable").increment(1);
                        return Err(LockError::Unavailable {
                            resource: resource.to_string(),
                            attempts,
                            source: err,
                        });
                    }

                    if !sleep_or_cancel(retry.min(wait - elapsed), &cancel).await {
                        break;
                    }
                }
                Err(err) => {
                    error!(
                        resource = %resource,
                        attempt = attempts,
                        error = %err,
                        "Unexpected error while acquiring lock"
                    );
                    counter!("lock_acquire_total", "outcome" => "error").increment(1);
                    return Err(LockError::Store {
                        resource: resource.to_string(),
                        source: err,
                    });
                }
            }
        }

        info!(resource = %resource, attempts, "Lock acquisition cancelled");
        record_outcome(AcquireOutcome::Cancelled, started.elapsed());
        Ok(Self::new(
            store,
            resource,
            key,
            owner_token,
            expiry,
            AcquireOutcome::Cancelled,
            attempts,
        ))
    }

    fn new(
        store: Arc<dyn LockStore>,
        resource: &str,
        key: String,
        owner_token: String,
        expiry: Duration,
        outcome: AcquireOutcome,
        attempts: u32,
    ) -> Self {
        Self {
            store,
            resource: resource.to_string(),
            key,
            owner_token,
            expiry,
            outcome,
            attempts,
            released: AtomicBool::new(false),
        }
    }

    /// Logical resource name supplied by the caller.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Namespaced store key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner_token(&self) -> &str {
        &self.owner_token
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn outcome(&self) -> AcquireOutcome {
        self.outcome
    }

    pub fn is_acquired(&self) -> bool {
        self.outcome == AcquireOutcome::Acquired
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == AcquireOutcome::Cancelled
    }

    /// Number of conditional-set attempts made.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the lock if this instance still owns it.
    ///
    /// Only the first call on an acquired lock reaches the store. Store errors
    /// are logged and swallowed; the key's TTL is the backstop.
    pub async fn release(&self) {
        if !self.is_acquired() || self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        release_key(
            self.store.as_ref(),
            &self.resource,
            &self.key,
            &self.owner_token,
        )
        .await;
    }

    /// Run `work` and release afterwards, returning the work's output.
    ///
    /// If the returned future is dropped mid-way, `Drop` still releases.
    pub async fn scope<Fut>(self, work: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        let output = work.await;
        self.release().await;
        output
    }
}

impl Drop for DistributedLock {
    fn drop(&mut self) {
        if !self.is_acquired() || self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(resource = %self.resource, "Lock dropped while held, releasing in background");
                let store = self.store.clone();
                let resource = std::mem::take(&mut self.resource);
                let key = std::mem::take(&mut self.key);
                let token = std::mem::take(&mut self.owner_token);
                handle.spawn(async move {
                    release_key(store.as_ref(), &resource, &key, &token).await;
                });
            }
            Err(_) => {
                warn!(
                    resource = %self.resource,
                    expiry_ms = self.expiry.as_millis() as u64,
                    "Lock dropped outside a tokio runtime, relying on expiry"
                );
            }
        }
    }
}

impl fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLock")
            .field("resource", &self.resource)
            .field("key", &self.key)
            .field("owner_token", &self.owner_token)
            .field("expiry", &self.expiry)
            .field("outcome", &self.outcome)
            .field("attempts", &self.attempts)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
async fn sleep_or_cancel(delay: Duration, cancel: &CancelSignal) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn record_outcome(outcome: AcquireOutcome, waited: Duration) {
    counter!("lock_acquire_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("lock_wait_seconds").record(waited.as_secs_f64());
}

/// Compensating delete for a conditional set whose reply was never observed.
///
/// Armed only while a set is in flight. If the acquisition future is dropped
/// or cancelled in that window the store may already hold our token, so the
/// key is deleted in the background, guarded by the token.
struct InflightClaim {
    store: Arc<dyn LockStore>,
    resource: String,
    key: String,
    owner_token: String,
    armed: bool,
}

impl InflightClaim {
    fn new(store: Arc<dyn LockStore>, resource: &str, key: &str, owner_token: &str) -> Self {
        Self {
            store,
            resource: resource.to_string(),
            key: key.to_string(),
            owner_token: owner_token.to_string(),
            armed: false,
        }
    }

    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Schedule the compensating delete if a set is in flight.
    fn abandon(&mut self) {
        if !std::mem::replace(&mut self.armed, false) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(resource = %self.resource, "Acquisition abandoned with a set in flight, undoing it");
                let store = self.store.clone();
                let resource = self.resource.clone();
                let key = self.key.clone();
                let token = self.owner_token.clone();
                handle.spawn(async move {
                    release_key(store.as_ref(), &resource, &key, &token).await;
                });
            }
            Err(_) => {
                warn!(
                    resource = %self.resource,
                    "Acquisition abandoned outside a tokio runtime, relying on expiry"
                );
            }
        }
    }
}

impl Drop for InflightClaim {
    fn drop(&mut self) {
        self.abandon();
    }
}

async fn release_key(store: &dyn LockStore, resource: &str, key: &str, token: &str) {
    match store.conditional_delete(key, token).await {
        Ok(0) => {
            warn!(
                resource = %resource,
                "Lock was no longer owned at release, expired or taken over"
            );
            counter!("lock_release_total", "result" => "not_owner").increment(1);
        }
        Ok(_) => {
            debug!(resource = %resource, "Lock released");
            counter!("lock_release_total", "result" => "released").increment(1);
        }
        Err(err) => log_release_error(resource, &err),
    }
}

fn log_release_error(resource: &str, err: &StoreError) {
    if err.is_transient() {
        error!(resource = %resource, error = %err, "Store error occurred while releasing lock");
    } else {
        error!(resource = %resource, error = %err, "Unexpected error occurred while releasing lock");
    }
    counter!("lock_store_errors_total", "phase" => "release").increment(1);
    counter!("lock_release_total", "result" => "error").increment(1);
}
