//! Reconcile scheduling
//!
//! Requests are keyed by deployment. The scheduler runs a fixed pool of
//! workers over one FIFO queue and guarantees:
//!
//! - a key is queued at most once
//! - a key has at most one reconcile in flight; requests arriving meanwhile
//!   set a pending flag and the key is queued once more when the run ends
//! - transient failures are retried with exponential backoff until the
//!   retry budget is spent, fatal failures are not retried
//! - a reconcile that panics counts as a transient failure

use crate::error::ReconcileError;
use crate::events::EventBus;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trellis_types::{ControllerEvent, ObjectKey};

/// Result of a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Run again after the given delay
    RequeueAfter(Duration),
}

/// Work performed for one key
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, ReconcileError>;

    /// Called once when `key` is dropped after its last retry failed with `reason`.
    async fn abandoned(&self, _key: &ObjectKey, _reason: &str) {}
}

/// Backoff configuration for retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial backoff delay (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum backoff delay (milliseconds)
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Retries after the first failure before the request is dropped
    pub max_retries: u32,

    /// Add jitter to delays
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
            max_retries: 5,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Delay before retry number `attempt`, counting from 0.
    ///
    /// With jitter the capped delay is scaled by a random factor in `[0.5, 1.0]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);
        let millis = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };
        Duration::from_millis(millis as u64)
    }
}

/// What happened to an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Added to the back of the queue
    Queued,
    /// Merged with a queued or running request for the same key
    Coalesced,
    /// The scheduler is shutting down
    Rejected,
}

/// Point-in-time scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub queued: usize,
    pub in_flight: usize,
    pub pending: usize,
    /// Keys waiting on a backoff or requeue timer
    pub delayed: usize,
    /// Keys with at least one failed attempt
    pub retrying: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    in_flight: HashSet<ObjectKey>,
    pending: HashSet<ObjectKey>,
    attempts: HashMap<ObjectKey, u32>,
    delayed: usize,
    succeeded: u64,
    failed: u64,
    abandoned: u64,
    closed: bool,
}

impl State {
    fn admit(&mut self, key: ObjectKey) -> Admission {
        if self.closed {
            return Admission::Rejected;
        }
        if self.in_flight.contains(&key) {
            self.pending.insert(key);
            return Admission::Coalesced;
        }
        if !self.queued.insert(key.clone()) {
            return Admission::Coalesced;
        }
        self.queue.push_back(key);
        Admission::Queued
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty() && self.delayed == 0
    }
}

struct Inner {
    state: Mutex<State>,
    work: Notify,
    idle: Notify,
    backoff: BackoffConfig,
    events: EventBus,
}

impl Inner {
    async fn enqueue(&self, key: ObjectKey) -> Admission {
        let admission = self.state.lock().await.admit(key.clone());
        debug!(deployment = %key, admission = ?admission, "Reconcile requested");
        if admission == Admission::Queued {
            self.work.notify_waiters();
        }
        admission
    }

    fn enqueue_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let admission = {
                let mut state = inner.state.lock().await;
                state.delayed = state.delayed.saturating_sub(1);
                state.admit(key.clone())
            };
            debug!(deployment = %key, admission = ?admission, "Delayed reconcile due");
            inner.work.notify_waiters();
            inner.notify_if_idle().await;
        });
    }

    async fn next(&self) -> Option<ObjectKey> {
        loop {
            let notified = self.work.notified();
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.queued.remove(&key);
                    state.in_flight.insert(key.clone());
                    let attempt = state.attempts.get(&key).copied().unwrap_or(0) + 1;
                    drop(state);
                    self.events.emit(ControllerEvent::ReconcileStarted {
                        key: key.clone(),
                        attempt,
                    });
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Whether one more transient failure of `key` spends the retry budget.
    async fn budget_spent(&self, key: &ObjectKey) -> bool {
        let attempts = self.state.lock().await.attempts.get(key).copied().unwrap_or(0);
        attempts + 1 > self.backoff.max_retries
    }

    async fn complete(self: &Arc<Self>, key: ObjectKey, result: Result<Outcome, ReconcileError>) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&key);

        match result {
            Ok(outcome) => {
                state.attempts.remove(&key);
                state.succeeded += 1;
                if let Outcome::RequeueAfter(delay) = outcome {
                    debug!(deployment = %key, delay_ms = delay.as_millis() as u64, "Requeue requested");
                    state.delayed += 1;
                    self.enqueue_after(key.clone(), delay);
                }
            }
            Err(ReconcileError::Fatal(reason)) => {
                state.attempts.remove(&key);
                state.failed += 1;
                error!(deployment = %key, error = %reason, "Reconcile failed, not retrying");
                self.events.emit(ControllerEvent::ReconcileFailed {
                    key: key.clone(),
                    reason,
                    retrying: false,
                });
            }
            Err(ReconcileError::Transient(reason)) => {
                state.failed += 1;
                let attempts = state.attempts.entry(key.clone()).or_insert(0);
                *attempts += 1;
                let attempts = *attempts;

                if attempts > self.backoff.max_retries {
                    state.attempts.remove(&key);
                    state.abandoned += 1;
                    error!(
                        deployment = %key,
                        attempts,
                        error = %reason,
                        "Retry budget exhausted, dropping reconcile request"
                    );
                    self.events.emit(ControllerEvent::ReconcileFailed {
                        key: key.clone(),
                        reason,
                        retrying: false,
                    });
                    self.events.emit(ControllerEvent::ReconcileAbandoned {
                        key: key.clone(),
                        attempts,
                    });
                } else {
                    let delay = self.backoff.delay(attempts - 1);
                    warn!(
                        deployment = %key,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Reconcile failed, retrying"
                    );
                    self.events.emit(ControllerEvent::ReconcileFailed {
                        key: key.clone(),
                        reason,
                        retrying: true,
                    });
                    state.delayed += 1;
                    self.enqueue_after(key.clone(), delay);
                }
            }
        }

        if state.pending.remove(&key) {
            state.admit(key);
        }
        let idle = state.is_idle();
        drop(state);

        self.work.notify_waiters();
        if idle {
            self.idle.notify_waiters();
        }
    }

    async fn notify_if_idle(&self) {
        if self.state.lock().await.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Run one reconcile on its own task so a panic cannot take the worker down.
async fn run_once(
    reconciler: &Arc<dyn Reconciler>,
    key: &ObjectKey,
) -> Result<Outcome, ReconcileError> {
    let task = {
        let reconciler = Arc::clone(reconciler);
        let key = key.clone();
        tokio::spawn(async move { reconciler.reconcile(&key).await })
    };
    match task.await {
        Ok(result) => result,
        Err(e) => {
            error!(deployment = %key, error = %e, "Reconcile panicked");
            Err(ReconcileError::Transient(format!("reconcile panicked: {e}")))
        }
    }
}

/// Bounded worker pool with per-key serialization
pub struct ReconcileScheduler {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ReconcileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileScheduler")
            .field("backoff", &self.inner.backoff)
            .finish_non_exhaustive()
    }
}

impl ReconcileScheduler {
    pub fn new(backoff: BackoffConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                work: Notify::new(),
                idle: Notify::new(),
                backoff,
                events,
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `workers` workers running `reconciler`. At least one worker is started.
    pub async fn start(&self, reconciler: Arc<dyn Reconciler>, workers: usize) {
        let workers = workers.max(1);
        let mut handles = self.workers.lock().await;
        for worker in 0..workers {
            let inner = Arc::clone(&self.inner);
            let reconciler = Arc::clone(&reconciler);
            handles.push(tokio::spawn(async move {
                while let Some(key) = inner.next().await {
                    let result = run_once(&reconciler, &key).await;
                    if let Err(ReconcileError::Transient(reason)) = &result {
                        // Still in flight, so no other worker touches the key.
                        if inner.budget_spent(&key).await {
                            reconciler.abandoned(&key, reason).await;
                        }
                    }
                    inner.complete(key, result).await;
                }
                debug!(worker, "Reconcile worker stopped");
            }));
        }
        info!(workers, "Reconcile scheduler started");
    }

    /// Request a reconcile of `key`.
    pub async fn enqueue(&self, key: ObjectKey) -> Admission {
        self.inner.enqueue(key).await
    }

    /// Request a reconcile of `key` once `delay` has passed.
    pub async fn enqueue_after(&self, key: ObjectKey, delay: Duration) -> Admission {
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Admission::Rejected;
            }
            state.delayed += 1;
        }
        debug!(deployment = %key, delay_ms = delay.as_millis() as u64, "Reconcile deferred");
        self.inner.enqueue_after(key, delay);
        Admission::Queued
    }

    pub async fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock().await;
        SchedulerStats {
            queued: state.queue.len(),
            in_flight: state.in_flight.len(),
            pending: state.pending.len(),
            delayed: state.delayed,
            retrying: state.attempts.len(),
            succeeded: state.succeeded,
            failed: state.failed,
            abandoned: state.abandoned,
        }
    }

    /// Wait until nothing is queued, running or waiting on a timer.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().await.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting requests, let running reconciles finish and stop the workers.
    ///
    /// Requests still queued are dropped.
    pub async fn shutdown(&self) {
        let dropped = {
            let mut state = self.inner.state.lock().await;
            state.closed = true;
            state.queued.clear();
            state.pending.clear();
            let dropped = state.queue.len();
            state.queue.clear();
            dropped
        };
        self.inner.work.notify_waiters();

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reconcile worker panicked");
            }
        }
        self.inner.idle.notify_waiters();
        info!(dropped, "Reconcile scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;
    use tokio::time::timeout;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("fleet", name)
    }

    fn fast_backoff(max_retries: u32) -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            max_retries,
            jitter: false,
        }
    }

    /// Reconciler whose runs block until released
    struct Gated {
        started: Semaphore,
        release: Semaphore,
        runs: AtomicU32,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl Gated {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: Semaphore::new(0),
                release: Semaphore::new(0),
                runs: AtomicU32::new(0),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Reconciler for Gated {
        async fn reconcile(&self, _key: &ObjectKey) -> Result<Outcome, ReconcileError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.add_permits(1);
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Outcome::Done)
        }
    }

    /// Reconciler that fails a fixed number of times first
    struct Flaky {
        failures: u32,
        fatal: bool,
        runs: AtomicU32,
    }

    #[async_trait]
    impl Reconciler for Flaky {
        async fn reconcile(&self, _key: &ObjectKey) -> Result<Outcome, ReconcileError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.failures {
                return Err(if self.fatal {
                    ReconcileError::Fatal("bad manifest".into())
                } else {
                    ReconcileError::Transient("store unavailable".into())
                });
            }
            Ok(Outcome::Done)
        }
    }

    async fn settle(scheduler: &ReconcileScheduler) {
        timeout(Duration::from_secs(5), scheduler.wait_idle())
            .await
            .expect("scheduler did not go idle");
    }

    #[test]
    fn test_backoff_curve() {
        let backoff = BackoffConfig {
            initial_delay_ms: 100,
            max_delay_ms: 500,
            multiplier: 2.0,
            max_retries: 5,
            jitter: false,
        };
        let delays: Vec<_> = (0..5).map(|a| backoff.delay(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
        assert_eq!(backoff.delay(u32::MAX).as_millis(), 500);
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let backoff = BackoffConfig {
            jitter: true,
            ..BackoffConfig::default()
        };
        for _ in 0..100 {
            let delay = backoff.delay(1).as_millis();
            assert!((1000..=2000).contains(&delay), "delay {delay} out of range");
        }
    }

    #[tokio::test]
    async fn test_requests_for_running_key_coalesce() {
        let scheduler = ReconcileScheduler::new(fast_backoff(0), EventBus::new("test"));
        let gated = Gated::new();
        scheduler.start(gated.clone(), 4).await;

        assert_eq!(scheduler.enqueue(key("cf")).await, Admission::Queued);
        gated.started.acquire().await.unwrap().forget();

        for _ in 0..3 {
            assert_eq!(scheduler.enqueue(key("cf")).await, Admission::Coalesced);
        }
        assert_eq!(scheduler.stats().await.pending, 1);

        gated.release.add_permits(2);
        settle(&scheduler).await;

        assert_eq!(gated.runs.load(Ordering::SeqCst), 2);
        assert_eq!(gated.max_running.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_queued_key_is_not_queued_twice() {
        let scheduler = ReconcileScheduler::new(fast_backoff(0), EventBus::new("test"));
        assert_eq!(scheduler.enqueue(key("a")).await, Admission::Queued);
        assert_eq!(scheduler.enqueue(key("a")).await, Admission::Coalesced);
        assert_eq!(scheduler.enqueue(key("b")).await, Admission::Queued);
        assert_eq!(scheduler.stats().await.queued, 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let scheduler = ReconcileScheduler::new(fast_backoff(0), EventBus::new("test"));
        let gated = Gated::new();
        scheduler.start(gated.clone(), 2).await;

        for name in ["a", "b", "c", "d", "e"] {
            scheduler.enqueue(key(name)).await;
        }
        gated.started.acquire_many(2).await.unwrap().forget();
        assert_eq!(scheduler.stats().await.in_flight, 2);

        gated.release.add_permits(5);
        settle(&scheduler).await;

        assert_eq!(gated.runs.load(Ordering::SeqCst), 5);
        assert_eq!(gated.max_running.load(Ordering::SeqCst), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_transient_failures_retry_until_success() {
        let scheduler = ReconcileScheduler::new(fast_backoff(3), EventBus::new("test"));
        let flaky = Arc::new(Flaky {
            failures: 2,
            fatal: false,
            runs: AtomicU32::new(0),
        });
        scheduler.start(flaky.clone(), 1).await;

        scheduler.enqueue(key("cf")).await;
        settle(&scheduler).await;

        assert_eq!(flaky.runs.load(Ordering::SeqCst), 3);
        let stats = scheduler.stats().await;
        assert_eq!(stats.retrying, 0);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_retry_budget_is_enforced() {
        /// Always fails and records being given up on
        struct Hopeless {
            runs: AtomicU32,
            gave_up: std::sync::Mutex<Vec<(ObjectKey, String)>>,
        }

        #[async_trait]
        impl Reconciler for Hopeless {
            async fn reconcile(&self, _key: &ObjectKey) -> Result<Outcome, ReconcileError> {
                let run = self.runs.fetch_add(1, Ordering::SeqCst);
                Err(ReconcileError::Transient(format!("store unavailable ({run})")))
            }

            async fn abandoned(&self, key: &ObjectKey, reason: &str) {
                self.gave_up
                    .lock()
                    .unwrap()
                    .push((key.clone(), reason.to_string()));
            }
        }

        let events = EventBus::new("test");
        let mut rx = events.subscribe();
        let scheduler = ReconcileScheduler::new(fast_backoff(2), events);
        let hopeless = Arc::new(Hopeless {
            runs: AtomicU32::new(0),
            gave_up: std::sync::Mutex::new(Vec::new()),
        });
        scheduler.start(hopeless.clone(), 1).await;

        scheduler.enqueue(key("cf")).await;
        settle(&scheduler).await;

        assert_eq!(hopeless.runs.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.stats().await.abandoned, 1);
        // Told once, with the last error
        assert_eq!(
            *hopeless.gave_up.lock().unwrap(),
            vec![(key("cf"), "store unavailable (2)".to_string())]
        );

        let mut abandoned = None;
        while let Ok(envelope) = rx.try_recv() {
            if let ControllerEvent::ReconcileAbandoned { attempts, .. } = envelope.event {
                abandoned = Some(attempts);
            }
        }
        assert_eq!(abandoned, Some(3));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_reconcile_is_retried() {
        struct PanicsOnce(AtomicU32);

        #[async_trait]
        impl Reconciler for PanicsOnce {
            async fn reconcile(&self, _key: &ObjectKey) -> Result<Outcome, ReconcileError> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("manifest walker blew up");
                }
                Ok(Outcome::Done)
            }
        }

        let scheduler = ReconcileScheduler::new(fast_backoff(3), EventBus::new("test"));
        let reconciler = Arc::new(PanicsOnce(AtomicU32::new(0)));
        scheduler.start(reconciler.clone(), 1).await;

        scheduler.enqueue(key("cf")).await;
        settle(&scheduler).await;

        assert_eq!(reconciler.0.load(Ordering::SeqCst), 2);
        let stats = scheduler.stats().await;
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);

        // The key is not stuck in flight: a new request runs again
        assert_eq!(scheduler.enqueue(key("cf")).await, Admission::Queued);
        settle(&scheduler).await;
        assert_eq!(reconciler.0.load(Ordering::SeqCst), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_fatal_failures_are_not_retried() {
        let scheduler = ReconcileScheduler::new(fast_backoff(5), EventBus::new("test"));
        let flaky = Arc::new(Flaky {
            failures: 1,
            fatal: true,
            runs: AtomicU32::new(0),
        });
        scheduler.start(flaky.clone(), 1).await;

        scheduler.enqueue(key("cf")).await;
        settle(&scheduler).await;

        assert_eq!(flaky.runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().await.failed, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_requeue_after() {
        struct Twice(AtomicU32);

        #[async_trait]
        impl Reconciler for Twice {
            async fn reconcile(&self, _key: &ObjectKey) -> Result<Outcome, ReconcileError> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(Outcome::RequeueAfter(Duration::from_millis(5)))
                } else {
                    Ok(Outcome::Done)
                }
            }
        }

        let scheduler = ReconcileScheduler::new(fast_backoff(0), EventBus::new("test"));
        let twice = Arc::new(Twice(AtomicU32::new(0)));
        scheduler.start(twice.clone(), 1).await;

        scheduler.enqueue(key("cf")).await;
        settle(&scheduler).await;
        assert_eq!(twice.0.load(Ordering::SeqCst), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight() {
        let scheduler = Arc::new(ReconcileScheduler::new(fast_backoff(0), EventBus::new("test")));
        let gated = Gated::new();
        scheduler.start(gated.clone(), 1).await;

        scheduler.enqueue(key("a")).await;
        scheduler.enqueue(key("b")).await;
        gated.started.acquire().await.unwrap().forget();

        let stopping = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.shutdown().await })
        };
        // Intake closes before the running reconcile is released.
        loop {
            if scheduler.enqueue(key("c")).await == Admission::Rejected {
                break;
            }
            tokio::task::yield_now().await;
        }

        gated.release.add_permits(1);
        timeout(Duration::from_secs(5), stopping).await.unwrap().unwrap();

        assert_eq!(gated.runs.load(Ordering::SeqCst), 1);
        assert_eq!(gated.running.load(Ordering::SeqCst), 0);
    }
}
