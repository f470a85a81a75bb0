//! Endpoint session lifecycle
//!
//! Each endpoint (source, sink) is gated by a [`SessionCounter`]: a
//! reference-counted start/stop gate that owns the endpoint's periodic tick
//! worker. N unmatched starts require N stops before teardown, so multiple
//! independent callers can hold the endpoint open concurrently.
//!
//! The counter's read-modify-write is serialized by a mutex; an atomic
//! mirror of the count lets the other endpoint's tick thread query
//! `is_active` without taking the lock.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{RelaycamError, Result};

/// Periodic tick worker on a dedicated named thread
///
/// Ticks are paced by absolute deadlines so the cadence does not drift with
/// tick cost. Cancellation is cooperative: the shutdown message is observed
/// between ticks, an in-flight tick always runs to completion, and `stop`
/// joins the thread.
pub(crate) struct TickWorker {
    shutdown_tx: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl TickWorker {
    /// Spawn a worker firing `tick` every `period`
    ///
    /// The first tick fires immediately. `leeway` is the scheduling slack:
    /// if a tick lands more than `leeway` past its deadline the schedule is
    /// realigned instead of bursting catch-up ticks.
    pub(crate) fn spawn<F>(
        name: &str,
        period: Duration,
        leeway: Duration,
        mut tick: F,
    ) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut next = Instant::now();
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match shutdown_rx.recv_timeout(wait) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    tick();

                    next += period;
                    let now = Instant::now();
                    if next + leeway < now {
                        trace!("tick fell behind, realigning schedule");
                        next = now;
                    }
                }
            })
            .map_err(|e| RelaycamError::device(format!("failed to spawn tick thread: {}", e)))?;

        Ok(Self {
            shutdown_tx,
            thread: Some(thread),
        })
    }

    /// Stop the worker and join its thread
    pub(crate) fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TickWorker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Reference-counted start/stop gate for one endpoint
pub struct SessionCounter {
    label: &'static str,
    count: AtomicU32,
    worker: Mutex<Option<TickWorker>>,
}

impl SessionCounter {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            count: AtomicU32::new(0),
            worker: Mutex::new(None),
        }
    }

    /// Whether the endpoint is active (count > 0)
    pub fn is_active(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }

    /// Current session count
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Register a start call
    ///
    /// The first start arms a worker via `arm`; subsequent starts only
    /// increment the count.
    pub(crate) fn start<F>(&self, arm: F) -> Result<()>
    where
        F: FnOnce() -> Result<TickWorker>,
    {
        self.start_with(arm, || {})
    }

    /// Register a start call, running `on_start` inside the critical section
    ///
    /// `on_start` runs under the worker lock once the session is counted, so
    /// state it publishes (like the sink's producer handle) is ordered
    /// against any concurrent stop's teardown.
    pub(crate) fn start_with<F, S>(&self, arm: F, on_start: S) -> Result<()>
    where
        F: FnOnce() -> Result<TickWorker>,
        S: FnOnce(),
    {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            let count = self.count.load(Ordering::Relaxed) + 1;
            self.count.store(count, Ordering::Release);
            debug!(endpoint = self.label, count, "additional session started");
        } else {
            *worker = Some(arm()?);
            self.count.store(1, Ordering::Release);
            debug!(endpoint = self.label, "endpoint activated");
        }
        on_start();
        Ok(())
    }

    /// Register a stop call
    ///
    /// Only the stop that drops the count to zero cancels the worker.
    /// A stop with no matching start is a defensive no-op. Returns true if
    /// the endpoint is idle afterwards.
    pub(crate) fn stop(&self) -> bool {
        self.stop_with(|| {})
    }

    /// Register a stop call, running `on_idle` if it tears the endpoint down
    ///
    /// `on_idle` runs under the worker lock, before the worker join, so a
    /// start landing while the join is still in progress observes the fully
    /// torn-down endpoint and republishes its own state after it.
    pub(crate) fn stop_with<S>(&self, on_idle: S) -> bool
    where
        S: FnOnce(),
    {
        let taken = {
            let mut worker = self.worker.lock();
            let count = self.count.load(Ordering::Relaxed);
            if count > 1 {
                self.count.store(count - 1, Ordering::Release);
                debug!(endpoint = self.label, count = count - 1, "session stopped");
                return false;
            }
            self.count.store(0, Ordering::Release);
            on_idle();
            worker.take()
        };
        // Join outside the lock; the worker may be mid-tick.
        if let Some(worker) = taken {
            worker.stop();
            debug!(endpoint = self.label, "endpoint deactivated");
        }
        true
    }

    /// Force the endpoint to idle regardless of the session count
    pub(crate) fn shutdown(&self) {
        self.shutdown_with(|| {})
    }

    /// Force idle, running `on_idle` inside the critical section
    pub(crate) fn shutdown_with<S>(&self, on_idle: S)
    where
        S: FnOnce(),
    {
        let taken = {
            let mut worker = self.worker.lock();
            self.count.store(0, Ordering::Release);
            on_idle();
            worker.take()
        };
        if let Some(worker) = taken {
            worker.stop();
            debug!(endpoint = self.label, "endpoint forced idle");
        }
    }

    #[cfg(test)]
    fn has_worker(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Force a session count without arming a worker, for tick-level tests
    #[cfg(test)]
    pub(crate) fn set_count_for_test(&self, count: u32) {
        self.count.store(count, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn arm_counting(ticks: &Arc<AtomicU64>) -> Result<TickWorker> {
        let ticks = Arc::clone(ticks);
        TickWorker::spawn("test-ticker", Duration::from_millis(5), Duration::ZERO, {
            move || {
                ticks.fetch_add(1, Ordering::Relaxed);
            }
        })
    }

    #[test]
    fn test_active_iff_starts_exceed_stops() {
        let ticks = Arc::new(AtomicU64::new(0));
        let session = SessionCounter::new("test");

        assert!(!session.is_active());
        session.start(|| arm_counting(&ticks)).unwrap();
        session.start(|| arm_counting(&ticks)).unwrap();
        assert_eq!(session.count(), 2);
        assert!(session.has_worker());

        assert!(!session.stop());
        assert!(session.is_active());
        assert!(session.has_worker());

        assert!(session.stop());
        assert!(!session.is_active());
        assert!(!session.has_worker());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let session = SessionCounter::new("test");
        assert!(session.stop());
        assert_eq!(session.count(), 0);
        assert!(!session.has_worker());
    }

    #[test]
    fn test_worker_armed_once_per_activation() {
        let ticks = Arc::new(AtomicU64::new(0));
        let session = SessionCounter::new("test");
        let armed = Arc::new(AtomicU64::new(0));

        for _ in 0..3 {
            let armed = Arc::clone(&armed);
            let ticks = ticks.clone();
            session
                .start(move || {
                    armed.fetch_add(1, Ordering::Relaxed);
                    arm_counting(&ticks)
                })
                .unwrap();
        }
        assert_eq!(armed.load(Ordering::Relaxed), 1);
        session.shutdown();
    }

    #[test]
    fn test_worker_ticks_and_stops() {
        let ticks = Arc::new(AtomicU64::new(0));
        let session = SessionCounter::new("test");
        session.start(|| arm_counting(&ticks)).unwrap();

        std::thread::sleep(Duration::from_millis(40));
        session.stop();
        let seen = ticks.load(Ordering::Relaxed);
        assert!(seen >= 2, "expected a few ticks, got {}", seen);

        // No further ticks after teardown.
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::Relaxed), seen);
    }

    #[test]
    fn test_on_idle_runs_only_on_the_teardown_stop() {
        let ticks = Arc::new(AtomicU64::new(0));
        let session = SessionCounter::new("test");
        let idles = Arc::new(AtomicU64::new(0));

        session.start(|| arm_counting(&ticks)).unwrap();
        session.start(|| arm_counting(&ticks)).unwrap();

        assert!(!session.stop_with(|| {
            idles.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(idles.load(Ordering::Relaxed), 0);

        assert!(session.stop_with(|| {
            idles.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(idles.load(Ordering::Relaxed), 1);
        assert!(!session.has_worker());
    }

    #[test]
    fn test_concurrent_start_stop_balance() {
        let session = Arc::new(SessionCounter::new("test"));
        let ticks = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let ticks = Arc::clone(&ticks);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        session.start(|| arm_counting(&ticks)).unwrap();
                        session.stop();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!session.is_active());
        assert!(!session.has_worker());
    }
}
