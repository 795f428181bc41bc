//! In-flight call tracking and graceful shutdown.
//!
//! Every call that can outlive a single poll (streams and deadline-bound
//! unary work) registers with the [`CallTracker`] and holds a [`CallGuard`]
//! until it finishes. Shutdown runs in three phases:
//!
//! 1. Refuse new calls with `CANCELLED`.
//! 2. Wait up to the configured timeout for in-flight calls to drain.
//! 3. Cancel the shared token so whatever is left aborts at its next
//!    suspension point.

use crate::server::telemetry::{
    decrement_calls_inflight, increment_calls_inflight, record_call_duration,
};
use core::time::Duration;
use courier_core::{Error, Result};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;

pub struct CallTracker {
    inflight: AtomicUsize,
    accepting: AtomicBool,
    drained: Notify,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl CallTracker {
    #[must_use]
    pub fn new(shutdown_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            inflight: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            drained: Notify::new(),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        })
    }

    /// Registers a new call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once shutdown has started.
    pub fn begin(self: &Arc<Self>, method: &'static str) -> Result<CallGuard> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::cancelled("Service is shutting down"));
        }
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_calls_inflight(method);

        Ok(CallGuard {
            tracker: Arc::clone(self),
            method,
            token: self.shutdown_token.child_token(),
            started: Instant::now(),
        })
    }

    #[must_use]
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Token cancelled in the final shutdown phase.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    pub async fn shutdown(&self) {
        tracing::info!("Refusing new calls");
        self.accepting.store(false, Ordering::Release);

        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drain = tokio::time::timeout(self.shutdown_timeout, async {
            loop {
                // Register interest before reading the count so a guard
                // dropped in between still wakes us.
                let notified = self.drained.notified();
                if self.inflight() == 0 {
                    break;
                }
                notified.await;
            }
        })
        .await;

        match drain {
            Ok(()) => tracing::debug!("All in-flight calls drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} calls still active)",
                self.inflight()
            ),
        }

        tracing::debug!("Cancelling remaining calls via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Registration of one in-flight call. Dropping it deregisters the call.
pub struct CallGuard {
    tracker: Arc<CallTracker>,
    method: &'static str,
    token: CancellationToken,
    started: Instant,
}

impl CallGuard {
    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.method
    }

    /// Cancelled when the server gives up on draining.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        record_call_duration(self.method, duration_ms);
        decrement_calls_inflight(self.method);

        if self.tracker.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn guards_track_inflight_calls() {
        let tracker = CallTracker::new(Duration::from_secs(1));
        let a = tracker.begin("Sum").unwrap();
        let b = tracker.begin("Sum").unwrap();
        assert_eq!(tracker.inflight(), 2);

        drop(a);
        assert_eq!(tracker.inflight(), 1);
        drop(b);
        assert_eq!(tracker.inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_refuses_new_calls() {
        let tracker = CallTracker::new(Duration::from_secs(1));
        tracker.shutdown().await;

        assert!(!tracker.is_accepting());
        let err = tracker.begin("PrimeFactor").err().unwrap();
        assert_eq!(err.code(), Code::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_guards_to_drop() {
        let tracker = CallTracker::new(Duration::from_secs(10));
        let guard = tracker.begin("GreetManyTimes").unwrap();
        let token = guard.token().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(guard);
        });

        let started = Instant::now();
        tracker.shutdown().await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(tracker.inflight(), 0);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_timeout_cancels_stragglers() {
        let tracker = CallTracker::new(Duration::from_millis(500));
        let guard = tracker.begin("RunningMax").unwrap();

        tracker.shutdown().await;
        assert!(guard.token().is_cancelled());
        assert_eq!(tracker.inflight(), 1);
    }
}
