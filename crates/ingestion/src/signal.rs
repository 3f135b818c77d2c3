//! SignalWaiter - ready-signal handoff between the producer worker and the
//! frame processor thread
//!
//! Signals coalesce: if several arrive while a cycle is running, only the
//! latest capture timestamp is processed next.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::ReadySignal;
use tracing::{trace, warn};

/// Result of one [`SignalWaiter::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A ready signal with this capture timestamp (ns)
    Ready(i64),
    /// Timed out; the producer is idle
    Idle,
    /// Shutdown requested
    Shutdown,
}

#[derive(Debug, Default)]
struct SignalState {
    pending: Option<i64>,
    shutdown: bool,
    accepted: u64,
    ignored: u64,
    coalesced: u64,
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalStats {
    pub accepted: u64,
    pub ignored: u64,
    pub coalesced: u64,
}

#[derive(Debug)]
pub struct SignalWaiter {
    ready_tag: String,
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl SignalWaiter {
    pub fn new(ready_tag: impl Into<String>) -> Self {
        Self {
            ready_tag: ready_tag.into(),
            state: Mutex::new(SignalState::default()),
            cond: Condvar::new(),
        }
    }

    pub fn ready_tag(&self) -> &str {
        &self.ready_tag
    }

    /// Deliver a producer signal. Returns `false` if its tag is ignored.
    pub fn notify(&self, signal: &ReadySignal) -> bool {
        let mut state = self.lock();
        if signal.frame_id != self.ready_tag {
            state.ignored += 1;
            trace!(tag = %signal.frame_id, "ignoring signal with foreign tag");
            return false;
        }

        let Some(capture_ns) = signal.capture_timestamp_ns() else {
            state.ignored += 1;
            warn!(sec = signal.stamp.sec, "ignoring signal with out-of-range stamp");
            return false;
        };

        if state.pending.is_some() {
            state.coalesced += 1;
        }
        state.accepted += 1;
        state.pending = Some(capture_ns);
        drop(state);

        self.cond.notify_one();
        true
    }

    /// Block for up to `timeout` waiting for a signal.
    ///
    /// Shutdown takes priority over a pending signal.
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let guard = self.lock();
        let (mut state, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| s.pending.is_none() && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);

        if state.shutdown {
            WaitOutcome::Shutdown
        } else if let Some(ts) = state.pending.take() {
            WaitOutcome::Ready(ts)
        } else {
            WaitOutcome::Idle
        }
    }

    /// Wake every waiter; subsequent waits return `Shutdown` immediately.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.cond.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub fn stats(&self) -> SignalStats {
        let state = self.lock();
        SignalStats {
            accepted: state.accepted,
            ignored: state.ignored,
            coalesced: state.coalesced,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DEFAULT_READY_TAG;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn times_out_as_idle() {
        let waiter = SignalWaiter::new(DEFAULT_READY_TAG);
        assert_eq!(waiter.wait(Duration::from_millis(10)), WaitOutcome::Idle);
    }

    #[test]
    fn foreign_tag_is_ignored() {
        let waiter = SignalWaiter::new(DEFAULT_READY_TAG);
        assert!(!waiter.notify(&ReadySignal::new(1, "camera_info")));
        assert_eq!(waiter.wait(Duration::from_millis(10)), WaitOutcome::Idle);
        assert_eq!(waiter.stats().ignored, 1);
    }

    #[test]
    fn out_of_range_stamp_is_ignored() {
        let waiter = SignalWaiter::new(DEFAULT_READY_TAG);
        let mut signal = ReadySignal::new(0, DEFAULT_READY_TAG);
        signal.stamp.sec = 10_000_000_000;

        assert!(!waiter.notify(&signal));
        assert_eq!(waiter.wait(Duration::from_millis(10)), WaitOutcome::Idle);
        assert_eq!(waiter.stats().ignored, 1);
        assert_eq!(waiter.stats().accepted, 0);
    }

    #[test]
    fn signals_coalesce_to_latest() {
        let waiter = SignalWaiter::new(DEFAULT_READY_TAG);
        waiter.notify(&ReadySignal::new(1_000, DEFAULT_READY_TAG));
        waiter.notify(&ReadySignal::new(2_000, DEFAULT_READY_TAG));

        assert_eq!(waiter.wait(Duration::from_millis(10)), WaitOutcome::Ready(2_000));
        assert_eq!(waiter.wait(Duration::from_millis(10)), WaitOutcome::Idle);
        assert_eq!(
            waiter.stats(),
            SignalStats {
                accepted: 2,
                ignored: 0,
                coalesced: 1
            }
        );
    }

    #[test]
    fn wakes_on_signal_from_another_thread() {
        let waiter = Arc::new(SignalWaiter::new(DEFAULT_READY_TAG));
        let notifier = {
            let waiter = Arc::clone(&waiter);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                waiter.notify(&ReadySignal::new(1_005_000_000, DEFAULT_READY_TAG));
            })
        };

        let outcome = waiter.wait(Duration::from_secs(5));
        notifier.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Ready(1_005_000_000));
    }

    #[test]
    fn shutdown_unblocks_waiter() {
        let waiter = Arc::new(SignalWaiter::new(DEFAULT_READY_TAG));
        let handle = {
            let waiter = Arc::clone(&waiter);
            std::thread::spawn(move || {
                let start = Instant::now();
                (waiter.wait(Duration::from_secs(30)), start.elapsed())
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        waiter.shutdown();
        let (outcome, elapsed) = handle.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Shutdown);
        assert!(elapsed < Duration::from_secs(5));
        assert!(waiter.is_shutdown());
    }
}
