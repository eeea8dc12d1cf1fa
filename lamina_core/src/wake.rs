// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coalescing wake primitive for the compositor thread.
//!
//! Producers, the z-order directory, and the compositor itself raise a
//! [`WakeSignal`] whenever there is new damage. The compositor thread sleeps
//! on it with a timeout equal to the refresh interval. Raising the signal
//! while it is already raised is a no-op rather than a queued event, so a
//! burst of commits costs one compositor cycle.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Why a wait on a [`WakeSignal`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WakeReason {
    /// The signal was raised.
    Signaled,
    /// The refresh timeout elapsed without a signal.
    Timeout,
}

#[derive(Debug, Default)]
struct WakeState {
    raised: bool,
    raises: u64,
    coalesced: u64,
}

/// A raised/lowered flag with a condition variable.
#[derive(Debug, Default)]
pub struct WakeSignal {
    state: Mutex<WakeState>,
    cond: Condvar,
}

impl WakeSignal {
    /// Creates a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.
    ///
    /// Returns `false` if it was already raised (the wake was coalesced).
    pub fn wake(&self) -> bool {
        let mut state = self.state.lock();
        if state.raised {
            state.coalesced += 1;
            return false;
        }
        state.raised = true;
        state.raises += 1;
        drop(state);
        self.cond.notify_one();
        true
    }

    /// Blocks until the signal is raised or `timeout` elapses, then lowers it.
    pub fn wait_timeout(&self, timeout: Duration) -> WakeReason {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !state.raised {
            let timed_out = match deadline {
                Some(deadline) => self.cond.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.cond.wait(&mut state);
                    false
                }
            };
            if timed_out && !state.raised {
                return WakeReason::Timeout;
            }
        }
        state.raised = false;
        WakeReason::Signaled
    }

    /// Lowers the signal without blocking. Returns whether it was raised.
    pub fn take(&self) -> bool {
        core::mem::take(&mut self.state.lock().raised)
    }

    /// Returns `true` if the signal is currently raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.state.lock().raised
    }

    /// Number of wakes that actually raised the signal.
    #[must_use]
    pub fn raises(&self) -> u64 {
        self.state.lock().raises
    }

    /// Number of wakes that were folded into an already-raised signal.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.state.lock().coalesced
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn second_wake_is_coalesced() {
        let signal = WakeSignal::new();
        assert!(signal.wake(), "first wake raises");
        assert!(!signal.wake(), "second wake is folded in");
        assert_eq!(signal.coalesced(), 1);
        assert_eq!(
            signal.wait_timeout(Duration::from_millis(1)),
            WakeReason::Signaled
        );
        assert!(!signal.is_raised(), "wait lowers the signal");
        assert_eq!(signal.raises(), 1);
    }

    #[test]
    fn wait_times_out_when_lowered() {
        let signal = WakeSignal::new();
        let start = Instant::now();
        assert_eq!(
            signal.wait_timeout(Duration::from_millis(20)),
            WakeReason::Timeout
        );
        assert!(
            start.elapsed() >= Duration::from_millis(20),
            "waited the full timeout"
        );
    }

    #[test]
    fn wake_from_another_thread() {
        let signal = Arc::new(WakeSignal::new());
        let remote = Arc::clone(&signal);
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            remote.wake();
        });
        assert_eq!(
            signal.wait_timeout(Duration::from_secs(5)),
            WakeReason::Signaled
        );
        waker.join().unwrap();
    }

    #[test]
    fn take_consumes_without_blocking() {
        let signal = WakeSignal::new();
        assert!(!signal.take(), "nothing raised yet");
        signal.wake();
        assert!(signal.take(), "raised signal is consumed");
        assert!(!signal.is_raised(), "take lowers the signal");
    }
}
