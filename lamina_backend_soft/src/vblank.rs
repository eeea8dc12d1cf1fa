// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated vertical blank.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct TimerState {
    ticks: u64,
    stopped: bool,
}

#[derive(Debug, Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    cond: Condvar,
}

/// A background thread that produces vertical-blank ticks at a fixed
/// interval.
///
/// Waiters block on a condition variable until the next tick or their
/// timeout. Dropping the timer stops and joins the thread.
#[derive(Debug)]
pub struct VBlankTimer {
    shared: Arc<TimerShared>,
    interval: Duration,
    thread: Option<JoinHandle<()>>,
}

impl VBlankTimer {
    /// Starts ticking every `interval`.
    ///
    /// Fails if the timer thread cannot be spawned.
    pub fn start(interval: Duration) -> std::io::Result<Self> {
        let shared = Arc::new(TimerShared::default());
        let thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("lamina-vblank".into())
                .spawn(move || run(&shared, interval))?
        };
        Ok(Self {
            shared,
            interval,
            thread: Some(thread),
        })
    }

    /// The tick interval.
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks produced so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.shared.state.lock().ticks
    }

    /// Blocks until the next tick or until `timeout` elapses.
    ///
    /// Returns `true` if a tick occurred.
    pub fn wait_next(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        let seen = state.ticks;
        while state.ticks == seen {
            if state.stopped {
                return false;
            }
            match deadline {
                Some(deadline) => {
                    if self.shared.cond.wait_until(&mut state, deadline).timed_out() {
                        return state.ticks != seen;
                    }
                }
                None => self.shared.cond.wait(&mut state),
            }
        }
        true
    }
}

impl Drop for VBlankTimer {
    fn drop(&mut self) {
        self.shared.state.lock().stopped = true;
        self.shared.cond.notify_all();
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

fn run(shared: &TimerShared, interval: Duration) {
    let mut next = Instant::now() + interval;
    let mut state = shared.state.lock();
    while !state.stopped {
        if shared.cond.wait_until(&mut state, next).timed_out() {
            state.ticks += 1;
            shared.cond.notify_all();
            let now = Instant::now();
            next += interval;
            if next < now {
                // Fell behind; resume the cadence from now instead of bursting.
                next = now + interval;
            }
        }
    }
}
