// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame deadlines and pacing observations.
//!
//! Each compositor cycle starts at some [`HostTime`] and has until the next
//! refresh to present: [`FrameDeadline`] captures that window. After
//! presenting, the compositor records how the frame was paced as a
//! [`SyncOutcome`]. [`Ema`] smooths per-cycle costs for statistics.

use std::time::Duration;

use crate::time::HostTime;

/// Start time and presentation deadline of one compositor cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameDeadline {
    /// When the cycle woke.
    pub start: HostTime,
    /// When the frame should be on its way to the display.
    pub deadline: HostTime,
}

impl FrameDeadline {
    /// Deadline one `refresh_interval` after `start`.
    #[inline]
    #[must_use]
    pub fn new(start: HostTime, refresh_interval: Duration) -> Self {
        Self {
            start,
            deadline: start + refresh_interval,
        }
    }

    /// Time left at `now`, or zero once the deadline has passed.
    #[inline]
    #[must_use]
    pub fn remaining(&self, now: HostTime) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    /// Returns `true` if `now` is past the deadline.
    #[inline]
    #[must_use]
    pub fn is_missed(&self, now: HostTime) -> bool {
        now > self.deadline
    }
}

/// How a presented frame was paced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
    /// The backend observed a real vertical blank after the present.
    VBlank,
    /// The backend can sync but the wait timed out.
    TimedOut,
    /// The backend has no vertical-blank source; no tear-free guarantee.
    Unsynced,
}

impl SyncOutcome {
    /// Returns `true` if the frame is known to be tear-free.
    #[inline]
    #[must_use]
    pub const fn is_tear_free(self) -> bool {
        matches!(self, Self::VBlank)
    }
}

/// Exponential moving average.
#[derive(Clone, Copy, Debug)]
pub struct Ema {
    value: f64,
    alpha: f64,
    initialized: bool,
}

impl Ema {
    /// Creates an average weighting each new sample by `alpha`.
    #[must_use]
    pub const fn new(alpha: f64) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    /// Feeds a sample. The first sample is taken as-is.
    pub fn update(&mut self, sample: f64) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    /// Current average, or 0 before the first sample.
    #[inline]
    #[must_use]
    pub const fn get(&self) -> f64 {
        self.value
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self::new(0.1)
    }
}
