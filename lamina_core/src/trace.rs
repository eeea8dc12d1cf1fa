// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the compositor cycle.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! compositor calls at each stage of a cycle. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps during a cycle and
//! produces a [`FrameSummary`] at the end.
//!
//! Structured log output (`tracing` spans and events) is separate from this
//! module and always available; trace sinks are for machine-readable frame
//! timelines.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`DamageRect`] events and the
//!   corresponding `TraceSink` method.

use crate::time::HostTime;
use crate::timing::SyncOutcome;
use crate::wake::WakeReason;

#[cfg(feature = "trace-rich")]
use crate::geometry::PixelRect;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of the compositor cycle is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Snapshot the z-order and begin damage sessions.
    Collect,
    /// Composite damaged surfaces into the back buffer.
    Blend,
    /// Hand the back buffer to the presentation backend.
    Present,
    /// Wait for the vertical blank.
    Sync,
}

impl PhaseKind {
    /// All phases in cycle order.
    pub const ALL: [Self; 4] = [Self::Collect, Self::Blend, Self::Present, Self::Sync];

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Blend => "blend",
            Self::Present => "present",
            Self::Sync => "sync",
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the compositor wakes and starts a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleBeginEvent {
    /// Monotonic cycle counter.
    pub frame_index: u64,
    /// Why the compositor woke.
    pub reason: WakeReason,
    /// Host time at wake.
    pub now: HostTime,
    /// Presentation deadline for this cycle.
    pub deadline: HostTime,
}

/// Marks the beginning of a cycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBeginEvent {
    /// Cycle counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a cycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEndEvent {
    /// Cycle counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted after the backend accepted a present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentEvent {
    /// Cycle counter.
    pub frame_index: u64,
    /// Host time the present call returned.
    pub presented_at: HostTime,
    /// Number of presented pixels.
    pub damage_area: u64,
    /// Number of rectangles in the presented region.
    pub rect_count: u32,
    /// Whether the whole screen was presented.
    pub full_frame: bool,
}

/// Emitted when the backend rejected a present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentFailureEvent {
    /// Cycle counter.
    pub frame_index: u64,
    /// Host time of the failure.
    pub failed_at: HostTime,
    /// Failures in a row, including this one.
    pub consecutive: u32,
    /// Whether this failure switched the compositor to the fallback path.
    pub disabled: bool,
}

/// Per-cycle timing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSummary {
    /// Cycle counter.
    pub frame_index: u64,
    /// Host time at wake.
    pub start: HostTime,
    /// Presentation deadline.
    pub deadline: HostTime,
    /// Collect phase duration in ticks (0 if not measured).
    pub collect_ticks: u64,
    /// Blend phase duration in ticks (0 if not measured).
    pub blend_ticks: u64,
    /// Present phase duration in ticks (0 if not measured).
    pub present_ticks: u64,
    /// Sync phase duration in ticks (0 if not measured).
    pub sync_ticks: u64,
    /// Surfaces composited this cycle.
    pub surfaces_blended: u32,
    /// Surfaces skipped because their buffer could not be read.
    pub surfaces_skipped: u32,
    /// Presented pixel count (0 for an idle cycle).
    pub damage_area: u64,
    /// How the frame was paced, if anything was presented.
    pub sync: Option<SyncOutcome>,
    /// Whether the deadline was missed.
    pub missed_deadline: bool,
}

/// An axis-aligned damage rectangle in screen pixels.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

#[cfg(feature = "trace-rich")]
impl From<PixelRect> for DamageRect {
    fn from(r: PixelRect) -> Self {
        Self {
            x: r.x0,
            y: r.y0,
            width: r.width(),
            height: r.height(),
        }
    }
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the compositor.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a cycle starts.
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after a successful present.
    fn on_present(&mut self, e: &PresentEvent) {
        _ = e;
    }

    /// Called after a rejected present.
    fn on_present_failure(&mut self, e: &PresentFailureEvent) {
        _ = e;
    }

    /// Called with a per-cycle timing summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with the presented damage rectangles (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        _ = (frame_index, rects);
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        (**self).on_cycle_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        (**self).on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        (**self).on_phase_end(e);
    }

    fn on_present(&mut self, e: &PresentEvent) {
        (**self).on_present(e);
    }

    fn on_present_failure(&mut self, e: &PresentFailureEvent) {
        (**self).on_present_failure(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        (**self).on_frame_summary(s);
    }

    #[cfg(feature = "trace-rich")]
    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        (**self).on_damage_rects(frame_index, rects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits a [`CycleBeginEvent`].
    #[inline]
    pub fn cycle_begin(&mut self, e: &CycleBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_cycle_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PresentEvent`].
    #[inline]
    pub fn present(&mut self, e: &PresentEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_present(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PresentFailureEvent`].
    #[inline]
    pub fn present_failure(&mut self, e: &PresentFailureEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_present_failure(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits damage rectangles (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        if let Some(s) = &mut self.sink {
            s.on_damage_rects(frame_index, rects);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a cycle and produces a [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    begin: CycleBeginEvent,
    phase_starts: [Option<HostTime>; 4],
    phase_ends: [Option<HostTime>; 4],
    surfaces_blended: u32,
    surfaces_skipped: u32,
    damage_area: u64,
    sync: Option<SyncOutcome>,
    missed_deadline: bool,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given cycle.
    #[must_use]
    pub fn new(begin: &CycleBeginEvent) -> Self {
        Self {
            begin: *begin,
            phase_starts: [None; 4],
            phase_ends: [None; 4],
            surfaces_blended: 0,
            surfaces_skipped: 0,
            damage_area: 0,
            sync: None,
            missed_deadline: false,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Records how many surfaces were blended and skipped.
    pub fn set_surfaces(&mut self, blended: u32, skipped: u32) {
        self.surfaces_blended = blended;
        self.surfaces_skipped = skipped;
    }

    /// Records the presented area.
    pub fn set_damage_area(&mut self, area: u64) {
        self.damage_area = area;
    }

    /// Records the pacing of the presented frame.
    pub fn set_sync(&mut self, sync: SyncOutcome) {
        self.sync = Some(sync);
    }

    /// Sets whether the deadline was missed.
    pub fn set_missed_deadline(&mut self, missed: bool) {
        self.missed_deadline = missed;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.begin.frame_index,
            start: self.begin.now,
            deadline: self.begin.deadline,
            collect_ticks: self.phase_duration(PhaseKind::Collect),
            blend_ticks: self.phase_duration(PhaseKind::Blend),
            present_ticks: self.phase_duration(PhaseKind::Present),
            sync_ticks: self.phase_duration(PhaseKind::Sync),
            surfaces_blended: self.surfaces_blended,
            surfaces_skipped: self.surfaces_skipped,
            damage_area: self.damage_area,
            sync: self.sync,
            missed_deadline: self.missed_deadline,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.ticks().saturating_sub(start.ticks()),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Collect => 0,
        PhaseKind::Blend => 1,
        PhaseKind::Present => 2,
        PhaseKind::Sync => 3,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
