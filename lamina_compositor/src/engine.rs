// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor state machine.
//!
//! One call to [`Compositor::run_cycle`] walks
//! `Waiting → Collecting → Blending → Presenting → Idle`:
//!
//! ```text
//!   Waiting     reclaim retired surfaces, take the z-order snapshot
//!   Collecting  begin a damage session on every member and on the exposure
//!               tracker; union screen-space damage; drop bypass areas
//!               └─ nothing damaged ──────────────────────────► Idle
//!   Blending    read-lock every damaged layer, fill the background, then
//!               copy or src-over each layer bottom to top
//!   Presenting  present the damage region, wait for vblank if the backend
//!               can, end every session (re-waking on late damage)
//! ```
//!
//! Retries never raise the wake signal. A skipped surface is re-queued
//! quietly and a rejected present only sets a repaint flag, so both are
//! picked up by the next wake or refresh timeout.
//!
//! [`CompositorThread`](crate::CompositorThread) calls `run_cycle` after
//! each wake; tests drive it directly.

use core::fmt;
use std::sync::Arc;

use lamina_core::backend::PresentationBackend;
use lamina_core::geometry::PixelSize;
use lamina_core::pixel::{Pixel, PixelBuffer};
use lamina_core::region::Region;
use lamina_core::surface::{ReadHandle, Surface, SurfaceDesc, check_geometry};
use lamina_core::time::{Clock, HostTime, SystemClock, duration_ticks};
use lamina_core::timing::{Ema, FrameDeadline, SyncOutcome};
#[cfg(feature = "trace-rich")]
use lamina_core::trace::DamageRect;
use lamina_core::trace::{
    CycleBeginEvent, FrameSummaryBuilder, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    PresentEvent, PresentFailureEvent, TraceSink, Tracer,
};
use lamina_core::wake::{WakeReason, WakeSignal};
use lamina_core::zorder::{OrderedEntry, ZOrderDirectory};
use lamina_core::{Error, Result};

use crate::blend::{self, BlendMode};
use crate::config::CompositorConfig;
use crate::fallback;
use crate::frame::CompositionFrame;
use crate::pool::BufferPool;

/// Where the compositor is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Between cycles, waiting for a wake or the refresh timeout.
    Idle,
    /// Woken; preparing the cycle.
    Waiting,
    /// Opening damage sessions and building the frame's damage.
    Collecting,
    /// Compositing surfaces into the back buffer.
    Blending,
    /// Handing the frame to the backend and closing sessions.
    Presenting,
}

/// Counters published after every cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineStats {
    /// Composited frames the backend accepted.
    pub frames_presented: u64,
    /// Cycles that found nothing to repaint.
    pub idle_cycles: u64,
    /// Frames drawn by the fallback path.
    pub fallback_frames: u64,
    /// Surfaces skipped because their read slot was unavailable.
    pub skipped_surfaces: u64,
    /// Read handles that failed validation after blending.
    pub torn_reads: u64,
    /// Rejected present calls, composited or fallback.
    pub present_failures: u64,
    /// Rejected present calls in a row.
    pub consecutive_failures: u32,
    /// Wakes folded into an already-raised signal.
    pub coalesced_wakes: u64,
    /// Retired surfaces whose buffers went back to the pool.
    pub reclaimed_surfaces: u64,
    /// Whether compositing is disabled and the fallback path is active.
    pub fallback: bool,
    /// Pixel area presented by the last non-idle cycle.
    pub last_damage_area: u64,
    /// Presented frames confirmed by a vertical blank.
    pub tear_free_frames: u64,
    /// Smoothed wall-clock cost of a cycle in nanoseconds.
    pub cycle_cost_ema_ns: f64,
}

/// What a single [`Compositor::run_cycle`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was damaged; the backend was not called.
    Idle,
    /// A composited frame was presented.
    Presented {
        /// Presented pixel count.
        damage_area: u64,
        /// How the frame was paced.
        sync: SyncOutcome,
    },
    /// The backend rejected the frame. The next cycle re-presents the whole
    /// screen, or switches to the fallback path.
    PresentFailed,
    /// Compositing is disabled; the fallback path ran.
    Fallback {
        /// Whether a frame reached the backend.
        presented: bool,
    },
}

/// Phase bookkeeping for one cycle: feeds both the [`Tracer`] and the
/// [`FrameSummaryBuilder`].
struct CycleTrace<'a> {
    tracer: Tracer<'a>,
    summary: FrameSummaryBuilder,
    frame_index: u64,
}

impl CycleTrace<'_> {
    fn begin(&mut self, phase: PhaseKind, timestamp: HostTime) {
        self.summary.phase_begin(phase, timestamp);
        self.tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase,
            timestamp,
        });
    }

    fn end(&mut self, phase: PhaseKind, timestamp: HostTime) {
        self.summary.phase_end(phase, timestamp);
        self.tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase,
            timestamp,
        });
    }
}

/// The damage-driven compositor.
///
/// Owns the back buffer, the [`BufferPool`], and the backend. Shares the
/// [`ZOrderDirectory`] with the window-management layer but only ever reads
/// its snapshots.
pub struct Compositor<B: PresentationBackend> {
    config: CompositorConfig,
    directory: Arc<ZOrderDirectory>,
    backend: B,
    back_buffer: PixelBuffer,
    background: Pixel,
    waker: Arc<WakeSignal>,
    pool: BufferPool,
    state: EngineState,
    stats: EngineStats,
    full_repaint_pending: bool,
    fallback_repaint: bool,
    retired: Vec<Arc<Surface>>,
    frame_index: u64,
    clock: Box<dyn Clock>,
    cycle_cost: Ema,
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl<B: PresentationBackend> fmt::Debug for Compositor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("frame_index", &self.frame_index)
            .field("back_buffer", &self.back_buffer)
            .field("pool", &self.pool)
            .field("stats", &self.stats)
            .field("retired", &self.retired.len())
            .finish_non_exhaustive()
    }
}

impl<B: PresentationBackend> Compositor<B> {
    /// Creates a compositor presenting `directory` through `backend`.
    ///
    /// The back buffer is sized to the backend and starts filled with the
    /// configured background. If the directory was built with a waker, the
    /// compositor sleeps on it; otherwise it creates its own.
    ///
    /// With `config.enabled == false` the compositor starts on the fallback
    /// path.
    pub fn new(
        config: CompositorConfig,
        directory: Arc<ZOrderDirectory>,
        backend: B,
    ) -> Result<Self> {
        let background = config.background_pixel();
        let back_buffer = PixelBuffer::try_filled(backend.size(), background)?;
        let waker = directory
            .waker()
            .cloned()
            .unwrap_or_else(|| Arc::new(WakeSignal::new()));
        let pool = BufferPool::new(config.pool_capacity, config.pool_trim_horizon);
        let fallback = !config.enabled;
        if fallback {
            tracing::info!("compositing disabled by configuration");
        }
        Ok(Self {
            config,
            directory,
            backend,
            back_buffer,
            background,
            waker,
            pool,
            state: EngineState::Idle,
            stats: EngineStats {
                fallback,
                ..EngineStats::default()
            },
            full_repaint_pending: false,
            fallback_repaint: fallback,
            retired: Vec::new(),
            frame_index: 0,
            clock: Box::new(SystemClock),
            cycle_cost: Ema::default(),
            sink: None,
        })
    }

    /// Replaces the clock used for deadlines and cycle costs.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Routes frame-loop events to `sink`.
    ///
    /// Events are only emitted when the `trace` feature is enabled.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: impl TraceSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Removes and returns the trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink + Send>> {
        self.sink.take()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current state. Always [`EngineState::Idle`] between cycles.
    #[inline]
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Counters as of the last cycle.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The configuration the compositor was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// The shared directory.
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Arc<ZOrderDirectory> {
        &self.directory
    }

    /// The signal the compositor sleeps on.
    #[inline]
    #[must_use]
    pub fn waker(&self) -> &Arc<WakeSignal> {
        &self.waker
    }

    /// The composed image.
    #[inline]
    #[must_use]
    pub fn back_buffer(&self) -> &PixelBuffer {
        &self.back_buffer
    }

    /// The backend.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The buffer pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Number of cycles run so far.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Retired surfaces still waiting for their last reference to go away.
    #[must_use]
    pub fn retired_pending(&self) -> usize {
        self.retired.len()
    }

    /// Returns `true` once compositing has been disabled.
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.stats.fallback
    }

    /// Repaints and presents the whole screen on the next cycle.
    pub fn request_full_repaint(&mut self) {
        self.full_repaint_pending = true;
        self.fallback_repaint = true;
        self.waker.wake();
    }

    // -----------------------------------------------------------------------
    // Pool-backed surface management
    // -----------------------------------------------------------------------

    /// Creates a surface whose buffers come from the pool.
    ///
    /// The surface is not registered with the directory.
    pub fn create_surface(&mut self, desc: SurfaceDesc) -> Result<Arc<Surface>> {
        check_geometry(desc.origin, desc.size)?;
        let buffers = self.pool.acquire_pair(desc.size)?;
        match Surface::with_buffers(desc, buffers) {
            Ok(surface) => Ok(Arc::new(surface)),
            Err(rejected) => {
                for buffer in rejected.buffers {
                    self.pool.release(buffer);
                }
                Err(rejected.error)
            }
        }
    }

    /// Resizes `surface` with pooled buffers, recycles the old ones, and
    /// tells the directory about the new geometry.
    ///
    /// Never blocks. Returns `Ok(false)` while a producer handle or a read is
    /// still outstanding: the surface stays fenced, and the call must be
    /// repeated with the same size until it returns `Ok(true)`.
    pub fn resize_surface(&mut self, surface: &Surface, size: PixelSize) -> Result<bool> {
        let pool = &mut self.pool;
        let Some(old) = surface.try_resize_with(size, |size| pool.acquire_pair(size))? else {
            return Ok(false);
        };
        for buffer in old {
            self.pool.release(buffer);
        }
        match self.directory.notify_geometry_changed(surface.id()) {
            Ok(()) | Err(Error::UnknownSurface(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------------
    // The cycle
    // -----------------------------------------------------------------------

    /// Runs one full cycle and returns to [`EngineState::Idle`].
    ///
    /// Errors are handled here according to the degradation policy and are
    /// reflected in the outcome and in [`stats`](Self::stats).
    pub fn run_cycle(&mut self, reason: WakeReason) -> CycleOutcome {
        self.frame_index += 1;
        let frame_index = self.frame_index;
        self.state = EngineState::Waiting;

        let now = self.clock.now();
        let deadline = FrameDeadline::new(now, self.config.refresh_interval());
        let begin = CycleBeginEvent {
            frame_index,
            reason,
            now,
            deadline: deadline.deadline,
        };

        let mut sink = self.sink.take();
        let tracer = match sink.as_deref_mut() {
            Some(sink) => Tracer::new(sink),
            None => Tracer::none(),
        };
        let mut trace = CycleTrace {
            tracer,
            summary: FrameSummaryBuilder::new(&begin),
            frame_index,
        };
        trace.tracer.cycle_begin(&begin);

        self.reclaim_retired();
        self.match_backend_size();

        let mut frame = CompositionFrame::new(frame_index, deadline, self.directory.snapshot());
        let outcome = if self.stats.fallback {
            self.fallback_cycle(&mut frame, &mut trace)
        } else {
            self.composite_cycle(&mut frame, &mut trace)
        };

        let finished = self.clock.now();
        self.cycle_cost
            .update(duration_ticks(finished.saturating_duration_since(now)) as f64);
        self.stats.cycle_cost_ema_ns = self.cycle_cost.get();
        self.stats.coalesced_wakes = self.waker.coalesced();

        let missed = frame.deadline.is_missed(finished);
        if missed && !matches!(outcome, CycleOutcome::Idle) {
            tracing::debug!(frame_index, "frame missed its deadline");
        }
        trace.summary.set_missed_deadline(missed);
        let CycleTrace {
            mut tracer,
            summary,
            ..
        } = trace;
        tracer.frame_summary(&summary.finish());
        drop(tracer);
        self.sink = sink;

        self.pool.trim(frame_index);
        self.state = EngineState::Idle;
        outcome
    }

    fn composite_cycle(
        &mut self,
        frame: &mut CompositionFrame,
        trace: &mut CycleTrace<'_>,
    ) -> CycleOutcome {
        let frame_index = frame.frame_index;

        self.state = EngineState::Collecting;
        trace.begin(PhaseKind::Collect, self.clock.now());
        let snapshot = Arc::clone(&frame.snapshot);
        for entry in snapshot.back_to_front() {
            frame.collect(entry);
        }
        frame.expose(self.directory.begin_exposure());
        if core::mem::take(&mut self.full_repaint_pending) {
            frame.force_full();
        }
        frame.finish_collection();
        frame.damage.clip_to(self.back_buffer.bounds());
        trace.end(PhaseKind::Collect, self.clock.now());

        if frame.is_idle() {
            self.end_sessions(frame);
            self.stats.idle_cycles += 1;
            return CycleOutcome::Idle;
        }

        self.state = EngineState::Blending;
        trace.begin(PhaseKind::Blend, self.clock.now());
        let (blended, skipped) = self.blend(frame);
        trace.end(PhaseKind::Blend, self.clock.now());
        trace.summary.set_surfaces(blended, skipped);

        self.state = EngineState::Presenting;
        let damage_area = frame.damage.area();
        trace.summary.set_damage_area(damage_area);
        #[cfg(feature = "trace-rich")]
        {
            let rects: Vec<DamageRect> =
                frame.damage.rects().iter().copied().map(DamageRect::from).collect();
            trace.tracer.damage_rects(frame_index, &rects);
        }

        trace.begin(PhaseKind::Present, self.clock.now());
        let presented = if frame.damage.is_empty() {
            // Every damaged surface was skipped; nothing changed on screen.
            Ok(false)
        } else {
            self.backend
                .present(&self.back_buffer, &frame.damage)
                .map(|()| true)
        };
        let presented_at = self.clock.now();
        trace.end(PhaseKind::Present, presented_at);

        let outcome = match presented {
            Ok(false) => {
                self.stats.idle_cycles += 1;
                CycleOutcome::Idle
            }
            Ok(true) => {
                self.stats.consecutive_failures = 0;
                self.stats.frames_presented += 1;
                self.stats.last_damage_area = damage_area;
                trace.tracer.present(&PresentEvent {
                    frame_index,
                    presented_at,
                    damage_area,
                    rect_count: u32::try_from(frame.damage.rects().len()).unwrap_or(u32::MAX),
                    full_frame: frame.full_frame,
                });

                let sync = self.wait_for_sync(trace);
                trace.summary.set_sync(sync);
                if sync.is_tear_free() {
                    self.stats.tear_free_frames += 1;
                }
                tracing::debug!(
                    frame_index,
                    damage_area,
                    blended,
                    skipped,
                    ?sync,
                    "frame presented"
                );
                CycleOutcome::Presented { damage_area, sync }
            }
            Err(err) => {
                self.present_failed(&err, frame_index, presented_at, trace);
                CycleOutcome::PresentFailed
            }
        };

        self.end_sessions(frame);
        outcome
    }

    /// Fills the damage with the background and composites every layer that
    /// intersects it. Returns how many surfaces were blended and skipped.
    fn blend(&mut self, frame: &mut CompositionFrame) -> (u32, u32) {
        let snapshot = Arc::clone(&frame.snapshot);
        let mut layers: Vec<(&OrderedEntry, ReadHandle<'_>)> = Vec::new();
        let mut unavailable = Region::new();
        let mut skipped = 0_u32;

        // Acquire every read handle before touching the back buffer, so a
        // skipped surface leaves the previous frame's pixels in place.
        for entry in snapshot.back_to_front() {
            if !entry.is_composited() || !entry.visible_region.intersects(&frame.damage) {
                continue;
            }
            match entry.surface.read_buffer() {
                Ok(handle) => layers.push((entry, handle)),
                Err(err) => {
                    tracing::warn!(
                        surface = ?entry.id(),
                        frame_index = frame.frame_index,
                        %err,
                        "surface skipped for this frame"
                    );
                    skipped += 1;
                    unavailable.union(&entry.visible_region);
                    frame.retry.push(Arc::clone(&entry.surface));
                }
            }
        }
        frame.damage.subtract(&unavailable);

        blend::clear(&mut self.back_buffer, &frame.damage, self.background);
        let mut blended = 0_u32;
        for (entry, handle) in &layers {
            let clip = entry.visible_region.intersection(&frame.damage);
            if clip.is_empty() {
                continue;
            }
            blend::composite(
                &mut self.back_buffer,
                handle,
                entry.bounds.origin(),
                &clip,
                BlendMode::for_surface(entry.opaque, entry.alpha),
            );
            if handle.validate() {
                entry.surface.mark_composited(handle.sequence());
                blended += 1;
            } else {
                tracing::warn!(surface = ?entry.id(), "read slot republished during blend");
                self.stats.torn_reads += 1;
                frame.retry.push(Arc::clone(&entry.surface));
            }
        }
        drop(layers);

        self.stats.skipped_surfaces += u64::from(skipped);
        (blended, skipped)
    }

    fn wait_for_sync(&mut self, trace: &mut CycleTrace<'_>) -> SyncOutcome {
        if !self.backend.supports_async_vsync() {
            return SyncOutcome::Unsynced;
        }
        trace.begin(PhaseKind::Sync, self.clock.now());
        let synced = self.backend.wait_for_sync(self.config.refresh_interval());
        trace.end(PhaseKind::Sync, self.clock.now());
        if synced {
            SyncOutcome::VBlank
        } else {
            SyncOutcome::TimedOut
        }
    }

    fn present_failed(
        &mut self,
        err: &Error,
        frame_index: u64,
        failed_at: HostTime,
        trace: &mut CycleTrace<'_>,
    ) {
        self.stats.present_failures += 1;
        self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
        let consecutive = self.stats.consecutive_failures;
        let disable = !self.stats.fallback && consecutive >= self.config.max_present_failures;
        trace.tracer.present_failure(&PresentFailureEvent {
            frame_index,
            failed_at,
            consecutive,
            disabled: disable,
        });

        if disable {
            tracing::error!(
                consecutive,
                %err,
                "presentation keeps failing; compositing disabled, drawing the topmost surface directly"
            );
            self.stats.fallback = true;
            self.fallback_repaint = true;
        } else {
            tracing::warn!(frame_index, consecutive, %err, "present rejected; full repaint queued");
            self.full_repaint_pending = true;
        }
    }

    fn fallback_cycle(
        &mut self,
        frame: &mut CompositionFrame,
        trace: &mut CycleTrace<'_>,
    ) -> CycleOutcome {
        let frame_index = frame.frame_index;

        self.state = EngineState::Collecting;
        trace.begin(PhaseKind::Collect, self.clock.now());
        let snapshot = Arc::clone(&frame.snapshot);
        for entry in snapshot.back_to_front() {
            frame.collect(entry);
        }
        frame.expose(self.directory.begin_exposure());
        trace.end(PhaseKind::Collect, self.clock.now());

        if frame.is_idle() && !self.fallback_repaint {
            self.end_sessions(frame);
            self.stats.idle_cycles += 1;
            return CycleOutcome::Fallback { presented: false };
        }
        self.fallback_repaint = false;

        self.state = EngineState::Blending;
        trace.begin(PhaseKind::Blend, self.clock.now());
        let drawn = fallback::draw_topmost(&mut self.back_buffer, &snapshot);
        trace.end(PhaseKind::Blend, self.clock.now());

        self.state = EngineState::Presenting;
        let presented = match drawn {
            Ok(Some((id, region))) => {
                trace.begin(PhaseKind::Present, self.clock.now());
                let result = self.backend.present(&self.back_buffer, &region);
                let at = self.clock.now();
                trace.end(PhaseKind::Present, at);
                match result {
                    Ok(()) => {
                        self.stats.fallback_frames += 1;
                        self.stats.last_damage_area = region.area();
                        trace.summary.set_damage_area(region.area());
                        trace.summary.set_surfaces(1, 0);
                        tracing::debug!(frame_index, surface = ?id, "fallback frame presented");
                        true
                    }
                    Err(err) => {
                        self.stats.present_failures += 1;
                        self.fallback_repaint = true;
                        trace.tracer.present_failure(&PresentFailureEvent {
                            frame_index,
                            failed_at: at,
                            consecutive: self.stats.consecutive_failures,
                            disabled: false,
                        });
                        tracing::warn!(frame_index, %err, "fallback present rejected");
                        false
                    }
                }
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(frame_index, %err, "fallback surface unavailable; retrying");
                self.fallback_repaint = true;
                trace.summary.set_surfaces(0, 1);
                false
            }
        };

        self.end_sessions(frame);
        CycleOutcome::Fallback { presented }
    }

    /// Closes the frame's sessions and re-raises the wake signal if damage
    /// arrived while they were open. Skipped surfaces are re-queued after
    /// the check.
    fn end_sessions(&self, frame: &mut CompositionFrame) {
        let surfaces = frame.end_sessions();
        let exposure = self.directory.end_exposure();
        if surfaces || exposure {
            self.waker.wake();
        }
        for surface in frame.retry.drain(..) {
            surface.requeue_all();
        }
    }

    fn reclaim_retired(&mut self) {
        self.retired.extend(self.directory.drain_retired());
        for surface in core::mem::take(&mut self.retired) {
            match Arc::try_unwrap(surface) {
                Ok(surface) => {
                    let id = surface.id();
                    for buffer in surface.into_buffers() {
                        self.pool.release(buffer);
                    }
                    self.stats.reclaimed_surfaces += 1;
                    tracing::debug!(surface = ?id, "retired surface reclaimed");
                }
                Err(shared) => self.retired.push(shared),
            }
        }
    }

    /// Follows a backend mode change by reallocating the back buffer and
    /// repainting everything.
    fn match_backend_size(&mut self) {
        let size = self.backend.size();
        if size == self.back_buffer.size() {
            return;
        }
        match PixelBuffer::try_filled(size, self.background) {
            Ok(buffer) => {
                tracing::info!(?size, "backend size changed; back buffer reallocated");
                self.back_buffer = buffer;
                self.full_repaint_pending = true;
                self.fallback_repaint = true;
            }
            Err(err) => tracing::warn!(?size, %err, "back buffer reallocation failed"),
        }
    }
}
