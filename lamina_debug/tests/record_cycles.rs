// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording real compositor cycles.

use std::sync::Arc;

use lamina_backend_soft::MemoryFramebuffer;
use lamina_compositor::{Compositor, CompositorConfig, CycleOutcome};
use lamina_core::geometry::{PixelPoint, PixelRect, PixelSize};
use lamina_core::pixel::Pixel;
use lamina_core::surface::{Surface, SurfaceDesc, SurfaceId};
use lamina_core::time::Timebase;
use lamina_core::timing::SyncOutcome;
use lamina_core::trace::{
    CycleBeginEvent, DamageRect, FrameSummary, PhaseBeginEvent, PhaseEndEvent, PresentEvent,
    PresentFailureEvent, TraceSink,
};
use lamina_core::wake::WakeReason;
use lamina_core::zorder::{ZOrderDirectory, ZPosition};
use lamina_debug::chrome;
use lamina_debug::recorder::{RecordedEvent, RecorderSink, decode};
use parking_lot::Mutex;

/// Lets the test read the recording while the compositor owns the sink.
#[derive(Clone, Default)]
struct SharedRecorder(Arc<Mutex<RecorderSink>>);

impl SharedRecorder {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().as_bytes().to_vec()
    }
}

impl TraceSink for SharedRecorder {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        self.0.lock().on_cycle_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.0.lock().on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.0.lock().on_phase_end(e);
    }

    fn on_present(&mut self, e: &PresentEvent) {
        self.0.lock().on_present(e);
    }

    fn on_present_failure(&mut self, e: &PresentFailureEvent) {
        self.0.lock().on_present_failure(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.0.lock().on_frame_summary(s);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        self.0.lock().on_damage_rects(frame_index, rects);
    }
}

fn recorded_compositor() -> (Compositor<MemoryFramebuffer>, SharedRecorder) {
    let dir = Arc::new(ZOrderDirectory::new(PixelRect::new(0, 0, 32, 32)));
    let fb = MemoryFramebuffer::new(PixelSize::new(32, 32)).unwrap();
    let recorder = SharedRecorder::default();
    let compositor = Compositor::new(CompositorConfig::default(), Arc::clone(&dir), fb)
        .unwrap()
        .with_trace_sink(recorder.clone());

    let surface = Arc::new(
        Surface::new(SurfaceDesc::opaque(
            SurfaceId(1),
            PixelPoint::new(4, 4),
            PixelSize::new(16, 16),
        ))
        .unwrap(),
    );
    dir.insert(Arc::clone(&surface), ZPosition::Top).unwrap();
    let mut pixels = surface.acquire_write().unwrap();
    pixels.fill(Pixel::WHITE);
    pixels.commit_all();
    (compositor, recorder)
}

fn summaries(events: &[RecordedEvent]) -> Vec<FrameSummary> {
    events
        .iter()
        .filter_map(|e| match e {
            RecordedEvent::FrameSummary(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[test]
fn presented_and_idle_cycles_are_recorded() {
    let (mut compositor, recorder) = recorded_compositor();
    assert!(matches!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::Presented { damage_area: 256, .. }
    ));
    assert_eq!(compositor.run_cycle(WakeReason::Timeout), CycleOutcome::Idle);

    let bytes = recorder.bytes();
    let mut iter = decode(&bytes);
    let events: Vec<_> = iter.by_ref().collect();
    assert_eq!(iter.remaining(), 0, "recording decodes completely");

    assert!(matches!(
        events[0],
        RecordedEvent::CycleBegin(CycleBeginEvent {
            frame_index: 1,
            reason: WakeReason::Signaled,
            ..
        })
    ));
    let begins = events
        .iter()
        .filter(|e| matches!(e, RecordedEvent::PhaseBegin(_)))
        .count();
    let ends = events
        .iter()
        .filter(|e| matches!(e, RecordedEvent::PhaseEnd(_)))
        .count();
    assert_eq!(begins, ends, "every phase is closed");

    assert!(events.iter().any(|e| matches!(
        e,
        RecordedEvent::DamageRects {
            frame_index: 1,
            area: 256,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        RecordedEvent::Present(PresentEvent {
            frame_index: 1,
            damage_area: 256,
            ..
        })
    )));

    let summaries = summaries(&events);
    assert_eq!(summaries.len(), 2, "one summary per cycle");
    assert_eq!(summaries[0].damage_area, 256);
    assert_eq!(summaries[0].surfaces_blended, 1);
    assert_eq!(summaries[0].sync, Some(SyncOutcome::Unsynced));
    assert_eq!(summaries[1].frame_index, 2);
    assert_eq!(summaries[1].damage_area, 0);
    assert_eq!(summaries[1].sync, None, "idle cycles present nothing");
}

#[test]
fn present_failures_are_recorded() {
    let (mut compositor, recorder) = recorded_compositor();
    compositor.backend().fail_next_presents(1);
    assert_eq!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::PresentFailed
    );

    let events: Vec<_> = decode(&recorder.bytes()).collect();
    let failure = events
        .iter()
        .find_map(|e| match e {
            RecordedEvent::PresentFailure(f) => Some(*f),
            _ => None,
        })
        .unwrap();
    assert_eq!(failure.frame_index, 1);
    assert_eq!(failure.consecutive, 1);
    assert!(!failure.disabled, "one failure does not disable compositing");
}

#[test]
fn recording_exports_to_chrome_json() {
    let (mut compositor, recorder) = recorded_compositor();
    compositor.run_cycle(WakeReason::Signaled);
    compositor.run_cycle(WakeReason::Timeout);

    let bytes = recorder.bytes();
    let count = decode(&bytes).count();
    let mut out = Vec::new();
    chrome::export(&bytes, Timebase::NANOS, &mut out).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&out).unwrap();
    assert_eq!(parsed.len(), count, "one trace event per recorded event");
    assert!(parsed.iter().any(|e| e["name"] == "Present"));
}
