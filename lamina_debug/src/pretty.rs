// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use lamina_core::time::{HostTime, Timebase};
use lamina_core::trace::{
    CycleBeginEvent, DamageRect, FrameSummary, PhaseBeginEvent, PhaseEndEvent, PresentEvent,
    PresentFailureEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ticks_to_us(&self, ticks: u64) -> f64 {
        self.host_us(HostTime(ticks))
    }

    fn host_us(&self, t: HostTime) -> f64 {
        t.to_nanos(self.timebase) as f64 / 1000.0
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[wake] frame={} reason={:?} now={:.1}µs deadline={:.1}µs",
            e.frame_index,
            e.reason,
            self.host_us(e.now),
            self.host_us(e.deadline),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            self.host_us(e.timestamp),
        );
    }

    fn on_present(&mut self, e: &PresentEvent) {
        let full = if e.full_frame { " full" } else { "" };
        let _ = writeln!(
            self.writer,
            "[present] frame={} area={}px rects={}{full} at {:.1}µs",
            e.frame_index,
            e.damage_area,
            e.rect_count,
            self.host_us(e.presented_at),
        );
    }

    fn on_present_failure(&mut self, e: &PresentFailureEvent) {
        let verdict = if e.disabled { "DISABLED" } else { "retry" };
        let _ = writeln!(
            self.writer,
            "[present:failed] frame={} consecutive={} {verdict}",
            e.frame_index, e.consecutive,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let missed = if s.missed_deadline { "MISSED" } else { "ok" };
        let sync = s.sync.map_or_else(|| "-".to_owned(), |sync| format!("{sync:?}"));
        let _ = writeln!(
            self.writer,
            "[summary] frame={} collect={:.1}µs blend={:.1}µs present={:.1}µs \
             sync={:.1}µs surfaces={}/{} area={} pacing={sync} deadline={missed}",
            s.frame_index,
            self.ticks_to_us(s.collect_ticks),
            self.ticks_to_us(s.blend_ticks),
            self.ticks_to_us(s.present_ticks),
            self.ticks_to_us(s.sync_ticks),
            s.surfaces_blended,
            s.surfaces_skipped,
            s.damage_area,
        );
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        let _ = write!(self.writer, "[damage] frame={frame_index} rects={}", rects.len());
        for r in rects.iter().take(4) {
            let _ = write!(self.writer, " {}x{}@{},{}", r.width, r.height, r.x, r.y);
        }
        if rects.len() > 4 {
            let _ = write!(self.writer, " …");
        }
        let _ = writeln!(self.writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::timing::SyncOutcome;
    use lamina_core::wake::WakeReason;

    #[test]
    fn pretty_print_wake() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_cycle_begin(&CycleBeginEvent {
            frame_index: 1,
            reason: WakeReason::Timeout,
            now: HostTime(1_000_000),
            deadline: HostTime(17_666_667),
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("[wake]"), "got: {output}");
        assert!(output.contains("frame=1"), "got: {output}");
        assert!(output.contains("reason=Timeout"), "got: {output}");
    }

    #[test]
    fn pretty_print_summary_and_damage() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_frame_summary(&FrameSummary {
            frame_index: 9,
            start: HostTime(0),
            deadline: HostTime(16_666_667),
            collect_ticks: 1_000,
            blend_ticks: 2_500,
            present_ticks: 500,
            sync_ticks: 0,
            surfaces_blended: 2,
            surfaces_skipped: 1,
            damage_area: 1024,
            sync: Some(SyncOutcome::VBlank),
            missed_deadline: true,
        });
        sink.on_damage_rects(
            9,
            &[DamageRect {
                x: 4,
                y: 8,
                width: 32,
                height: 32,
            }],
        );
        let output = String::from_utf8(sink.into_writer()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("blend=2.5µs"), "got: {output}");
        assert!(lines[0].contains("surfaces=2/1"), "got: {output}");
        assert!(lines[0].contains("pacing=VBlank deadline=MISSED"), "got: {output}");
        assert_eq!(lines[1], "[damage] frame=9 rects=1 32x32@4,8");
    }
}
