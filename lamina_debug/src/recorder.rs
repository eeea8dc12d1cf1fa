// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each led by a one-byte
//! tag. [`decode`] reads them back as an iterator of [`RecordedEvent`].
//!
//! [`on_damage_rects`](TraceSink::on_damage_rects) stores only the count
//! and the total area.

use lamina_core::time::HostTime;
use lamina_core::timing::SyncOutcome;
use lamina_core::trace::{
    CycleBeginEvent, DamageRect, FrameSummary, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    PresentEvent, PresentFailureEvent, TraceSink,
};
use lamina_core::wake::WakeReason;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_CYCLE_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_PRESENT: u8 = 4;
const TAG_PRESENT_FAILURE: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_DAMAGE_RECTS: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Discards everything recorded so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_reason(&mut self, r: WakeReason) {
        self.write_u8(match r {
            WakeReason::Signaled => 0,
            WakeReason::Timeout => 1,
        });
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Collect => 0,
            PhaseKind::Blend => 1,
            PhaseKind::Present => 2,
            PhaseKind::Sync => 3,
        });
    }

    fn write_sync(&mut self, s: Option<SyncOutcome>) {
        self.write_u8(match s {
            None => 0,
            Some(SyncOutcome::VBlank) => 1,
            Some(SyncOutcome::TimedOut) => 2,
            Some(SyncOutcome::Unsynced) => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        self.write_u8(TAG_CYCLE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_reason(e.reason);
        self.write_u64(e.now.ticks());
        self.write_u64(e.deadline.ticks());
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_present(&mut self, e: &PresentEvent) {
        self.write_u8(TAG_PRESENT);
        self.write_u64(e.frame_index);
        self.write_u64(e.presented_at.ticks());
        self.write_u64(e.damage_area);
        self.write_u32(e.rect_count);
        self.write_bool(e.full_frame);
    }

    fn on_present_failure(&mut self, e: &PresentFailureEvent) {
        self.write_u8(TAG_PRESENT_FAILURE);
        self.write_u64(e.frame_index);
        self.write_u64(e.failed_at.ticks());
        self.write_u32(e.consecutive);
        self.write_bool(e.disabled);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u64(s.start.ticks());
        self.write_u64(s.deadline.ticks());
        self.write_u64(s.collect_ticks);
        self.write_u64(s.blend_ticks);
        self.write_u64(s.present_ticks);
        self.write_u64(s.sync_ticks);
        self.write_u32(s.surfaces_blended);
        self.write_u32(s.surfaces_skipped);
        self.write_u64(s.damage_area);
        self.write_sync(s.sync);
        self.write_bool(s.missed_deadline);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        self.write_u8(TAG_DAMAGE_RECTS);
        self.write_u64(frame_index);
        self.write_u32(u32::try_from(rects.len()).unwrap_or(u32::MAX));
        let area: u64 = rects
            .iter()
            .map(|r| u64::from(r.width) * u64::from(r.height))
            .sum();
        self.write_u64(area);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`CycleBeginEvent`].
    CycleBegin(CycleBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`PresentEvent`].
    Present(PresentEvent),
    /// A [`PresentFailureEvent`].
    PresentFailure(PresentFailureEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Damage rectangles presented in a cycle, reduced to their count and
    /// total area.
    DamageRects {
        /// Cycle counter.
        frame_index: u64,
        /// Number of rectangles.
        count: u32,
        /// Sum of the rectangle areas in pixels.
        area: u64,
    },
}

impl RecordedEvent {
    /// The cycle the event belongs to.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        match self {
            Self::CycleBegin(e) => e.frame_index,
            Self::PhaseBegin(e) => e.frame_index,
            Self::PhaseEnd(e) => e.frame_index,
            Self::Present(e) => e.frame_index,
            Self::PresentFailure(e) => e.frame_index,
            Self::FrameSummary(s) => s.frame_index,
            Self::DamageRects { frame_index, .. } => *frame_index,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    /// Bytes not consumed yet. Non-zero after iteration ends means the
    /// recording was truncated or corrupt.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_reason(&mut self) -> Option<WakeReason> {
        Some(match self.read_u8()? {
            0 => WakeReason::Signaled,
            _ => WakeReason::Timeout,
        })
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Collect,
            1 => PhaseKind::Blend,
            2 => PhaseKind::Present,
            _ => PhaseKind::Sync,
        })
    }

    fn read_sync(&mut self) -> Option<Option<SyncOutcome>> {
        Some(match self.read_u8()? {
            0 => None,
            1 => Some(SyncOutcome::VBlank),
            2 => Some(SyncOutcome::TimedOut),
            _ => Some(SyncOutcome::Unsynced),
        })
    }

    fn decode_cycle_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CycleBegin(CycleBeginEvent {
            frame_index: self.read_u64()?,
            reason: self.read_reason()?,
            now: self.read_time()?,
            deadline: self.read_time()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_present(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Present(PresentEvent {
            frame_index: self.read_u64()?,
            presented_at: self.read_time()?,
            damage_area: self.read_u64()?,
            rect_count: self.read_u32()?,
            full_frame: self.read_bool()?,
        }))
    }

    fn decode_present_failure(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PresentFailure(PresentFailureEvent {
            frame_index: self.read_u64()?,
            failed_at: self.read_time()?,
            consecutive: self.read_u32()?,
            disabled: self.read_bool()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            start: self.read_time()?,
            deadline: self.read_time()?,
            collect_ticks: self.read_u64()?,
            blend_ticks: self.read_u64()?,
            present_ticks: self.read_u64()?,
            sync_ticks: self.read_u64()?,
            surfaces_blended: self.read_u32()?,
            surfaces_skipped: self.read_u32()?,
            damage_area: self.read_u64()?,
            sync: self.read_sync()?,
            missed_deadline: self.read_bool()?,
        }))
    }

    fn decode_damage_rects(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::DamageRects {
            frame_index: self.read_u64()?,
            count: self.read_u32()?,
            area: self.read_u64()?,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        let event = match self.read_u8()? {
            TAG_CYCLE_BEGIN => self.decode_cycle_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_PRESENT => self.decode_present(),
            TAG_PRESENT_FAILURE => self.decode_present_failure(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_DAMAGE_RECTS => self.decode_damage_rects(),
            _ => None,
        };
        if event.is_none() {
            // Leave the bad record unconsumed so `remaining` reports it.
            self.pos = start;
        }
        event
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
