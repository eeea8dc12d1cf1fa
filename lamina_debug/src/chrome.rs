// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//! Phases become duration slices; wakes, presents, and failures become
//! instant events.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use lamina_core::time::{HostTime, Timebase};
use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let us = |t: HostTime| ticks_to_us(t.ticks(), timebase);
    let mut events: Vec<Value> = Vec::new();
    // Rich events carry no timestamp of their own; pin them to the last
    // present of their cycle.
    let mut last_present = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::CycleBegin(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Wake",
                    "cat": "Cycle",
                    "ts": us(e.now),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "reason": format!("{:?}", e.reason),
                        "deadline_us": us(e.deadline),
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.name(),
                    "cat": "Cycle",
                    "ts": us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.name(),
                    "cat": "Cycle",
                    "ts": us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Present(e) => {
                last_present = us(e.presented_at);
                events.push(json!({
                    "ph": "i",
                    "name": "Present",
                    "cat": "Output",
                    "ts": last_present,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                        "damage_area": e.damage_area,
                        "rects": e.rect_count,
                        "full_frame": e.full_frame,
                    }
                }));
            }
            RecordedEvent::PresentFailure(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": if e.disabled { "CompositingDisabled" } else { "PresentFailed" },
                    "cat": "Output",
                    "ts": us(e.failed_at),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": e.frame_index,
                        "consecutive": e.consecutive,
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": us(s.start),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": s.frame_index,
                        "collect_us": ticks_to_us(s.collect_ticks, timebase),
                        "blend_us": ticks_to_us(s.blend_ticks, timebase),
                        "present_us": ticks_to_us(s.present_ticks, timebase),
                        "sync_us": ticks_to_us(s.sync_ticks, timebase),
                        "blended": s.surfaces_blended,
                        "skipped": s.surfaces_skipped,
                        "damage_area": s.damage_area,
                        "sync": s.sync.map(|sync| format!("{sync:?}")),
                        "missed_deadline": s.missed_deadline,
                    }
                }));
            }
            RecordedEvent::DamageRects {
                frame_index,
                count,
                area,
            } => {
                events.push(json!({
                    "ph": "C",
                    "name": "Damage",
                    "cat": "Rich",
                    "ts": last_present,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "rects": count,
                        "area": area,
                    },
                    "id": frame_index,
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    HostTime(ticks).to_nanos(timebase) as f64 / 1000.0
}
