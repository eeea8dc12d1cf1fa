// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Remote or virtual output.
//!
//! A [`VirtualOutput`] does not own a display. Every present is captured as a
//! [`PresentRecord`] carrying the damaged pixels, and records are queued for
//! a consumer (a remote-desktop encoder, a screen recorder, a test) that
//! drains them through an [`OutputReceiver`] on its own thread.
//!
//! The queue is bounded with a drop-oldest policy: a slow consumer loses the
//! oldest records rather than stalling the compositor. Lost records are
//! counted, and a consumer that fell behind should request a full repaint.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use lamina_core::backend::PresentationBackend;
use lamina_core::geometry::{PixelRect, PixelSize};
use lamina_core::pixel::{Pixel, PixelBuffer};
use lamina_core::region::Region;
use lamina_core::{Error, Result};
use parking_lot::Mutex;

/// The pixels of one damaged rectangle, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RectPayload {
    /// Screen rectangle.
    pub rect: PixelRect,
    /// `rect.width() × rect.height()` pixels.
    pub pixels: Vec<Pixel>,
}

/// One captured present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentRecord {
    /// Present counter, starting at 1.
    pub sequence: u64,
    /// The presented region.
    pub region: Region,
    /// Pixel data for every rectangle of `region`.
    pub payload: Vec<RectPayload>,
}

impl PresentRecord {
    /// Writes the record's pixels into `target`, the consumer's mirror of
    /// the output.
    pub fn apply(&self, target: &mut PixelBuffer) {
        for part in &self.payload {
            let rect = part.rect;
            if !target.bounds().contains_rect(rect) {
                continue;
            }
            let width = rect.width() as usize;
            for (row, y) in (rect.y0..rect.y1).enumerate() {
                let from = &part.pixels[row * width..(row + 1) * width];
                target.span_mut(y, rect.x0, rect.x1).copy_from_slice(from);
            }
        }
    }
}

#[derive(Debug)]
struct Outbox {
    records: VecDeque<PresentRecord>,
    capacity: usize,
    dropped: u64,
    connected: bool,
}

impl Outbox {
    /// Queues `record`, evicting the oldest one when full. Returns the
    /// sequence of the evicted record.
    fn push(&mut self, record: PresentRecord) -> Option<u64> {
        let evicted = if self.records.len() >= self.capacity {
            self.dropped += 1;
            self.records.pop_front().map(|old| old.sequence)
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }
}

/// A presentation target that forwards damaged pixels to a consumer.
#[derive(Debug)]
pub struct VirtualOutput {
    size: PixelSize,
    sequence: u64,
    outbox: Arc<Mutex<Outbox>>,
}

impl VirtualOutput {
    /// Default number of records kept for a slow consumer.
    pub const DEFAULT_CAPACITY: usize = 8;

    /// Creates an output of `size` queueing at most `capacity` records
    /// (at least one).
    #[must_use]
    pub fn new(size: PixelSize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            size,
            sequence: 0,
            outbox: Arc::new(Mutex::new(Outbox {
                records: VecDeque::with_capacity(capacity),
                capacity,
                dropped: 0,
                connected: true,
            })),
        }
    }

    /// The consumer side of the queue.
    #[must_use]
    pub fn receiver(&self) -> OutputReceiver {
        OutputReceiver {
            outbox: Arc::clone(&self.outbox),
        }
    }
}

impl PresentationBackend for VirtualOutput {
    fn present(&mut self, source: &PixelBuffer, region: &Region) -> Result<()> {
        if source.size() != self.size {
            return Err(Error::PresentationFailure(format!(
                "source is {:?} but the output is {:?}",
                source.size(),
                self.size
            )));
        }
        let payload = region
            .rects()
            .iter()
            .map(|&rect| {
                let rect = rect.intersect(source.bounds());
                let mut pixels = Vec::with_capacity(usize::try_from(rect.area()).unwrap_or(0));
                for y in rect.y0..rect.y1 {
                    pixels.extend_from_slice(source.span(y, rect.x0, rect.x1));
                }
                RectPayload { rect, pixels }
            })
            .filter(|part| !part.rect.is_empty())
            .collect();

        let mut outbox = self.outbox.lock();
        if !outbox.connected {
            return Err(Error::PresentationFailure(
                "virtual output disconnected".into(),
            ));
        }
        self.sequence += 1;
        let evicted = outbox.push(PresentRecord {
            sequence: self.sequence,
            region: region.clone(),
            payload,
        });
        if let Some(evicted) = evicted {
            tracing::debug!(evicted, sequence = self.sequence, "consumer behind; oldest record dropped");
        }
        Ok(())
    }

    fn wait_for_sync(&mut self, _timeout: Duration) -> bool {
        false
    }

    fn supports_page_flip(&self) -> bool {
        false
    }

    fn supports_async_vsync(&self) -> bool {
        false
    }

    fn size(&self) -> PixelSize {
        self.size
    }
}

/// Consumer handle for a [`VirtualOutput`].
#[derive(Clone, Debug)]
pub struct OutputReceiver {
    outbox: Arc<Mutex<Outbox>>,
}

impl OutputReceiver {
    /// Takes the oldest queued record.
    #[must_use]
    pub fn pop(&self) -> Option<PresentRecord> {
        self.outbox.lock().records.pop_front()
    }

    /// Takes every queued record, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<PresentRecord> {
        self.outbox.lock().records.drain(..).collect()
    }

    /// Number of queued records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outbox.lock().records.len()
    }

    /// Returns `true` if no record is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records evicted because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.outbox.lock().dropped
    }

    /// Simulates the remote end going away: every later present fails.
    pub fn disconnect(&self) {
        self.outbox.lock().connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(size: PixelSize) -> PixelBuffer {
        let mut buf = PixelBuffer::try_new(size).unwrap();
        for y in 0..i32::try_from(size.height).unwrap() {
            for x in 0..i32::try_from(size.width).unwrap() {
                let v = u8::try_from((x + y) % 256).unwrap();
                buf.set(x, y, Pixel::opaque_rgb(v, v, v));
            }
        }
        buf
    }

    #[test]
    fn records_reconstruct_the_damaged_area() {
        let size = PixelSize::new(16, 16);
        let mut output = VirtualOutput::new(size, 4);
        let receiver = output.receiver();
        let source = gradient(size);
        let mut region = Region::from_rect(PixelRect::new(0, 0, 4, 4));
        region.union_rect(PixelRect::new(8, 8, 12, 10));
        output.present(&source, &region).unwrap();

        let record = receiver.pop().unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(record.payload.len(), region.rects().len());
        let mut mirror = PixelBuffer::try_new(size).unwrap();
        record.apply(&mut mirror);
        assert_eq!(mirror.get(3, 3), source.get(3, 3));
        assert_eq!(mirror.get(11, 9), source.get(11, 9));
        assert_eq!(mirror.get(6, 6), Some(Pixel::TRANSPARENT), "not presented");
    }

    #[test]
    fn slow_consumer_loses_oldest_records() {
        let size = PixelSize::new(2, 2);
        let mut output = VirtualOutput::new(size, 2);
        let receiver = output.receiver();
        let source = PixelBuffer::try_new(size).unwrap();
        let all = Region::from_rect(source.bounds());
        for _ in 0..5 {
            output.present(&source, &all).unwrap();
        }
        assert_eq!(receiver.dropped(), 3);
        let kept: Vec<u64> = receiver.drain().iter().map(|r| r.sequence).collect();
        assert_eq!(kept, vec![4, 5], "freshest records survive");
        assert!(receiver.is_empty());
    }

    #[test]
    fn zero_capacity_still_keeps_the_latest_record() {
        let size = PixelSize::new(2, 2);
        let mut output = VirtualOutput::new(size, 0);
        let receiver = output.receiver();
        let source = PixelBuffer::try_new(size).unwrap();
        let all = Region::from_rect(source.bounds());
        output.present(&source, &all).unwrap();
        output.present(&source, &all).unwrap();
        assert_eq!(receiver.len(), 1);
        assert_eq!(receiver.dropped(), 1);
        assert_eq!(receiver.pop().map(|r| r.sequence), Some(2));
    }

    #[test]
    fn disconnected_output_rejects_presents() {
        let size = PixelSize::new(2, 2);
        let mut output = VirtualOutput::new(size, 2);
        output.receiver().disconnect();
        let source = PixelBuffer::try_new(size).unwrap();
        let err = output
            .present(&source, &Region::from_rect(source.bounds()))
            .unwrap_err();
        assert!(matches!(err, Error::PresentationFailure(_)), "got {err:?}");
    }
}
