// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Depth-one handoff between a writer and a reader.
//!
//! [`FlipIndex`] is the bookkeeping half of a two-slot double buffer: which
//! slot the writer fills, which slot the reader consumes, and a publish
//! sequence stamped on each slot. The storage itself lives with the owner.
//! [`Surface`](crate::surface::Surface) pairs it with two pixel buffers and
//! [`DamageTracker`](crate::damage::DamageTracker) pairs it with two regions,
//! so both double buffers follow the same protocol:
//!
//! ```text
//!   writer fills slot[write_index]
//!   flip(): sequence[write_index] = ++published; write_index ^= 1
//!   reader consumes slot[read_index()] == slot[1 - write_index]
//! ```
//!
//! Sequences come from one monotonic counter, so the read slot always carries
//! the most recent publish number and sequences from different slots compare
//! meaningfully.

/// Slot bookkeeping for a two-slot double buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlipIndex {
    write_index: usize,
    sequence: [u64; 2],
    published: u64,
}

impl FlipIndex {
    /// Creates an index with the writer on slot 0 and no publishes.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            write_index: 0,
            sequence: [0; 2],
            published: 0,
        }
    }

    /// Slot the writer currently targets.
    #[inline]
    #[must_use]
    pub const fn write_index(&self) -> usize {
        self.write_index
    }

    /// Slot the reader currently consumes. Never equal to
    /// [`write_index`](Self::write_index).
    #[inline]
    #[must_use]
    pub const fn read_index(&self) -> usize {
        1 - self.write_index
    }

    /// Publish sequence stamped on `slot`.
    #[inline]
    #[must_use]
    pub const fn sequence(&self, slot: usize) -> u64 {
        self.sequence[slot]
    }

    /// Publish sequence of the read slot.
    #[inline]
    #[must_use]
    pub const fn read_sequence(&self) -> u64 {
        self.sequence[self.read_index()]
    }

    /// Total number of flips since creation or the last reset.
    #[inline]
    #[must_use]
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Publishes the write slot and hands the writer the other one.
    ///
    /// Returns the sequence stamped on the published slot.
    pub fn flip(&mut self) -> u64 {
        self.published += 1;
        self.sequence[self.write_index] = self.published;
        self.write_index = self.read_index();
        self.published
    }

    /// Returns to the initial state: writer on slot 0, both sequences 0.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write_never_alias() {
        let mut flip = FlipIndex::new();
        for _ in 0..5 {
            assert_ne!(flip.read_index(), flip.write_index());
            flip.flip();
        }
    }

    #[test]
    fn flip_stamps_published_slot() {
        let mut flip = FlipIndex::new();
        assert_eq!(flip.write_index(), 0);
        assert_eq!(flip.flip(), 1);
        assert_eq!(flip.read_index(), 0, "slot 0 was just published");
        assert_eq!(flip.read_sequence(), 1);
        assert_eq!(flip.flip(), 2);
        assert_eq!(flip.read_index(), 1);
        assert_eq!(flip.sequence(0), 1);
        assert_eq!(flip.read_sequence(), 2);
    }

    #[test]
    fn reset_clears_sequences() {
        let mut flip = FlipIndex::new();
        flip.flip();
        flip.flip();
        flip.flip();
        flip.reset();
        assert_eq!(flip, FlipIndex::new());
        assert_eq!(flip.sequence(0), 0);
        assert_eq!(flip.sequence(1), 0);
    }
}
