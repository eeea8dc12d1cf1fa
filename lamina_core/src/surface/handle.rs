// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producer and compositor views of a surface slot.

use core::fmt;
use core::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::Surface;
use crate::geometry::{PixelPoint, PixelRect};
use crate::pixel::PixelBuffer;
use crate::region::Region;

/// Exclusive access to a surface's write slot.
///
/// Dropping the handle without committing discards nothing and publishes
/// nothing; the next [`acquire_write`](Surface::acquire_write) returns the
/// same slot with whatever was drawn.
pub struct WriteHandle<'a> {
    surface: &'a Surface,
    slot: usize,
    guard: RwLockWriteGuard<'a, PixelBuffer>,
}

impl<'a> WriteHandle<'a> {
    pub(super) fn new(
        surface: &'a Surface,
        slot: usize,
        guard: RwLockWriteGuard<'a, PixelBuffer>,
    ) -> Self {
        Self {
            surface,
            slot,
            guard,
        }
    }

    /// Slot index being written.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Publishes the slot with `dirty` (surface-local) as its damage.
    ///
    /// Increments the slot's sequence, flips the write index, merges `dirty`
    /// clamped to the surface bounds into the damage tracker, and wakes the
    /// compositor. Returns the published sequence.
    pub fn commit(self, dirty: &Region) -> u64 {
        let Self {
            surface,
            slot,
            guard,
        } = self;
        // The slot lock is released under the metadata lock,
        // so a reader can never observe the new read index while the old
        // writer still holds the slot.
        surface.publish_with(slot, dirty, guard)
    }

    /// Publishes the slot with `rect` as its damage.
    pub fn commit_rect(self, rect: PixelRect) -> u64 {
        self.commit(&Region::from_rect(rect))
    }

    /// Publishes the slot with the whole surface damaged.
    pub fn commit_all(self) -> u64 {
        let bounds = self.guard.bounds();
        self.commit_rect(bounds)
    }
}

impl Deref for WriteHandle<'_> {
    type Target = PixelBuffer;

    fn deref(&self) -> &PixelBuffer {
        &self.guard
    }
}

impl DerefMut for WriteHandle<'_> {
    fn deref_mut(&mut self) -> &mut PixelBuffer {
        &mut self.guard
    }
}

impl fmt::Debug for WriteHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("surface", &self.surface.id())
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Shared access to a surface's read slot.
///
/// The slot is fixed for the handle's lifetime and the producer cannot
/// acquire it for writing until the handle is dropped.
pub struct ReadHandle<'a> {
    surface: &'a Surface,
    slot: usize,
    sequence: u64,
    origin: PixelPoint,
    guard: RwLockReadGuard<'a, PixelBuffer>,
}

impl<'a> ReadHandle<'a> {
    pub(super) fn new(
        surface: &'a Surface,
        slot: usize,
        sequence: u64,
        origin: PixelPoint,
        guard: RwLockReadGuard<'a, PixelBuffer>,
    ) -> Self {
        Self {
            surface,
            slot,
            sequence,
            origin,
            guard,
        }
    }

    /// Slot index being read.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Sequence captured when the handle was acquired.
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Screen-space origin captured when the handle was acquired.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> PixelPoint {
        self.origin
    }

    /// Re-checks that the slot's sequence is unchanged since acquisition.
    ///
    /// A mismatch means the slot was republished underneath the reader and
    /// its contents must not be trusted.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.surface.meta.lock().flip.sequence(self.slot) == self.sequence
    }

    /// Returns `true` if no newer buffer has been committed since
    /// acquisition.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.surface.meta.lock().flip.read_index() == self.slot
    }
}

impl Deref for ReadHandle<'_> {
    type Target = PixelBuffer;

    fn deref(&self) -> &PixelBuffer {
        &self.guard
    }
}

impl fmt::Debug for ReadHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("surface", &self.surface.id())
            .field("slot", &self.slot)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
