// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Current/pending damage split.
//!
//! A [`DamageTracker`] accumulates invalidated regions and hands them to the
//! compositor one session at a time. While a session is open the compositor
//! owns `current`; invalidations raised in the meantime land in `pending` and
//! are returned by the next session, so damage is never lost and never seen
//! half-composited.
//!
//! The two regions are indexed by a [`FlipIndex`], the same protocol the
//! surface uses for its pixel slots:
//!
//! | Call | Effect |
//! |---|---|
//! | [`invalidate`](DamageTracker::invalidate) | merge into the write side (`pending` while a session is open) |
//! | [`begin_session`](DamageTracker::begin_session) | flip: the accumulated region becomes `current` |
//! | [`end_session`](DamageTracker::end_session) | clear `current`; report whether `pending` needs another wake |

use crate::handoff::FlipIndex;
use crate::region::Region;

/// Rectangle count above which accumulated damage collapses to its bounds.
pub const MAX_DAMAGE_RECTS: usize = 64;

/// Double-buffered damage region.
#[derive(Clone, Debug, Default)]
pub struct DamageTracker {
    regions: [Region; 2],
    flip: FlipIndex,
    in_use: bool,
}

impl DamageTracker {
    /// Creates a tracker with no damage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [Region::new(), Region::new()],
            flip: FlipIndex::new(),
            in_use: false,
        }
    }

    /// Merges `region` into the accumulating side.
    ///
    /// Outside a session this is the region the next
    /// [`begin_session`](Self::begin_session) returns; during a session it is
    /// `pending`.
    pub fn invalidate(&mut self, region: &Region) {
        if region.is_empty() {
            return;
        }
        let side = &mut self.regions[self.flip.write_index()];
        side.union(region);
        side.simplify_to(MAX_DAMAGE_RECTS);
    }

    /// Replaces the accumulated damage with `region`.
    ///
    /// Used on resize: older partial damage refers to the discarded buffers,
    /// so the new full area is recorded exactly once instead of being merged.
    /// A session in progress keeps its `current` region.
    pub fn replace(&mut self, region: Region) {
        self.regions[self.flip.write_index()] = region;
    }

    /// Starts a session and returns its `current` region.
    ///
    /// Calling this again before [`end_session`](Self::end_session) returns
    /// the same region.
    pub fn begin_session(&mut self) -> Region {
        if self.in_use {
            return self.regions[self.flip.read_index()].clone();
        }
        if self.regions[self.flip.write_index()].is_empty() {
            return Region::new();
        }
        self.flip.flip();
        self.in_use = true;
        self.regions[self.flip.read_index()].clone()
    }

    /// Ends the session, discarding `current`.
    ///
    /// Returns `true` when damage arrived during the session, which means the
    /// compositor should wake again instead of waiting for the next timeout.
    pub fn end_session(&mut self) -> bool {
        if self.in_use {
            self.regions[self.flip.read_index()].clear();
            self.in_use = false;
        }
        !self.regions[self.flip.write_index()].is_empty()
    }

    /// Returns `true` while a non-empty session is being consumed.
    #[inline]
    #[must_use]
    pub const fn is_in_session(&self) -> bool {
        self.in_use
    }

    /// Returns `true` if any damage is pending or in the open session.
    #[must_use]
    pub fn has_damage(&self) -> bool {
        self.regions.iter().any(|r| !r.is_empty())
    }

    /// Damage accumulated for the next session.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &Region {
        &self.regions[self.flip.write_index()]
    }

    /// Damage being consumed by the open session (empty outside a session).
    #[must_use]
    pub fn current(&self) -> &Region {
        &self.regions[self.flip.read_index()]
    }

    /// Number of sessions started since creation.
    #[inline]
    #[must_use]
    pub const fn sessions(&self) -> u64 {
        self.flip.published()
    }

    /// Drops all damage and closes any session.
    pub fn clear(&mut self) {
        for region in &mut self.regions {
            region.clear();
        }
        self.in_use = false;
    }
}
