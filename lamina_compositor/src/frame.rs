// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-cycle composition state.

use std::sync::Arc;

use lamina_core::geometry::PixelRect;
use lamina_core::region::Region;
use lamina_core::surface::Surface;
use lamina_core::timing::FrameDeadline;
use lamina_core::zorder::{OrderedEntry, OrderedList};

/// A surface that had a damage session open during collection.
#[derive(Clone, Debug)]
pub struct DamagedSurface {
    /// The surface.
    pub surface: Arc<Surface>,
    /// Surface-local damage returned by `begin_session`.
    pub local_damage: Region,
    /// The same damage in screen space, clipped to the visible region.
    pub screen_damage: Region,
}

/// Everything one compositor cycle works with.
///
/// Built during collection and discarded when the cycle returns to idle.
#[derive(Debug)]
pub struct CompositionFrame {
    /// Cycle counter.
    pub frame_index: u64,
    /// Start time and presentation deadline.
    pub deadline: FrameDeadline,
    /// Z-order snapshot taken at the start of the cycle.
    pub snapshot: Arc<OrderedList>,
    /// Every member whose damage session is open.
    pub sessions: Vec<DamagedSurface>,
    /// Screen areas exposed by directory changes.
    pub exposure: Region,
    /// Union of all screen-space damage, minus bypass surfaces. This is what
    /// gets repainted and presented.
    pub damage: Region,
    /// Whether `damage` was forced to the whole screen.
    pub full_frame: bool,
    /// Surfaces skipped by this cycle, re-queued once their sessions close.
    pub retry: Vec<Arc<Surface>>,
}

impl CompositionFrame {
    /// Starts a frame for `snapshot`.
    #[must_use]
    pub fn new(frame_index: u64, deadline: FrameDeadline, snapshot: Arc<OrderedList>) -> Self {
        Self {
            frame_index,
            deadline,
            snapshot,
            sessions: Vec::new(),
            exposure: Region::new(),
            damage: Region::new(),
            full_frame: false,
            retry: Vec::new(),
        }
    }

    /// The screen rectangle of the snapshot.
    #[must_use]
    pub fn screen(&self) -> PixelRect {
        self.snapshot.screen()
    }

    /// Opens a damage session on `entry` and folds its damage into the frame.
    ///
    /// Damage of hidden and bypass surfaces is consumed but not painted.
    pub fn collect(&mut self, entry: &OrderedEntry) {
        let local_damage = entry.surface.begin_session();
        let mut screen_damage = Region::new();
        if entry.is_composited() && !local_damage.is_empty() {
            let origin = entry.bounds.origin();
            screen_damage = local_damage.translated(origin.x, origin.y);
            screen_damage.intersect(&entry.visible_region);
            self.damage.union(&screen_damage);
        }
        self.sessions.push(DamagedSurface {
            surface: Arc::clone(&entry.surface),
            local_damage,
            screen_damage,
        });
    }

    /// Adds screen-space exposure from the directory.
    pub fn expose(&mut self, exposure: Region) {
        self.damage.union(&exposure);
        self.exposure = exposure;
    }

    /// Forces the whole screen to be repainted.
    pub fn force_full(&mut self) {
        self.damage = Region::from_rect(self.screen());
        self.full_frame = true;
    }

    /// Clips the damage to the screen and removes every visible bypass
    /// surface from it.
    pub fn finish_collection(&mut self) {
        self.damage.clip_to(self.screen());
        for entry in self.snapshot.back_to_front() {
            if entry.bypass && !entry.hidden {
                self.damage.subtract(&entry.full_region);
            }
        }
    }

    /// Returns `true` if nothing needs repainting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.damage.is_empty()
    }

    /// Closes every damage session. Returns `true` if any surface received
    /// damage while its session was open.
    pub fn end_sessions(&mut self) -> bool {
        let mut more = false;
        for session in self.sessions.drain(..) {
            more |= session.surface.end_session();
        }
        more
    }
}
