// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable ordered snapshots handed to the compositor.

use std::sync::Arc;

use crate::geometry::{PixelPoint, PixelRect};
use crate::region::Region;
use crate::surface::{Surface, SurfaceId};
use crate::{Error, Result};

/// One member of an [`OrderedList`], with its computed regions.
#[derive(Clone, Debug)]
pub struct OrderedEntry {
    /// The surface itself.
    pub surface: Arc<Surface>,
    /// Screen-space bounds at snapshot time.
    pub bounds: PixelRect,
    /// The area the surface occupies on screen (`bounds` clipped to the
    /// screen).
    pub full_region: Region,
    /// The part of `full_region` not hidden behind an occluding surface above.
    pub visible_region: Region,
    /// Producer-declared opacity.
    pub opaque: bool,
    /// Whole-surface alpha in `0.0..=1.0`.
    pub alpha: f32,
    /// Excluded from blending; the client scans out directly.
    pub bypass: bool,
    /// Contributes nothing to the screen.
    pub hidden: bool,
}

impl OrderedEntry {
    /// Surface identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.surface.id()
    }

    /// Returns `true` if the surface hides everything below it.
    #[inline]
    #[must_use]
    pub fn occludes(&self) -> bool {
        occludes(self.opaque, self.alpha, self.hidden)
    }

    /// Returns `true` if the compositor paints this surface.
    #[inline]
    #[must_use]
    pub fn is_composited(&self) -> bool {
        !self.hidden && !self.bypass
    }
}

pub(crate) fn occludes(opaque: bool, alpha: f32, hidden: bool) -> bool {
    opaque && alpha >= 1.0 && !hidden
}

/// A back-to-front, visibility-clipped surface list.
///
/// Produced by [`ZOrderDirectory::recompute`](super::ZOrderDirectory::recompute)
/// and shared as `Arc<OrderedList>`. The compositor iterates it without
/// holding any directory lock.
#[derive(Clone, Debug, Default)]
pub struct OrderedList {
    pub(crate) entries: Vec<OrderedEntry>,
    pub(crate) screen: PixelRect,
    pub(crate) generation: u64,
}

impl OrderedList {
    /// Creates an empty list for a screen.
    #[must_use]
    pub fn empty(screen: PixelRect) -> Self {
        Self {
            entries: Vec::new(),
            screen,
            generation: 0,
        }
    }

    /// Entries from bottom to top.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[OrderedEntry] {
        &self.entries
    }

    /// Iterates entries from bottom to top (paint order).
    pub fn back_to_front(&self) -> impl DoubleEndedIterator<Item = &OrderedEntry> {
        self.entries.iter()
    }

    /// Iterates entries from top to bottom (hit-test order).
    pub fn front_to_back(&self) -> impl DoubleEndedIterator<Item = &OrderedEntry> {
        self.entries.iter().rev()
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The screen rectangle visibility was computed against.
    #[inline]
    #[must_use]
    pub fn screen(&self) -> PixelRect {
        self.screen
    }

    /// Publish counter of the directory that produced this list.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Looks up a member.
    #[must_use]
    pub fn get(&self, id: SurfaceId) -> Option<&OrderedEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Topmost non-hidden member covering `point`.
    #[must_use]
    pub fn surface_at(&self, point: PixelPoint) -> Option<&OrderedEntry> {
        self.front_to_back()
            .find(|e| !e.hidden && e.full_region.contains_point(point))
    }

    /// Checks that no screen pixel is claimed by two occluding members and
    /// that every visible region stays inside its full region and the screen.
    pub fn verify_partition(&self) -> Result<()> {
        let screen = Region::from_rect(self.screen);
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.full_region.contains_region(&entry.visible_region)
                || !screen.contains_region(&entry.visible_region)
            {
                return Err(Error::DirectoryInconsistent(format!(
                    "{:?} visible region escapes its bounds",
                    entry.id()
                )));
            }
            if !entry.occludes() {
                continue;
            }
            for other in self.entries[i + 1..].iter().filter(|e| e.occludes()) {
                if entry.visible_region.intersects(&other.visible_region) {
                    return Err(Error::DirectoryInconsistent(format!(
                        "{:?} and {:?} both claim {:?}",
                        entry.id(),
                        other.id(),
                        entry.visible_region.intersection(&other.visible_region).bounds()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Computes visibility for members listed bottom to top.
///
/// Walks from the top down with a running `still_available` region that
/// starts as the whole screen: each member sees `still_available ∩ full`, and
/// occluding members remove what they see from `still_available`.
pub(crate) fn compute_visibility(entries: &mut [OrderedEntry], screen: PixelRect) {
    let mut still_available = Region::from_rect(screen);
    for entry in entries.iter_mut().rev() {
        entry.full_region = Region::from_rect(entry.bounds.intersect(screen));
        if entry.hidden {
            entry.visible_region = Region::new();
            continue;
        }
        entry.visible_region = still_available.intersection(&entry.full_region);
        if entry.occludes() {
            still_available.subtract(&entry.visible_region);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelSize;
    use crate::surface::SurfaceDesc;

    fn entry(id: u32, rect: PixelRect, opaque: bool, alpha: f32) -> OrderedEntry {
        let desc = SurfaceDesc {
            id: SurfaceId(id),
            origin: rect.origin(),
            size: rect.size(),
            opaque,
        };
        OrderedEntry {
            surface: Arc::new(Surface::new(desc).unwrap()),
            bounds: rect,
            full_region: Region::new(),
            visible_region: Region::new(),
            opaque,
            alpha,
            bypass: false,
            hidden: false,
        }
    }

    fn screen() -> PixelRect {
        PixelRect::from_size(PixelSize::new(200, 200))
    }

    #[test]
    fn translucent_member_does_not_occlude() {
        let mut entries = vec![
            entry(1, PixelRect::new(0, 0, 100, 100), true, 1.0),
            entry(2, PixelRect::new(50, 50, 100, 100), true, 0.5),
        ];
        compute_visibility(&mut entries, screen());
        assert_eq!(entries[0].visible_region.area(), 10_000);
        assert_eq!(entries[1].visible_region.area(), 2_500);
    }

    #[test]
    fn members_are_clipped_to_screen() {
        let mut entries = vec![entry(1, PixelRect::new(150, 150, 250, 250), true, 1.0)];
        compute_visibility(&mut entries, screen());
        assert_eq!(
            entries[0].full_region,
            Region::from_rect(PixelRect::new(150, 150, 200, 200))
        );
    }

    #[test]
    fn verify_rejects_double_claim() {
        let mut list = OrderedList::empty(screen());
        let mut a = entry(1, PixelRect::new(0, 0, 50, 50), true, 1.0);
        let mut b = entry(2, PixelRect::new(25, 25, 75, 75), true, 1.0);
        // Hand-built overlap that compute_visibility would never produce.
        for e in [&mut a, &mut b] {
            e.full_region = Region::from_rect(e.bounds);
            e.visible_region = e.full_region.clone();
        }
        list.entries = vec![a, b];
        let err = list.verify_partition().unwrap_err();
        assert!(matches!(err, Error::DirectoryInconsistent(_)), "got {err:?}");

        compute_visibility(&mut list.entries, list.screen);
        assert!(list.verify_partition().is_ok(), "recomputed list is a partition");
    }

    #[test]
    fn surface_at_skips_hidden() {
        let mut list = OrderedList::empty(screen());
        let mut top = entry(2, PixelRect::new(0, 0, 50, 50), true, 1.0);
        top.hidden = true;
        list.entries = vec![entry(1, PixelRect::new(0, 0, 100, 100), true, 1.0), top];
        compute_visibility(&mut list.entries, list.screen);
        let hit = list.surface_at(PixelPoint::new(10, 10)).map(OrderedEntry::id);
        assert_eq!(hit, Some(SurfaceId(1)));
        assert!(list.surface_at(PixelPoint::new(150, 150)).is_none(), "empty screen area");
    }
}
