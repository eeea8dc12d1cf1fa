// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Direct, uncomposited output used once compositing has been disabled.
//!
//! The fallback path copies the topmost visible surface straight into the
//! output buffer. Nothing is blended and nothing is cleared, so whatever was
//! last on screen stays there until a surface is drawn over it.

use lamina_core::Result;
use lamina_core::pixel::PixelBuffer;
use lamina_core::region::Region;
use lamina_core::surface::SurfaceId;
use lamina_core::zorder::{OrderedEntry, OrderedList};

use crate::blend::{BlendMode, composite};

/// The surface the fallback path draws: the topmost composited member that
/// covers at least one screen pixel.
#[must_use]
pub fn topmost(snapshot: &OrderedList) -> Option<&OrderedEntry> {
    snapshot
        .front_to_back()
        .find(|e| e.is_composited() && !e.full_region.is_empty())
}

/// Copies the topmost surface into `target`.
///
/// Returns the surface drawn and the screen region written, or `None` if no
/// surface qualifies. Fails with the surface's error if its read slot is
/// busy or being resized.
pub fn draw_topmost(
    target: &mut PixelBuffer,
    snapshot: &OrderedList,
) -> Result<Option<(SurfaceId, Region)>> {
    let Some(entry) = topmost(snapshot) else {
        return Ok(None);
    };
    let handle = entry.surface.read_buffer()?;
    let mut region = entry.full_region.clone();
    region.clip_to(target.bounds());
    composite(
        target,
        &handle,
        entry.bounds.origin(),
        &region,
        BlendMode::Copy,
    );
    entry.surface.mark_composited(handle.sequence());
    Ok(Some((entry.id(), region)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lamina_core::geometry::{PixelRect, PixelSize};
    use lamina_core::pixel::Pixel;
    use lamina_core::surface::{Surface, SurfaceDesc};
    use lamina_core::zorder::{ZOrderDirectory, ZPosition};

    use super::*;

    fn painted(id: u32, rect: PixelRect, color: Pixel) -> Arc<Surface> {
        let desc = SurfaceDesc::opaque(SurfaceId(id), rect.origin(), rect.size());
        let surface = Arc::new(Surface::new(desc).unwrap());
        let mut write = surface.acquire_write().unwrap();
        write.fill(color);
        write.commit_all();
        surface
    }

    #[test]
    fn draws_only_the_topmost_surface() {
        let dir = ZOrderDirectory::new(PixelRect::new(0, 0, 20, 20));
        let red = Pixel::opaque_rgb(255, 0, 0);
        let green = Pixel::opaque_rgb(0, 255, 0);
        dir.insert(painted(1, PixelRect::new(0, 0, 20, 20), red), ZPosition::Top)
            .unwrap();
        dir.insert(painted(2, PixelRect::new(5, 5, 10, 10), green), ZPosition::Top)
            .unwrap();

        let mut target = PixelBuffer::try_filled(PixelSize::new(20, 20), Pixel::WHITE).unwrap();
        let (id, region) = draw_topmost(&mut target, &dir.snapshot()).unwrap().unwrap();
        assert_eq!(id, SurfaceId(2));
        assert_eq!(region, Region::from_rect(PixelRect::new(5, 5, 10, 10)));
        assert_eq!(target.get(6, 6), Some(green));
        assert_eq!(target.get(1, 1), Some(Pixel::WHITE), "lower surface untouched");
    }

    #[test]
    fn hidden_and_bypass_members_are_passed_over() {
        let dir = ZOrderDirectory::new(PixelRect::new(0, 0, 20, 20));
        let red = Pixel::opaque_rgb(255, 0, 0);
        dir.insert(painted(1, PixelRect::new(0, 0, 20, 20), red), ZPosition::Top)
            .unwrap();
        dir.insert(
            painted(2, PixelRect::new(0, 0, 5, 5), Pixel::WHITE),
            ZPosition::Top,
        )
        .unwrap();
        dir.insert(
            painted(3, PixelRect::new(0, 0, 5, 5), Pixel::WHITE),
            ZPosition::Top,
        )
        .unwrap();
        dir.set_hidden(SurfaceId(2), true).unwrap();
        dir.set_bypass(SurfaceId(3), true).unwrap();

        let snapshot = dir.snapshot();
        assert_eq!(topmost(&snapshot).map(OrderedEntry::id), Some(SurfaceId(1)));
    }

    #[test]
    fn empty_directory_draws_nothing() {
        let dir = ZOrderDirectory::new(PixelRect::new(0, 0, 4, 4));
        let mut target = PixelBuffer::try_filled(PixelSize::new(4, 4), Pixel::WHITE).unwrap();
        assert!(draw_topmost(&mut target, &dir.snapshot()).unwrap().is_none());
        assert!(
            target.pixels().iter().all(|p| *p == Pixel::WHITE),
            "screen is never blanked"
        );
    }
}
