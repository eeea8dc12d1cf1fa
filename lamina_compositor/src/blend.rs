// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software compositing of surface buffers into the back buffer.

use lamina_core::geometry::{PixelPoint, PixelRect};
use lamina_core::pixel::{Pixel, PixelBuffer, alpha_to_u8};
use lamina_core::region::Region;

/// How a surface's pixels combine with what is already in the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendMode {
    /// Replace the destination.
    Copy,
    /// Premultiplied source-over, with every source pixel first scaled by
    /// the given whole-surface alpha.
    Over(f32),
}

impl BlendMode {
    /// `Copy` for occluding surfaces, `Over(alpha)` otherwise.
    #[must_use]
    pub fn for_surface(opaque: bool, alpha: f32) -> Self {
        if opaque && alpha >= 1.0 {
            Self::Copy
        } else {
            Self::Over(alpha)
        }
    }
}

/// Composites `source` (placed with its top-left corner at `origin` in
/// screen space) into `target`, touching only pixels inside `clip`.
///
/// `clip` is in screen space and is further clipped to both buffers.
pub fn composite(
    target: &mut PixelBuffer,
    source: &PixelBuffer,
    origin: PixelPoint,
    clip: &Region,
    mode: BlendMode,
) {
    let placed = source.bounds().translate(origin.x, origin.y);
    let visible = placed.intersect(target.bounds());
    for rect in clip.rects() {
        let dst = rect.intersect(visible);
        if dst.is_empty() {
            continue;
        }
        match mode {
            BlendMode::Copy => {
                let src = dst.translate(-origin.x, -origin.y);
                target.copy_rect_from(source, src, dst.origin());
            }
            BlendMode::Over(alpha) => over_rect(target, source, origin, dst, alpha_to_u8(alpha)),
        }
    }
}

fn over_rect(
    target: &mut PixelBuffer,
    source: &PixelBuffer,
    origin: PixelPoint,
    dst: PixelRect,
    alpha: u8,
) {
    if alpha == 0 {
        return;
    }
    for y in dst.y0..dst.y1 {
        let src = source.span(y - origin.y, dst.x0 - origin.x, dst.x1 - origin.x);
        let out = target.span_mut(y, dst.x0, dst.x1);
        for (d, s) in out.iter_mut().zip(src) {
            *d = s.with_alpha(alpha).over(*d);
        }
    }
}

/// Fills `region` of `target` with `background`.
pub fn clear(target: &mut PixelBuffer, region: &Region, background: Pixel) {
    target.fill_region(region, background);
}

#[cfg(test)]
mod tests {
    use lamina_core::geometry::PixelSize;

    use super::*;

    fn filled(w: u32, h: u32, pixel: Pixel) -> PixelBuffer {
        PixelBuffer::try_filled(PixelSize::new(w, h), pixel).unwrap()
    }

    #[test]
    fn copy_respects_clip_and_origin() {
        let mut target = filled(10, 10, Pixel::BLACK);
        let source = filled(4, 4, Pixel::WHITE);
        let clip = Region::from_rect(PixelRect::new(0, 0, 7, 7));
        composite(&mut target, &source, PixelPoint::new(5, 5), &clip, BlendMode::Copy);

        assert_eq!(target.get(5, 5), Some(Pixel::WHITE));
        assert_eq!(target.get(6, 6), Some(Pixel::WHITE));
        assert_eq!(target.get(7, 7), Some(Pixel::BLACK), "outside clip");
        assert_eq!(target.get(4, 4), Some(Pixel::BLACK), "outside source");
    }

    #[test]
    fn half_alpha_blends_evenly() {
        let mut target = filled(2, 2, Pixel::opaque_rgb(0, 0, 200));
        let source = filled(2, 2, Pixel::opaque_rgb(200, 0, 0));
        let clip = Region::from_rect(target.bounds());
        composite(&mut target, &source, PixelPoint::ORIGIN, &clip, BlendMode::Over(0.5));

        let p = target.get(1, 1).unwrap();
        assert_eq!(p.a, 255);
        assert!(p.r.abs_diff(100) <= 1, "red {p:?}");
        assert!(p.b.abs_diff(100) <= 1, "blue {p:?}");
    }

    #[test]
    fn zero_alpha_leaves_target() {
        let mut target = filled(2, 2, Pixel::BLACK);
        let source = filled(2, 2, Pixel::WHITE);
        let clip = Region::from_rect(target.bounds());
        composite(&mut target, &source, PixelPoint::ORIGIN, &clip, BlendMode::Over(0.0));
        assert!(target.pixels().iter().all(|p| *p == Pixel::BLACK), "untouched");
    }

    #[test]
    fn mode_follows_occlusion() {
        assert_eq!(BlendMode::for_surface(true, 1.0), BlendMode::Copy);
        assert_eq!(BlendMode::for_surface(true, 0.5), BlendMode::Over(0.5));
        assert_eq!(BlendMode::for_surface(false, 1.0), BlendMode::Over(1.0));
    }
}
