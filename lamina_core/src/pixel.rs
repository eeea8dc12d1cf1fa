// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Premultiplied pixels and fallible pixel buffers.

use core::fmt;

use crate::geometry::{PixelPoint, PixelRect, PixelSize};
use crate::region::Region;
use crate::{Error, Result};

/// A premultiplied-alpha BGRA8 pixel.
///
/// The channel order matches the common little-endian `XRGB8888` /
/// `ARGB8888` framebuffer layout, so a `&[Pixel]` can be handed to a scanout
/// buffer as bytes without conversion.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Pixel {
    /// Blue, premultiplied.
    pub b: u8,
    /// Green, premultiplied.
    pub g: u8,
    /// Red, premultiplied.
    pub r: u8,
    /// Alpha.
    pub a: u8,
}

impl Pixel {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::opaque_rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::opaque_rgb(255, 255, 255);

    /// Creates a pixel from already-premultiplied channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }

    /// Creates an opaque pixel.
    #[inline]
    #[must_use]
    pub const fn opaque_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Creates a pixel from straight (non-premultiplied) RGBA.
    #[must_use]
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(mul_div255(r, a), mul_div255(g, a), mul_div255(b, a), a)
    }

    /// Returns `true` if the pixel is fully opaque.
    #[inline]
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }

    /// Multiplies every channel by `alpha / 255`.
    #[must_use]
    pub fn with_alpha(self, alpha: u8) -> Self {
        if alpha == 255 {
            return self;
        }
        Self {
            b: mul_div255(self.b, alpha),
            g: mul_div255(self.g, alpha),
            r: mul_div255(self.r, alpha),
            a: mul_div255(self.a, alpha),
        }
    }

    /// Multiplies every channel by an opacity in `0.0..=1.0`.
    #[must_use]
    pub fn scale(self, opacity: f32) -> Self {
        self.with_alpha(alpha_to_u8(opacity))
    }

    /// Premultiplied source-over: `self + dst * (1 - self.a)`.
    #[must_use]
    pub fn over(self, dst: Self) -> Self {
        match self.a {
            255 => self,
            0 => Self {
                b: self.b.saturating_add(dst.b),
                g: self.g.saturating_add(dst.g),
                r: self.r.saturating_add(dst.r),
                a: dst.a,
            },
            a => {
                let inv = 255 - a;
                Self {
                    b: self.b.saturating_add(mul_div255(dst.b, inv)),
                    g: self.g.saturating_add(mul_div255(dst.g, inv)),
                    r: self.r.saturating_add(mul_div255(dst.r, inv)),
                    a: a.saturating_add(mul_div255(dst.a, inv)),
                }
            }
        }
    }
}

impl fmt::Debug for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r, self.g, self.b, self.a
        )
    }
}

/// Converts an opacity in `0.0..=1.0` to an 8-bit alpha.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to 0..=255 before the cast"
)]
pub fn alpha_to_u8(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// `a * b / 255`, rounded to nearest.
#[inline]
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "the product of two u8 values divided by 255 fits in u8"
)]
pub const fn mul_div255(a: u8, b: u8) -> u8 {
    let t = a as u16 * b as u16 + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// A `width × height` block of premultiplied pixels in row-major order.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    size: PixelSize,
    data: Vec<Pixel>,
}

impl PixelBuffer {
    /// Allocates a buffer filled with [`Pixel::TRANSPARENT`].
    ///
    /// Reports [`Error::OutOfMemory`] instead of aborting when the allocation
    /// cannot be satisfied.
    pub fn try_new(size: PixelSize) -> Result<Self> {
        Self::try_filled(size, Pixel::TRANSPARENT)
    }

    /// Allocates a buffer filled with `pixel`.
    pub fn try_filled(size: PixelSize, pixel: Pixel) -> Result<Self> {
        let oom = Error::OutOfMemory {
            width: size.width,
            height: size.height,
        };
        let len = usize::try_from(size.area()).map_err(|_| oom.clone())?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| oom)?;
        data.resize(len, pixel);
        Ok(Self { size, data })
    }

    /// Buffer dimensions.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> PixelSize {
        self.size
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.size.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.size.height
    }

    /// The buffer's extent in its own coordinate space.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> PixelRect {
        PixelRect::from_size(self.size)
    }

    /// All pixels in row-major order.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.data
    }

    /// All pixels in row-major order, mutably.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.data
    }

    /// The raw bytes, for handing to a scanout buffer.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the buffer.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<Pixel> {
        self.bounds()
            .contains(PixelPoint::new(x, y))
            .then(|| self.data[self.offset(x, y)])
    }

    /// Sets the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: i32, y: i32, pixel: Pixel) {
        if self.bounds().contains(PixelPoint::new(x, y)) {
            let i = self.offset(x, y);
            self.data[i] = pixel;
        }
    }

    /// A horizontal run `[x0, x1)` of row `y`. The run must lie inside the
    /// buffer.
    #[must_use]
    pub fn span(&self, y: i32, x0: i32, x1: i32) -> &[Pixel] {
        let start = self.offset(x0, y);
        &self.data[start..start + (x1 - x0) as usize]
    }

    /// Mutable horizontal run `[x0, x1)` of row `y`. The run must lie inside
    /// the buffer.
    pub fn span_mut(&mut self, y: i32, x0: i32, x1: i32) -> &mut [Pixel] {
        let start = self.offset(x0, y);
        &mut self.data[start..start + (x1 - x0) as usize]
    }

    /// Fills the whole buffer.
    pub fn fill(&mut self, pixel: Pixel) {
        self.data.fill(pixel);
    }

    /// Fills `rect`, clipped to the buffer.
    pub fn fill_rect(&mut self, rect: PixelRect, pixel: Pixel) {
        let rect = rect.intersect(self.bounds());
        if rect.is_empty() {
            return;
        }
        for y in rect.y0..rect.y1 {
            self.span_mut(y, rect.x0, rect.x1).fill(pixel);
        }
    }

    /// Fills every rectangle of `region`, clipped to the buffer.
    pub fn fill_region(&mut self, region: &Region, pixel: Pixel) {
        for rect in region.rects() {
            self.fill_rect(*rect, pixel);
        }
    }

    /// Copies `src_rect` of `src` so that its top-left corner lands on
    /// `dst_origin`. Both sides are clipped.
    pub fn copy_rect_from(&mut self, src: &Self, src_rect: PixelRect, dst_origin: PixelPoint) {
        let dx = dst_origin.x - src_rect.x0;
        let dy = dst_origin.y - src_rect.y0;
        let dst = src_rect
            .intersect(src.bounds())
            .translate(dx, dy)
            .intersect(self.bounds());
        if dst.is_empty() {
            return;
        }
        for y in dst.y0..dst.y1 {
            let from = src.span(y - dy, dst.x0 - dx, dst.x1 - dx);
            self.span_mut(y, dst.x0, dst.x1).copy_from_slice(from);
        }
    }

    /// Copies every rectangle of `region` from `src` at the same coordinates.
    pub fn copy_region_from(&mut self, src: &Self, region: &Region) {
        for rect in region.rects() {
            self.copy_rect_from(src, *rect, rect.origin());
        }
    }

    #[inline]
    fn offset(&self, x: i32, y: i32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
