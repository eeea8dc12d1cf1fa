// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry.
//!
//! Compositing works on whole pixels, so surfaces, damage, and visibility are
//! all expressed with integer rectangles. Conversions to and from
//! [`kurbo`] types are provided for callers that lay out windows with
//! floating-point geometry; conversion into pixels always rounds outward so
//! that no partially covered pixel is lost.

use core::fmt;

/// A point in pixel coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl PixelPoint {
    /// The origin.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the pixel containing a floating-point position.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "screen coordinates are far inside the i32 range"
    )]
    pub fn from_kurbo(point: kurbo::Point) -> Self {
        Self {
            x: point.x.floor() as i32,
            y: point.y.floor() as i32,
        }
    }
}

impl fmt::Debug for PixelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A width and height in pixels.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Debug for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A half-open pixel rectangle `[x0, x1) × [y0, y1)`.
///
/// A rectangle with `x1 <= x0` or `y1 <= y0` is empty. Empty rectangles
/// compare by their raw coordinates; use [`is_empty`](Self::is_empty) rather
/// than equality to test for emptiness.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// Left edge (inclusive).
    pub x0: i32,
    /// Top edge (inclusive).
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl PixelRect {
    /// The canonical empty rectangle.
    pub const EMPTY: Self = Self {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    /// Creates a rectangle from its edges.
    #[inline]
    #[must_use]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a rectangle from an origin and a size.
    ///
    /// The far edges saturate at `i32::MAX`; use
    /// [`checked_from_origin_size`](Self::checked_from_origin_size) to detect
    /// that.
    #[inline]
    #[must_use]
    pub const fn from_origin_size(origin: PixelPoint, size: PixelSize) -> Self {
        Self {
            x0: origin.x,
            y0: origin.y,
            x1: origin.x.saturating_add_unsigned(size.width),
            y1: origin.y.saturating_add_unsigned(size.height),
        }
    }

    /// Like [`from_origin_size`](Self::from_origin_size), or `None` if the
    /// far edges do not fit in `i32`.
    #[inline]
    #[must_use]
    pub const fn checked_from_origin_size(origin: PixelPoint, size: PixelSize) -> Option<Self> {
        let Some(x1) = origin.x.checked_add_unsigned(size.width) else {
            return None;
        };
        let Some(y1) = origin.y.checked_add_unsigned(size.height) else {
            return None;
        };
        Some(Self {
            x0: origin.x,
            y0: origin.y,
            x1,
            y1,
        })
    }

    /// Creates a rectangle at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(size: PixelSize) -> Self {
        Self::from_origin_size(PixelPoint::ORIGIN, size)
    }

    /// Top-left corner.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> PixelPoint {
        PixelPoint::new(self.x0, self.y0)
    }

    /// Width in pixels (zero when empty).
    #[inline]
    #[must_use]
    pub const fn width(self) -> u32 {
        if self.x1 > self.x0 {
            self.x1.abs_diff(self.x0)
        } else {
            0
        }
    }

    /// Height in pixels (zero when empty).
    #[inline]
    #[must_use]
    pub const fn height(self) -> u32 {
        if self.y1 > self.y0 {
            self.y1.abs_diff(self.y0)
        } else {
            0
        }
    }

    /// Size in pixels.
    #[inline]
    #[must_use]
    pub const fn size(self) -> PixelSize {
        PixelSize::new(self.width(), self.height())
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u64 {
        self.size().area()
    }

    /// Intersection of two rectangles (possibly empty).
    #[inline]
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Returns `true` if the rectangles share at least one pixel.
    #[inline]
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Returns `true` if the pixel at `point` is inside the rectangle.
    #[inline]
    #[must_use]
    pub const fn contains(self, point: PixelPoint) -> bool {
        point.x >= self.x0 && point.x < self.x1 && point.y >= self.y0 && point.y < self.y1
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    ///
    /// Every rectangle contains the empty rectangle.
    #[inline]
    #[must_use]
    pub const fn contains_rect(self, other: Self) -> bool {
        other.is_empty()
            || (other.x0 >= self.x0
                && other.y0 >= self.y0
                && other.x1 <= self.x1
                && other.y1 <= self.y1)
    }

    /// Smallest rectangle containing both inputs. Empty inputs are ignored.
    #[must_use]
    pub fn union_bounds(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Offsets the rectangle by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn translate(self, dx: i32, dy: i32) -> Self {
        Self {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Converts to a floating-point [`kurbo::Rect`].
    #[must_use]
    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Converts a floating-point rectangle to the smallest pixel rectangle
    /// containing it.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "screen coordinates are far inside the i32 range"
    )]
    pub fn from_kurbo(rect: kurbo::Rect) -> Self {
        let rect = rect.abs().expand();
        Self {
            x0: rect.x0 as i32,
            y0: rect.y0 as i32,
            x1: rect.x1 as i32,
            y1: rect.y1 as i32,
        }
    }
}

impl fmt::Debug for PixelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[({}, {})-({}, {})]", self.x0, self.y0, self.x1, self.y1)
    }
}
