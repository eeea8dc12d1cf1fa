// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disjoint-rectangle regions.
//!
//! A [`Region`] is a set of pixels stored as pairwise-disjoint, non-empty
//! [`PixelRect`]s. It backs every area computation in the compositor:
//! visibility (`still_available -= visible`), damage accumulation, and the
//! total damage passed to a backend.
//!
//! Two regions are equal when they cover the same pixels, regardless of how
//! the area is split into rectangles. Operations keep the rectangle list
//! small by merging neighbours that share a full edge, but they never
//! promise a canonical decomposition.

use core::fmt;

use crate::geometry::{PixelPoint, PixelRect};

/// A set of pixels stored as disjoint rectangles.
#[derive(Clone, Default)]
pub struct Region {
    rects: Vec<PixelRect>,
}

impl Region {
    /// Creates an empty region.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates an empty region. Alias of [`new`](Self::new).
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self::new()
    }

    /// Creates a region covering a single rectangle.
    #[must_use]
    pub fn from_rect(rect: PixelRect) -> Self {
        let mut rects = Vec::new();
        if !rect.is_empty() {
            rects.push(rect);
        }
        Self { rects }
    }

    /// Returns `true` if the region covers no pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The disjoint rectangles making up the region.
    #[inline]
    #[must_use]
    pub fn rects(&self) -> &[PixelRect] {
        &self.rects
    }

    /// Number of pixels covered.
    #[must_use]
    pub fn area(&self) -> u64 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    /// Smallest rectangle containing the whole region.
    #[must_use]
    pub fn bounds(&self) -> PixelRect {
        self.rects
            .iter()
            .fold(PixelRect::EMPTY, |acc, r| acc.union_bounds(*r))
    }

    /// Returns `true` if the pixel at `point` is in the region.
    #[must_use]
    pub fn contains_point(&self, point: PixelPoint) -> bool {
        self.rects.iter().any(|r| r.contains(point))
    }

    /// Returns `true` if every pixel of `rect` is in the region.
    #[must_use]
    pub fn contains_rect(&self, rect: PixelRect) -> bool {
        let mut rest = Self::from_rect(rect);
        rest.subtract(self);
        rest.is_empty()
    }

    /// Returns `true` if every pixel of `other` is in the region.
    #[must_use]
    pub fn contains_region(&self, other: &Self) -> bool {
        let mut rest = other.clone();
        rest.subtract(self);
        rest.is_empty()
    }

    /// Returns `true` if both regions cover the same pixels.
    #[must_use]
    pub fn coverage_eq(&self, other: &Self) -> bool {
        self.area() == other.area() && self.contains_region(other)
    }

    /// Returns `true` if the regions share at least one pixel.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.rects
            .iter()
            .any(|a| other.rects.iter().any(|b| a.intersects(*b)))
    }

    /// Adds `rect` to the region.
    pub fn union_rect(&mut self, rect: PixelRect) {
        if rect.is_empty() {
            return;
        }
        // Only the parts of `rect` not already covered are added, which keeps
        // the list disjoint.
        let mut pieces = vec![rect];
        for existing in &self.rects {
            if pieces.is_empty() {
                return;
            }
            let mut next = Vec::with_capacity(pieces.len());
            for piece in pieces {
                split_off(piece, *existing, &mut next);
            }
            pieces = next;
        }
        if pieces.is_empty() {
            return;
        }
        self.rects.extend(pieces);
        self.coalesce();
    }

    /// Adds every pixel of `other` to the region.
    pub fn union(&mut self, other: &Self) {
        if self.is_empty() {
            self.rects.clone_from(&other.rects);
            return;
        }
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    /// Removes `rect` from the region.
    pub fn subtract_rect(&mut self, rect: PixelRect) {
        if rect.is_empty() || !self.rects.iter().any(|r| r.intersects(rect)) {
            return;
        }
        let mut out = Vec::with_capacity(self.rects.len() + 3);
        for r in self.rects.drain(..) {
            split_off(r, rect, &mut out);
        }
        self.rects = out;
        self.coalesce();
    }

    /// Removes every pixel of `other` from the region.
    pub fn subtract(&mut self, other: &Self) {
        for rect in &other.rects {
            if self.is_empty() {
                return;
            }
            self.subtract_rect(*rect);
        }
    }

    /// Restricts the region to `rect`.
    pub fn intersect_rect(&mut self, rect: PixelRect) {
        self.rects.retain_mut(|r| {
            *r = r.intersect(rect);
            !r.is_empty()
        });
    }

    /// Restricts the region to the pixels it shares with `other`.
    pub fn intersect(&mut self, other: &Self) {
        let mut out = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                let i = a.intersect(*b);
                if !i.is_empty() {
                    out.push(i);
                }
            }
        }
        self.rects = out;
        self.coalesce();
    }

    /// Returns the intersection of two regions without modifying either.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.intersect(other);
        out
    }

    /// Offsets every rectangle by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.translate(dx, dy);
        }
    }

    /// Returns a translated copy.
    #[must_use]
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        let mut out = self.clone();
        out.translate(dx, dy);
        out
    }

    /// Restricts the region to `bounds`. Alias of
    /// [`intersect_rect`](Self::intersect_rect).
    pub fn clip_to(&mut self, bounds: PixelRect) {
        self.intersect_rect(bounds);
    }

    /// Replaces the region by its bounding box when it holds more than
    /// `max_rects` rectangles.
    ///
    /// Coverage only ever grows, so this is suitable for damage but must not
    /// be applied to visibility.
    pub fn simplify_to(&mut self, max_rects: usize) {
        if self.rects.len() > max_rects {
            let bounds = self.bounds();
            self.rects.clear();
            self.rects.push(bounds);
        }
    }

    /// Removes every rectangle.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Takes the contents, leaving the region empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }

    // Merges rectangles that share a full edge until no pair does.
    fn coalesce(&mut self) {
        let mut merged = true;
        while merged {
            merged = false;
            'outer: for i in 0..self.rects.len() {
                for j in (i + 1)..self.rects.len() {
                    if let Some(joined) = join(self.rects[i], self.rects[j]) {
                        self.rects[i] = joined;
                        self.rects.swap_remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
    }
}

/// Pushes the parts of `rect` outside `hole` onto `out`.
fn split_off(rect: PixelRect, hole: PixelRect, out: &mut Vec<PixelRect>) {
    let i = rect.intersect(hole);
    if i.is_empty() {
        out.push(rect);
        return;
    }
    let pieces = [
        PixelRect::new(rect.x0, rect.y0, rect.x1, i.y0),
        PixelRect::new(rect.x0, i.y1, rect.x1, rect.y1),
        PixelRect::new(rect.x0, i.y0, i.x0, i.y1),
        PixelRect::new(i.x1, i.y0, rect.x1, i.y1),
    ];
    out.extend(pieces.into_iter().filter(|p| !p.is_empty()));
}

/// Joins two disjoint rectangles that share a complete edge.
fn join(a: PixelRect, b: PixelRect) -> Option<PixelRect> {
    if a.y0 == b.y0 && a.y1 == b.y1 && (a.x1 == b.x0 || b.x1 == a.x0) {
        return Some(PixelRect::new(a.x0.min(b.x0), a.y0, a.x1.max(b.x1), a.y1));
    }
    if a.x0 == b.x0 && a.x1 == b.x1 && (a.y1 == b.y0 || b.y1 == a.y0) {
        return Some(PixelRect::new(a.x0, a.y0.min(b.y0), a.x1, a.y1.max(b.y1)));
    }
    None
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.coverage_eq(other)
    }
}

impl Eq for Region {}

impl From<PixelRect> for Region {
    fn from(rect: PixelRect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<PixelRect> for Region {
    fn from_iter<I: IntoIterator<Item = PixelRect>>(iter: I) -> Self {
        let mut region = Self::new();
        region.extend(iter);
        region
    }
}

impl Extend<PixelRect> for Region {
    fn extend<I: IntoIterator<Item = PixelRect>>(&mut self, iter: I) {
        for rect in iter {
            self.union_rect(rect);
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.rects.iter()).finish()
    }
}
