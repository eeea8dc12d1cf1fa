// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface identity and creation parameters.

use core::fmt;

use crate::geometry::{PixelPoint, PixelRect, PixelSize};

/// Identifies a surface within a [`ZOrderDirectory`](crate::zorder::ZOrderDirectory).
///
/// Ids are chosen by the window-management layer, typically one per window.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u32);

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({})", self.0)
    }
}

/// Parameters for creating a [`Surface`](super::Surface).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceDesc {
    /// Surface identity.
    pub id: SurfaceId,
    /// Screen-space position of the top-left pixel.
    pub origin: PixelPoint,
    /// Buffer dimensions.
    pub size: PixelSize,
    /// Whether every pixel the producer writes is fully opaque.
    pub opaque: bool,
}

impl SurfaceDesc {
    /// Describes an opaque surface of `size` placed at `origin`.
    #[must_use]
    pub const fn opaque(id: SurfaceId, origin: PixelPoint, size: PixelSize) -> Self {
        Self {
            id,
            origin,
            size,
            opaque: true,
        }
    }

    /// Describes a translucent surface of `size` placed at `origin`.
    #[must_use]
    pub const fn translucent(id: SurfaceId, origin: PixelPoint, size: PixelSize) -> Self {
        Self {
            id,
            origin,
            size,
            opaque: false,
        }
    }

    /// Screen-space rectangle, saturated at the coordinate limits.
    #[must_use]
    pub const fn bounds(&self) -> PixelRect {
        PixelRect::from_origin_size(self.origin, self.size)
    }
}
