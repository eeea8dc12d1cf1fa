// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explicit stacking positions.

use crate::surface::SurfaceId;

/// Where to place a surface in the stacking order.
///
/// Positions are always explicit; the directory never infers order, so two
/// members can never tie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZPosition {
    /// Above every other member.
    Top,
    /// Below every other member.
    Bottom,
    /// Directly above the given member.
    Above(SurfaceId),
    /// Directly below the given member.
    Below(SurfaceId),
}
