// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channels for directory members.
//!
//! Every structural change marks the affected surface (keyed by its
//! [`SurfaceId`](crate::surface::SurfaceId) value) on one channel. Recompute
//! drains all three: visibility is always recomputed for the whole list, but
//! the drained keys decide which screen areas are exposed to the compositor.
//!
//! No channel propagates: members have no parent/child relationship, so each
//! mark is local to the surface that changed.

use understory_dirty::Channel;

/// Stacking position changed (insert, restack).
pub const ORDER: Channel = Channel::new(0);

/// Screen placement or size changed (move, resize).
pub const GEOMETRY: Channel = Channel::new(1);

/// Opacity, alpha, hidden, or bypass flag changed.
pub const APPEARANCE: Channel = Channel::new(2);
