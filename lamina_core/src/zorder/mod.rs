// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Back-to-front surface ordering and visibility.
//!
//! The [`ZOrderDirectory`] is owned by the window-management layer. It keeps
//! a strict total order of surfaces (every insertion names its position with
//! a [`ZPosition`], so ties never occur) and recomputes, after each batch of
//! structural changes, which part of the screen each surface may claim.
//!
//! # Visibility
//!
//! Recompute walks the members from the top down with a running
//! `still_available` region initialized to the screen. Each member's
//! `visible_region` is `still_available ∩ full_region`; members that occlude
//! (opaque, alpha 1, not hidden) then remove their visible region from
//! `still_available`. The result is a partition: no screen pixel is claimed
//! by two occluding members. The partition is checked after every recompute.
//!
//! # Snapshots
//!
//! The compositor never holds the directory lock while blending. It calls
//! [`ZOrderDirectory::snapshot`] once per cycle and iterates the returned
//! `Arc<OrderedList>`. Edits publish a fresh list, leaving held snapshots
//! untouched.
//!
//! # Exposure
//!
//! Structural changes damage the screen even when no surface commits: moving
//! a window uncovers whatever was beneath it. The directory accumulates these
//! screen-space areas and the compositor consumes them with the same
//! begin/end session protocol it uses for per-surface damage.

mod directory;
pub mod dirty;
mod list;
mod position;

pub use directory::{DirectoryEditor, ZOrderDirectory};
pub use list::{OrderedEntry, OrderedList};
pub use position::ZPosition;
