// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for a damage-driven window compositor.
//!
//! `lamina_core` holds everything that is shared between window-content
//! producers, the window-management layer, and the compositor thread:
//! double-buffered surfaces, region algebra, damage tracking, and the
//! z-order directory that decides which parts of each surface are visible.
//!
//! # Architecture
//!
//! ```text
//!   producer thread                 window-management thread
//!        │                                    │
//!        ▼                                    ▼
//!   Surface::acquire_write()          ZOrderDirectory::edit()
//!   Surface::commit(dirty) ──┐                │ recompute()
//!                            │ WakeSignal     ▼
//!                            └──────────► OrderedList (Arc snapshot)
//!                                             │
//!                                             ▼
//!                         compositor: begin sessions, blend, present
//!                                             │
//!                                             ▼
//!                                  PresentationBackend::present()
//! ```
//!
//! **[`surface`]**: per-window pixel store with a producer-side write slot and
//! a compositor-side read slot. Commits flip the slots and record damage.
//!
//! **[`damage`]**: the current/pending damage split that guarantees no
//! invalidation is lost while a frame is being composited.
//!
//! **[`handoff`]**: the flip index shared by both double buffers above.
//!
//! **[`zorder`]**: back-to-front surface ordering, visibility clipping, and
//! copy-on-write snapshots for the compositor.
//!
//! **[`region`]** / **[`geometry`]**: integer rectangles and disjoint
//! rectangle sets.
//!
//! **[`backend`]**: the [`PresentationBackend`](backend::PresentationBackend)
//! trait that output backends implement.
//!
//! **[`wake`]**: the coalescing wake primitive the compositor sleeps on.
//!
//! **[`time`]** / **[`timing`]**: host time and per-frame deadlines.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame-loop instrumentation.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-frame
//!   damage-rect events.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod backend;
pub mod damage;
mod error;
pub mod geometry;
pub mod handoff;
pub mod pixel;
pub mod region;
pub mod surface;
pub mod time;
pub mod timing;
pub mod trace;
pub mod wake;
pub mod zorder;

pub use error::{Error, Result};
