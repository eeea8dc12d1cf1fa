// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software [`PresentationBackend`](lamina_core::backend::PresentationBackend)
//! implementations for lamina.
//!
//! | Backend | Present | Page flip | Async vsync |
//! |---|---|---|---|
//! | [`MemoryFramebuffer`] | copies the damaged region | no | no |
//! | [`PageFlipFramebuffer`] | swaps whole buffers | yes | with a [`VBlankTimer`] |
//! | [`VirtualOutput`] | queues the damaged pixels for a consumer | no | no |
//!
//! All three run without a display, which makes them the backends of choice
//! for headless sessions and tests. [`MemoryFramebuffer`] and
//! [`VirtualOutput`] also inject failures, to drive the compositor's
//! degradation path.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod memory;
mod page_flip;
mod vblank;
mod virtual_output;

pub use memory::{FramebufferView, MemoryFramebuffer};
pub use page_flip::PageFlipFramebuffer;
pub use vblank::VBlankTimer;
pub use virtual_output::{OutputReceiver, PresentRecord, RectPayload, VirtualOutput};
