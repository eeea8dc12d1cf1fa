// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output contract for display backends.
//!
//! The compositor composes into a back buffer it owns and hands that buffer,
//! together with the frame's damage, to a [`PresentationBackend`]. Backends
//! differ in how they get pixels to the display:
//!
//! - **Copy**: only the damaged rectangles are copied into the front buffer.
//! - **Page flip**: the whole back buffer becomes the front buffer. Backends
//!   that flip report [`supports_page_flip`](PresentationBackend::supports_page_flip)
//!   so the compositor knows presented frames are complete images.
//! - **Remote / virtual**: the frame is forwarded elsewhere.
//!
//! Vertical-blank pacing is optional. A backend without it returns `false`
//! from [`wait_for_sync`](PresentationBackend::wait_for_sync) and the
//! compositor falls back to its refresh-interval timeout. The engine behaves
//! correctly with every capability off; it only loses the tear-free
//! guarantee.
//!
//! # Frame loop pseudocode
//!
//! ```rust,ignore
//! let damage = collect_damage(&snapshot);
//! blend(&mut back_buffer, &snapshot, &damage);
//! backend.present(&back_buffer, &damage)?;
//! if backend.supports_async_vsync() {
//!     let tear_free = backend.wait_for_sync(refresh_interval);
//! }
//! ```

use std::time::Duration;

use crate::Result;
use crate::geometry::PixelSize;
use crate::pixel::PixelBuffer;
use crate::region::Region;

/// Presents composed frames to a display, page-flip target, or remote output.
pub trait PresentationBackend: Send {
    /// Transfers `region` of `source` to the output.
    ///
    /// Returns once the operation is queued, not necessarily displayed.
    /// Page-flip backends may present the whole of `source` regardless of
    /// `region`. A rejected present (for example a mode change mid-frame)
    /// returns [`Error::PresentationFailure`](crate::Error::PresentationFailure).
    fn present(&mut self, source: &PixelBuffer, region: &Region) -> Result<()>;

    /// Blocks until the next vertical blank or until `timeout` elapses.
    ///
    /// Returns `true` only if a real vertical blank occurred.
    fn wait_for_sync(&mut self, timeout: Duration) -> bool;

    /// Returns `true` if [`present`](Self::present) swaps whole buffers.
    fn supports_page_flip(&self) -> bool;

    /// Returns `true` if [`wait_for_sync`](Self::wait_for_sync) can observe
    /// a real vertical blank.
    fn supports_async_vsync(&self) -> bool;

    /// Output size. The compositor's back buffer has this size.
    fn size(&self) -> PixelSize;
}

impl<B: PresentationBackend + ?Sized> PresentationBackend for Box<B> {
    fn present(&mut self, source: &PixelBuffer, region: &Region) -> Result<()> {
        (**self).present(source, region)
    }

    fn wait_for_sync(&mut self, timeout: Duration) -> bool {
        (**self).wait_for_sync(timeout)
    }

    fn supports_page_flip(&self) -> bool {
        (**self).supports_page_flip()
    }

    fn supports_async_vsync(&self) -> bool {
        (**self).supports_async_vsync()
    }

    fn size(&self) -> PixelSize {
        (**self).size()
    }
}
