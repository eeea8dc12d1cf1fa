// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copy-only software framebuffer.

use std::sync::Arc;
use std::time::Duration;

use lamina_core::backend::PresentationBackend;
use lamina_core::geometry::PixelSize;
use lamina_core::pixel::{Pixel, PixelBuffer};
use lamina_core::region::Region;
use lamina_core::{Error, Result};
use parking_lot::Mutex;

#[derive(Debug)]
struct Front {
    pixels: PixelBuffer,
    presents: u64,
    last_region: Region,
    fail_next: u32,
}

/// A framebuffer in system memory.
///
/// [`present`](PresentationBackend::present) copies only the damaged region
/// into the front buffer. There is no page flip and no vertical-blank source.
/// The front buffer stays inspectable through a [`FramebufferView`] after
/// the framebuffer has been handed to a compositor.
#[derive(Debug)]
pub struct MemoryFramebuffer {
    front: Arc<Mutex<Front>>,
}

impl MemoryFramebuffer {
    /// Allocates a front buffer of `size` filled with transparent black.
    pub fn new(size: PixelSize) -> Result<Self> {
        Ok(Self {
            front: Arc::new(Mutex::new(Front {
                pixels: PixelBuffer::try_new(size)?,
                presents: 0,
                last_region: Region::new(),
                fail_next: 0,
            })),
        })
    }

    /// A handle onto the front buffer that can be kept by tests or a
    /// screenshot tool.
    #[must_use]
    pub fn view(&self) -> FramebufferView {
        FramebufferView {
            front: Arc::clone(&self.front),
        }
    }

    /// Makes the next `n` presents fail with
    /// [`Error::PresentationFailure`].
    pub fn fail_next_presents(&self, n: u32) {
        self.front.lock().fail_next = n;
    }
}

impl PresentationBackend for MemoryFramebuffer {
    fn present(&mut self, source: &PixelBuffer, region: &Region) -> Result<()> {
        let mut front = self.front.lock();
        if front.fail_next > 0 {
            front.fail_next -= 1;
            return Err(Error::PresentationFailure("injected failure".into()));
        }
        if source.size() != front.pixels.size() {
            return Err(Error::PresentationFailure(format!(
                "source is {:?} but the framebuffer is {:?}",
                source.size(),
                front.pixels.size()
            )));
        }
        front.pixels.copy_region_from(source, region);
        front.presents += 1;
        front.last_region = region.clone();
        Ok(())
    }

    fn wait_for_sync(&mut self, _timeout: Duration) -> bool {
        false
    }

    fn supports_page_flip(&self) -> bool {
        false
    }

    fn supports_async_vsync(&self) -> bool {
        false
    }

    fn size(&self) -> PixelSize {
        self.front.lock().pixels.size()
    }
}

/// Shared read access to a [`MemoryFramebuffer`]'s front buffer, plus fault
/// and mode-change injection.
#[derive(Clone, Debug)]
pub struct FramebufferView {
    front: Arc<Mutex<Front>>,
}

impl FramebufferView {
    /// The front-buffer pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Pixel> {
        self.front.lock().pixels.get(x, y)
    }

    /// A copy of the whole front buffer.
    #[must_use]
    pub fn snapshot(&self) -> PixelBuffer {
        self.front.lock().pixels.clone()
    }

    /// Number of accepted presents.
    #[must_use]
    pub fn presents(&self) -> u64 {
        self.front.lock().presents
    }

    /// The region passed to the most recent accepted present.
    #[must_use]
    pub fn last_region(&self) -> Region {
        self.front.lock().last_region.clone()
    }

    /// Makes the next `n` presents fail.
    pub fn fail_next_presents(&self, n: u32) {
        self.front.lock().fail_next = n;
    }

    /// Simulates a display mode change: the front buffer is reallocated at
    /// `size` and cleared.
    pub fn set_mode(&self, size: PixelSize) -> Result<()> {
        let pixels = PixelBuffer::try_new(size)?;
        tracing::debug!(?size, "memory framebuffer mode change");
        self.front.lock().pixels = pixels;
        Ok(())
    }
}
