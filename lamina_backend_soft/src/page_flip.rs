// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-buffer swap backend.

use std::time::Duration;

use lamina_core::backend::PresentationBackend;
use lamina_core::geometry::PixelSize;
use lamina_core::pixel::PixelBuffer;
use lamina_core::region::Region;
use lamina_core::{Error, Result};

use crate::vblank::VBlankTimer;

/// Two framebuffers and a front index.
///
/// Each present writes the complete source image into the back framebuffer
/// and flips. With a [`VBlankTimer`] attached, the backend reports async
/// vsync and [`wait_for_sync`](PresentationBackend::wait_for_sync) waits for
/// the timer's next tick.
#[derive(Debug)]
pub struct PageFlipFramebuffer {
    buffers: [PixelBuffer; 2],
    front: usize,
    flips: u64,
    vblank: Option<VBlankTimer>,
}

impl PageFlipFramebuffer {
    /// Allocates both framebuffers at `size`, without a vertical-blank source.
    pub fn new(size: PixelSize) -> Result<Self> {
        Ok(Self {
            buffers: [PixelBuffer::try_new(size)?, PixelBuffer::try_new(size)?],
            front: 0,
            flips: 0,
            vblank: None,
        })
    }

    /// Paces presentation with `timer`.
    #[must_use]
    pub fn with_vblank(mut self, timer: VBlankTimer) -> Self {
        self.vblank = Some(timer);
        self
    }

    /// The framebuffer currently scanned out.
    #[must_use]
    pub fn front_buffer(&self) -> &PixelBuffer {
        &self.buffers[self.front]
    }

    /// Index of the front framebuffer.
    #[inline]
    #[must_use]
    pub fn front_index(&self) -> usize {
        self.front
    }

    /// Number of completed flips.
    #[inline]
    #[must_use]
    pub fn flips(&self) -> u64 {
        self.flips
    }
}

impl PresentationBackend for PageFlipFramebuffer {
    fn present(&mut self, source: &PixelBuffer, _region: &Region) -> Result<()> {
        let back = &mut self.buffers[1 - self.front];
        if source.size() != back.size() {
            return Err(Error::PresentationFailure(format!(
                "source is {:?} but the framebuffers are {:?}",
                source.size(),
                back.size()
            )));
        }
        back.pixels_mut().copy_from_slice(source.pixels());
        self.front = 1 - self.front;
        self.flips += 1;
        Ok(())
    }

    fn wait_for_sync(&mut self, timeout: Duration) -> bool {
        self.vblank
            .as_ref()
            .is_some_and(|timer| timer.wait_next(timeout))
    }

    fn supports_page_flip(&self) -> bool {
        true
    }

    fn supports_async_vsync(&self) -> bool {
        self.vblank.is_some()
    }

    fn size(&self) -> PixelSize {
        self.buffers[self.front].size()
    }
}
