// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Size-keyed pool of reusable pixel buffers.
//!
//! The pool is owned by the compositor thread and is never shared. Surfaces
//! created or resized through the compositor draw their slots from it, and
//! the buffers of resized or retired surfaces flow back into it.

use std::collections::HashMap;

use lamina_core::Result;
use lamina_core::geometry::PixelSize;
use lamina_core::pixel::{Pixel, PixelBuffer};

#[derive(Debug)]
struct PoolEntry {
    buffer: PixelBuffer,
    released_at: u64,
}

/// Free lists of [`PixelBuffer`]s keyed by size.
///
/// [`acquire`](Self::acquire) is O(1) when a buffer of the requested size is
/// idle and falls back to a fresh fallible allocation otherwise. At most
/// `capacity` idle buffers are kept; [`trim`](Self::trim) frees those idle for
/// longer than the trim horizon.
#[derive(Debug)]
pub struct BufferPool {
    free: HashMap<PixelSize, Vec<PoolEntry>>,
    idle: usize,
    capacity: usize,
    trim_horizon: u64,
    frame: u64,
    hits: u64,
    misses: u64,
    #[cfg(test)]
    fail_misses: bool,
}

impl BufferPool {
    /// Creates an empty pool keeping at most `capacity` idle buffers for at
    /// most `trim_horizon` frames.
    #[must_use]
    pub fn new(capacity: usize, trim_horizon: u64) -> Self {
        Self {
            free: HashMap::new(),
            idle: 0,
            capacity,
            trim_horizon,
            frame: 0,
            hits: 0,
            misses: 0,
            #[cfg(test)]
            fail_misses: false,
        }
    }

    /// Returns a buffer of `size`, reusing an idle one if possible.
    ///
    /// Reused buffers keep their previous contents.
    pub fn acquire(&mut self, size: PixelSize) -> Result<PixelBuffer> {
        if let Some(entry) = self.free.get_mut(&size).and_then(Vec::pop) {
            self.idle -= 1;
            self.hits += 1;
            return Ok(entry.buffer);
        }
        self.misses += 1;
        #[cfg(test)]
        if self.fail_misses {
            return Err(lamina_core::Error::OutOfMemory {
                width: size.width,
                height: size.height,
            });
        }
        PixelBuffer::try_new(size)
    }

    /// Acquires two buffers of `size`, cleared to transparent.
    ///
    /// If the second acquisition fails the first goes back to the pool.
    pub fn acquire_pair(&mut self, size: PixelSize) -> Result<[PixelBuffer; 2]> {
        let mut first = self.acquire(size)?;
        let mut second = match self.acquire(size) {
            Ok(buffer) => buffer,
            Err(err) => {
                self.release(first);
                return Err(err);
            }
        };
        // Pooled buffers still hold another surface's pixels.
        first.fill(Pixel::TRANSPARENT);
        second.fill(Pixel::TRANSPARENT);
        Ok([first, second])
    }

    /// Returns a buffer to the pool.
    ///
    /// Returns `false` (and frees the buffer) if the pool is full or the
    /// buffer is empty.
    pub fn release(&mut self, buffer: PixelBuffer) -> bool {
        if self.idle >= self.capacity || buffer.size().is_empty() {
            return false;
        }
        self.free.entry(buffer.size()).or_default().push(PoolEntry {
            buffer,
            released_at: self.frame,
        });
        self.idle += 1;
        true
    }

    /// Advances the pool clock to `frame_index` and frees buffers idle for
    /// more than the trim horizon. Returns how many were freed.
    pub fn trim(&mut self, frame_index: u64) -> usize {
        self.frame = frame_index;
        let horizon = self.trim_horizon;
        let mut freed = 0;
        self.free.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| frame_index.saturating_sub(e.released_at) <= horizon);
            freed += before - entries.len();
            !entries.is_empty()
        });
        self.idle -= freed;
        if freed > 0 {
            tracing::debug!(freed, idle = self.idle, frame_index, "buffer pool trimmed");
        }
        freed
    }

    /// Frees every idle buffer.
    pub fn clear(&mut self) {
        self.free.clear();
        self.idle = 0;
    }

    /// Number of idle buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idle
    }

    /// Returns `true` if no buffer is idle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idle == 0
    }

    /// Maximum number of idle buffers.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquisitions served from the pool.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Acquisitions that allocated.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }
}
