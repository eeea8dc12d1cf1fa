// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered per-window pixel store.
//!
//! A [`Surface`] owns two same-size [`PixelBuffer`] slots. The producer (the
//! window's content renderer) writes `slot[write_index]`; the compositor reads
//! `slot[1 - write_index]`. [`WriteHandle::commit`] flips the two, records the
//! committed damage, and wakes the compositor.
//!
//! # Locking
//!
//! Each slot sits behind its own `RwLock`, but producers and the compositor
//! only ever *try* to acquire it, so neither side blocks on pixel data. The
//! small metadata (flip index, damage, geometry) lives behind a mutex that is
//! held for a handful of instructions at a time.
//!
//! [`resize`](Surface::resize) is the one path that blocks on the slot locks:
//! taking both write locks waits for any in-flight compositor read and any
//! outstanding producer handle to finish, which is the fence the resize needs
//! before the buffers are swapped. The compositor thread never waits there; it
//! uses [`try_resize_with`](Surface::try_resize_with), which raises the same
//! fence but only ever tries the locks and is retried until it completes.
//!
//! The only nested acquisition is slot, then metadata (in `commit` and
//! `resize`). Metadata holders never wait on a slot.

mod handle;
mod id;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use crate::damage::DamageTracker;
use crate::geometry::{PixelPoint, PixelRect, PixelSize};
use crate::handoff::FlipIndex;
use crate::pixel::{Pixel, PixelBuffer};
use crate::region::Region;
use crate::wake::WakeSignal;
use crate::{Error, Result};

pub use handle::{ReadHandle, WriteHandle};
pub use id::{SurfaceDesc, SurfaceId};

/// Largest accepted surface width or height.
pub const MAX_SURFACE_DIMENSION: u32 = 1 << 15;

/// Who holds the resize fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResizeFence {
    Open,
    /// [`Surface::resize_with`] is waiting on the slot locks.
    Blocking,
    /// [`Surface::try_resize_with`] found a slot busy and will be retried.
    Deferred,
}

#[derive(Debug)]
struct SurfaceMeta {
    flip: FlipIndex,
    damage: DamageTracker,
    origin: PixelPoint,
    size: PixelSize,
    fence: ResizeFence,
    waker: Option<Arc<WakeSignal>>,
}

/// Buffers handed back by [`Surface::with_buffers`] when it cannot use them.
#[derive(Debug)]
pub struct RejectedBuffers {
    /// Why the surface was not built.
    pub error: Error,
    /// The buffers, untouched.
    pub buffers: [PixelBuffer; 2],
}

/// Fails with [`Error::InvalidGeometry`] unless `size` is within
/// [`MAX_SURFACE_DIMENSION`] and the far edges at `origin` fit in `i32`.
pub fn check_geometry(origin: PixelPoint, size: PixelSize) -> Result<()> {
    let fits = size.width <= MAX_SURFACE_DIMENSION
        && size.height <= MAX_SURFACE_DIMENSION
        && PixelRect::checked_from_origin_size(origin, size).is_some();
    if fits {
        Ok(())
    } else {
        Err(Error::InvalidGeometry { origin, size })
    }
}

/// A window's double-buffered pixel store plus handoff metadata.
#[derive(Debug)]
pub struct Surface {
    id: SurfaceId,
    slots: [RwLock<PixelBuffer>; 2],
    meta: Mutex<SurfaceMeta>,
    opaque: AtomicBool,
    retiring: AtomicBool,
    last_composited: AtomicU64,
}

impl Surface {
    /// Allocates a surface with two transparent buffers.
    ///
    /// On [`Error::OutOfMemory`] or [`Error::InvalidGeometry`] no surface
    /// exists and nothing must be registered with the directory.
    pub fn new(desc: SurfaceDesc) -> Result<Self> {
        check_geometry(desc.origin, desc.size)?;
        let a = PixelBuffer::try_new(desc.size)?;
        let b = PixelBuffer::try_new(desc.size)?;
        Ok(Self::from_buffers(desc, [a, b]))
    }

    /// Builds a surface around two buffers of exactly `desc.size`, clearing
    /// them.
    ///
    /// Rejected geometry or a mismatched buffer hands both buffers back.
    pub fn with_buffers(
        desc: SurfaceDesc,
        buffers: [PixelBuffer; 2],
    ) -> core::result::Result<Self, RejectedBuffers> {
        let mismatch = buffers.iter().find(|buf| buf.size() != desc.size);
        let checked = match mismatch {
            Some(buf) => Err(Error::InvalidGeometry {
                origin: desc.origin,
                size: buf.size(),
            }),
            None => check_geometry(desc.origin, desc.size),
        };
        if let Err(error) = checked {
            return Err(RejectedBuffers { error, buffers });
        }
        let [mut a, mut b] = buffers;
        a.fill(Pixel::TRANSPARENT);
        b.fill(Pixel::TRANSPARENT);
        Ok(Self::from_buffers(desc, [a, b]))
    }

    fn from_buffers(desc: SurfaceDesc, [a, b]: [PixelBuffer; 2]) -> Self {
        Self {
            id: desc.id,
            slots: [RwLock::new(a), RwLock::new(b)],
            meta: Mutex::new(SurfaceMeta {
                flip: FlipIndex::new(),
                damage: DamageTracker::new(),
                origin: desc.origin,
                size: desc.size,
                fence: ResizeFence::Open,
                waker: None,
            }),
            opaque: AtomicBool::new(desc.opaque),
            retiring: AtomicBool::new(false),
            last_composited: AtomicU64::new(0),
        }
    }

    /// Surface identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SurfaceId {
        self.id
    }

    /// Screen-space rectangle covered by the surface.
    #[must_use]
    pub fn bounds(&self) -> PixelRect {
        let meta = self.meta.lock();
        PixelRect::from_origin_size(meta.origin, meta.size)
    }

    /// Buffer dimensions.
    #[must_use]
    pub fn size(&self) -> PixelSize {
        self.meta.lock().size
    }

    /// Screen-space position of the top-left pixel.
    #[must_use]
    pub fn origin(&self) -> PixelPoint {
        self.meta.lock().origin
    }

    /// Moves the surface. Only the directory does this, so that visibility
    /// is recomputed along with the move.
    pub(crate) fn set_origin(&self, origin: PixelPoint) -> Result<()> {
        let mut meta = self.meta.lock();
        check_geometry(origin, meta.size)?;
        meta.origin = origin;
        Ok(())
    }

    /// Whether the producer guarantees fully opaque content.
    #[inline]
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.opaque.load(Ordering::Acquire)
    }

    pub(crate) fn set_opaque(&self, opaque: bool) {
        self.opaque.store(opaque, Ordering::Release);
    }

    /// Returns `true` once the surface has been removed from its directory.
    #[inline]
    #[must_use]
    pub fn is_retiring(&self) -> bool {
        self.retiring.load(Ordering::Acquire)
    }

    /// Marks the surface as retiring. Further
    /// [`acquire_write`](Self::acquire_write) calls fail with
    /// [`Error::Retired`].
    pub(crate) fn retire(&self) {
        self.retiring.store(true, Ordering::Release);
        self.meta.lock().waker = None;
    }

    /// Attaches the signal raised by commits and invalidations.
    pub fn attach_waker(&self, waker: Arc<WakeSignal>) {
        self.meta.lock().waker = Some(waker);
    }

    /// Sequence of the buffer most recently composited.
    #[inline]
    #[must_use]
    pub fn last_composited_sequence(&self) -> u64 {
        self.last_composited.load(Ordering::Acquire)
    }

    /// Records that the buffer with `sequence` reached the screen.
    pub fn mark_composited(&self, sequence: u64) {
        self.last_composited.fetch_max(sequence, Ordering::AcqRel);
    }

    /// Sequence of the most recently committed buffer.
    #[must_use]
    pub fn committed_sequence(&self) -> u64 {
        self.meta.lock().flip.read_sequence()
    }

    /// Returns the producer-writable slot.
    ///
    /// Never blocks. Fails with [`Error::ResizeInProgress`] during a resize,
    /// [`Error::BufferBusy`] if the slot is still held (a second write handle,
    /// or a compositor read outliving two fast commits), and
    /// [`Error::Retired`] after removal.
    pub fn acquire_write(&self) -> Result<WriteHandle<'_>> {
        let meta = self.meta.lock();
        if self.is_retiring() {
            return Err(Error::Retired);
        }
        if meta.fence != ResizeFence::Open {
            return Err(Error::ResizeInProgress);
        }
        let slot = meta.flip.write_index();
        let guard = self.slots[slot].try_write().ok_or(Error::BufferBusy)?;
        drop(meta);
        Ok(WriteHandle::new(self, slot, guard))
    }

    /// Returns the compositor-readable slot and its sequence.
    ///
    /// Never blocks. The slot is fixed for the lifetime of the handle, and
    /// the producer cannot write it while the handle is held.
    pub fn read_buffer(&self) -> Result<ReadHandle<'_>> {
        let meta = self.meta.lock();
        if meta.fence != ResizeFence::Open {
            return Err(Error::ResizeInProgress);
        }
        let slot = meta.flip.read_index();
        let sequence = meta.flip.sequence(slot);
        let origin = meta.origin;
        let guard = self.slots[slot].try_read().ok_or(Error::BufferBusy)?;
        drop(meta);
        Ok(ReadHandle::new(self, slot, sequence, origin, guard))
    }

    /// Publishes the write slot held by `guard`.
    fn publish_with(
        &self,
        slot: usize,
        dirty: &Region,
        guard: RwLockWriteGuard<'_, PixelBuffer>,
    ) -> u64 {
        let mut meta = self.meta.lock();
        drop(guard);
        debug_assert_eq!(meta.flip.write_index(), slot, "write slot moved under a handle");
        let sequence = meta.flip.flip();
        let mut damage = dirty.clone();
        damage.clip_to(PixelRect::from_size(meta.size));
        meta.damage.invalidate(&damage);
        let waker = meta.waker.clone();
        drop(meta);
        if let Some(waker) = waker {
            waker.wake();
        }
        sequence
    }

    /// Marks `region` (surface-local) as needing recomposition without a
    /// pixel commit.
    pub fn invalidate(&self, region: &Region) {
        let mut meta = self.meta.lock();
        let mut damage = region.clone();
        damage.clip_to(PixelRect::from_size(meta.size));
        if damage.is_empty() {
            return;
        }
        meta.damage.invalidate(&damage);
        let waker = meta.waker.clone();
        drop(meta);
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Marks the whole surface as needing recomposition.
    pub fn invalidate_all(&self) {
        let size = self.size();
        self.invalidate(&Region::from_rect(PixelRect::from_size(size)));
    }

    /// Queues the whole surface for the next session without raising the
    /// wake signal.
    ///
    /// The compositor uses this for a surface it had to skip, so the retry
    /// waits for the next wake or refresh timeout instead of spinning.
    pub fn requeue_all(&self) {
        let mut meta = self.meta.lock();
        let area = Region::from_rect(PixelRect::from_size(meta.size));
        meta.damage.invalidate(&area);
    }

    /// Starts a damage session and returns the surface-local `current`
    /// region.
    pub fn begin_session(&self) -> Region {
        self.meta.lock().damage.begin_session()
    }

    /// Ends the damage session. Returns `true` if damage arrived meanwhile.
    pub fn end_session(&self) -> bool {
        self.meta.lock().damage.end_session()
    }

    /// Returns `true` if the surface has damage waiting for a session.
    #[must_use]
    pub fn has_pending_damage(&self) -> bool {
        !self.meta.lock().damage.pending().is_empty()
    }

    /// Reallocates both slots at `size`.
    ///
    /// Blocks until the compositor and the producer release the slots. Both
    /// sequences restart at 0 and the whole new area is damaged exactly once.
    /// On [`Error::OutOfMemory`] or [`Error::InvalidGeometry`] the surface
    /// keeps its previous buffers.
    ///
    /// Callers that own a [`ZOrderDirectory`](crate::zorder::ZOrderDirectory)
    /// must follow up with
    /// [`notify_geometry_changed`](crate::zorder::ZOrderDirectory::notify_geometry_changed).
    pub fn resize(&self, size: PixelSize) -> Result<()> {
        self.resize_with(size, |size| {
            Ok([PixelBuffer::try_new(size)?, PixelBuffer::try_new(size)?])
        })
        .map(drop)
    }

    /// Like [`resize`](Self::resize), with a caller-supplied allocator for
    /// the pair of new buffers.
    ///
    /// Returns the displaced buffers so the caller can recycle them.
    pub fn resize_with<F>(&self, size: PixelSize, alloc: F) -> Result<[PixelBuffer; 2]>
    where
        F: FnOnce(PixelSize) -> Result<[PixelBuffer; 2]>,
    {
        {
            let mut meta = self.meta.lock();
            self.check_resize(&meta, size)?;
            if meta.fence != ResizeFence::Open {
                return Err(Error::ResizeInProgress);
            }
            meta.fence = ResizeFence::Blocking;
        }

        let first = self.slots[0].write();
        let second = self.slots[1].write();
        self.install(size, first, second, alloc)
    }

    /// Non-blocking [`resize_with`](Self::resize_with).
    ///
    /// Raises the resize fence and tries both slot locks. Returns `Ok(None)`
    /// while a producer handle or a read is outstanding; the fence stays up,
    /// so no new handles are issued, and the caller retries later with the
    /// same size. `alloc` only runs once the fence is complete.
    pub fn try_resize_with<F>(&self, size: PixelSize, alloc: F) -> Result<Option<[PixelBuffer; 2]>>
    where
        F: FnOnce(PixelSize) -> Result<[PixelBuffer; 2]>,
    {
        {
            let mut meta = self.meta.lock();
            if let Err(err) = self.check_resize(&meta, size) {
                if meta.fence == ResizeFence::Deferred {
                    meta.fence = ResizeFence::Open;
                }
                return Err(err);
            }
            match meta.fence {
                ResizeFence::Blocking => return Err(Error::ResizeInProgress),
                ResizeFence::Open | ResizeFence::Deferred => meta.fence = ResizeFence::Deferred,
            }
        }

        let Some(first) = self.slots[0].try_write() else {
            return Ok(None);
        };
        let Some(second) = self.slots[1].try_write() else {
            return Ok(None);
        };
        self.install(size, first, second, alloc).map(Some)
    }

    /// Lowers a fence left up by [`try_resize_with`](Self::try_resize_with)
    /// that will not be retried.
    pub fn cancel_deferred_resize(&self) {
        let mut meta = self.meta.lock();
        if meta.fence == ResizeFence::Deferred {
            meta.fence = ResizeFence::Open;
        }
    }

    fn check_resize(&self, meta: &SurfaceMeta, size: PixelSize) -> Result<()> {
        if self.is_retiring() {
            return Err(Error::Retired);
        }
        check_geometry(meta.origin, size)
    }

    /// Swaps in freshly allocated buffers while holding both slot locks, and
    /// lowers the fence.
    fn install<F>(
        &self,
        size: PixelSize,
        mut first: RwLockWriteGuard<'_, PixelBuffer>,
        mut second: RwLockWriteGuard<'_, PixelBuffer>,
        alloc: F,
    ) -> Result<[PixelBuffer; 2]>
    where
        F: FnOnce(PixelSize) -> Result<[PixelBuffer; 2]>,
    {
        let fresh = alloc(size);

        let mut meta = self.meta.lock();
        meta.fence = ResizeFence::Open;
        let [a, b] = match fresh {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(surface = ?self.id, ?size, %err, "surface resize failed");
                return Err(err);
            }
        };
        let old = [
            core::mem::replace(&mut *first, a),
            core::mem::replace(&mut *second, b),
        ];
        meta.size = size;
        meta.flip.reset();
        self.last_composited.store(0, Ordering::Release);
        meta.damage
            .replace(Region::from_rect(PixelRect::from_size(size)));
        let waker = meta.waker.clone();
        drop(meta);
        drop(second);
        drop(first);
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(old)
    }

    /// Returns both buffers, consuming the surface.
    #[must_use]
    pub fn into_buffers(self) -> [PixelBuffer; 2] {
        let [a, b] = self.slots;
        [a.into_inner(), b.into_inner()]
    }
}
