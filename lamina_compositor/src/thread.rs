// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dedicated compositor thread.
//!
//! [`CompositorThread::spawn`] moves a [`Compositor`] onto a named thread
//! that sleeps on the wake signal with the refresh interval as timeout, runs
//! one cycle per wake, and publishes [`EngineStats`] afterwards.
//!
//! Requests that need the compositor-owned buffer pool (creating and
//! resizing surfaces) are sent over a channel and served between cycles, so
//! the pool never leaves the thread and a resize fence never overlaps a
//! blend. A resize whose surface still has a producer handle out is parked
//! and retried every iteration; the thread itself only ever sleeps on the
//! wake signal.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use lamina_core::backend::PresentationBackend;
use lamina_core::geometry::PixelSize;
use lamina_core::surface::{Surface, SurfaceDesc};
use lamina_core::wake::WakeSignal;
use lamina_core::{Error, Result};
use parking_lot::Mutex;

use crate::engine::{Compositor, EngineStats};

#[derive(Debug)]
enum Request {
    CreateSurface {
        desc: SurfaceDesc,
        reply: Sender<Result<Arc<Surface>>>,
    },
    ResizeSurface {
        surface: Arc<Surface>,
        size: PixelSize,
        reply: Sender<Result<()>>,
    },
    FullRepaint,
}

#[derive(Debug)]
struct ParkedResize {
    surface: Arc<Surface>,
    size: PixelSize,
    reply: Sender<Result<()>>,
}

#[derive(Debug)]
struct Shared {
    stop: AtomicBool,
    stats: Mutex<EngineStats>,
}

/// The compositor's side of the thread: the engine plus its request queue.
pub struct CompositorThread<B: PresentationBackend> {
    compositor: Compositor<B>,
    requests: Receiver<Request>,
    parked: Vec<ParkedResize>,
    shared: Arc<Shared>,
}

impl<B: PresentationBackend> fmt::Debug for CompositorThread<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorThread")
            .field("compositor", &self.compositor)
            .field("queued_requests", &self.requests.len())
            .field("parked_resizes", &self.parked.len())
            .finish_non_exhaustive()
    }
}

impl<B: PresentationBackend + 'static> CompositorThread<B> {
    /// Starts `compositor` on a thread named `lamina-compositor`.
    ///
    /// Fails with [`Error::EngineStopped`] if the thread cannot be spawned.
    pub fn spawn(compositor: Compositor<B>) -> Result<CompositorHandle<B>> {
        let (requests_tx, requests) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            stats: Mutex::new(compositor.stats()),
        });
        let waker = Arc::clone(compositor.waker());
        let worker = Self {
            compositor,
            requests,
            parked: Vec::new(),
            shared: Arc::clone(&shared),
        };
        let thread = std::thread::Builder::new()
            .name("lamina-compositor".into())
            .spawn(move || worker.run())
            .map_err(|err| {
                tracing::error!(%err, "failed to spawn the compositor thread");
                Error::EngineStopped
            })?;
        Ok(CompositorHandle {
            thread: Some(thread),
            requests: requests_tx,
            shared,
            waker,
        })
    }

    fn run(mut self) -> Compositor<B> {
        let refresh = self.compositor.config().refresh_interval();
        let waker = Arc::clone(self.compositor.waker());
        tracing::debug!(?refresh, "compositor thread started");
        loop {
            let reason = waker.wait_timeout(refresh);
            if self.shared.stop.load(Ordering::Acquire) {
                break;
            }
            self.serve_requests();
            self.compositor.run_cycle(reason);
            *self.shared.stats.lock() = self.compositor.stats();
        }
        for parked in self.parked.drain(..) {
            parked.surface.cancel_deferred_resize();
            _ = parked.reply.send(Err(Error::EngineStopped));
        }
        tracing::debug!(
            frames = self.compositor.frame_index(),
            "compositor thread stopped"
        );
        self.compositor
    }

    fn serve_requests(&mut self) {
        for parked in core::mem::take(&mut self.parked) {
            self.resize(parked);
        }
        while let Ok(request) = self.requests.try_recv() {
            match request {
                Request::CreateSurface { desc, reply } => {
                    _ = reply.send(self.compositor.create_surface(desc));
                }
                Request::ResizeSurface {
                    surface,
                    size,
                    reply,
                } => self.resize(ParkedResize {
                    surface,
                    size,
                    reply,
                }),
                Request::FullRepaint => self.compositor.request_full_repaint(),
            }
        }
    }

    fn resize(&mut self, request: ParkedResize) {
        match self.compositor.resize_surface(&request.surface, request.size) {
            Ok(true) => {
                _ = request.reply.send(Ok(()));
            }
            Ok(false) => {
                tracing::trace!(
                    surface = ?request.surface.id(),
                    "resize parked until the slots are free"
                );
                self.parked.push(request);
            }
            Err(err) => {
                _ = request.reply.send(Err(err));
            }
        }
    }
}

/// Owner-side handle to a running [`CompositorThread`].
///
/// Dropping the handle stops and joins the thread.
pub struct CompositorHandle<B: PresentationBackend> {
    thread: Option<JoinHandle<Compositor<B>>>,
    requests: Sender<Request>,
    shared: Arc<Shared>,
    waker: Arc<WakeSignal>,
}

impl<B: PresentationBackend> fmt::Debug for CompositorHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorHandle")
            .field("running", &self.thread.is_some())
            .field("stats", &*self.shared.stats.lock())
            .finish_non_exhaustive()
    }
}

impl<B: PresentationBackend> CompositorHandle<B> {
    /// Wakes the compositor. Returns `false` if the wake was coalesced.
    pub fn wake(&self) -> bool {
        self.waker.wake()
    }

    /// The signal the compositor sleeps on.
    #[must_use]
    pub fn waker(&self) -> &Arc<WakeSignal> {
        &self.waker
    }

    /// Statistics as of the most recent cycle.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        *self.shared.stats.lock()
    }

    /// Creates a surface with pooled buffers on the compositor thread.
    pub fn create_surface(&self, desc: SurfaceDesc) -> Result<Arc<Surface>> {
        self.call(|reply| Request::CreateSurface { desc, reply })
    }

    /// Resizes `surface` with pooled buffers on the compositor thread.
    ///
    /// Blocks the caller until the resize completes, which includes waiting
    /// for the surface's producer to release its write handle. The
    /// compositor keeps running in the meantime.
    pub fn resize_surface(&self, surface: &Arc<Surface>, size: PixelSize) -> Result<()> {
        let surface = Arc::clone(surface);
        self.call(|reply| Request::ResizeSurface {
            surface,
            size,
            reply,
        })
    }

    /// Repaints the whole screen on the next cycle.
    pub fn request_full_repaint(&self) -> Result<()> {
        self.requests
            .send(Request::FullRepaint)
            .map_err(|_| Error::EngineStopped)?;
        self.waker.wake();
        Ok(())
    }

    fn call<T>(&self, request: impl FnOnce(Sender<Result<T>>) -> Request) -> Result<T> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.requests
            .send(request(reply))
            .map_err(|_| Error::EngineStopped)?;
        self.waker.wake();
        response.recv().map_err(|_| Error::EngineStopped)?
    }

    /// Stops the thread after its current cycle and returns the compositor.
    pub fn shutdown(mut self) -> Result<Compositor<B>> {
        let thread = self.thread.take().ok_or(Error::EngineStopped)?;
        self.stop();
        thread.join().map_err(|_| {
            tracing::error!("compositor thread panicked");
            Error::EngineStopped
        })
    }

    fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.waker.wake();
    }
}

impl<B: PresentationBackend> Drop for CompositorHandle<B> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop();
            _ = thread.join();
        }
    }
}
