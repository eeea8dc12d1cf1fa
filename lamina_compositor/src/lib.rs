// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage-driven compositor engine.
//!
//! `lamina_compositor` turns the surfaces and z-order snapshots of
//! [`lamina_core`] into presented frames:
//!
//! - [`Compositor`] runs one cycle at a time: collect damage, blend the
//!   damaged layers into a back buffer, present, close sessions.
//! - [`CompositorThread`] runs it on a dedicated thread woken by producers and
//!   the directory; [`CompositorHandle`] is the owner's side.
//! - [`BufferPool`] recycles pixel buffers across surface creation, resizes,
//!   and retirement.
//! - [`CompositorConfig`] holds the process-start switches, loadable from
//!   TOML.
//!
//! When the backend keeps rejecting frames the compositor disables itself and
//! falls back to copying the topmost surface straight to the output, without
//! ever blanking the screen.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use lamina_compositor::{Compositor, CompositorConfig, CycleOutcome};
//! use lamina_core::backend::PresentationBackend;
//! use lamina_core::geometry::{PixelPoint, PixelRect, PixelSize};
//! use lamina_core::pixel::{Pixel, PixelBuffer};
//! use lamina_core::region::Region;
//! use lamina_core::surface::{SurfaceDesc, SurfaceId};
//! use lamina_core::wake::WakeReason;
//! use lamina_core::zorder::{ZOrderDirectory, ZPosition};
//!
//! #[derive(Debug)]
//! struct Screen(PixelBuffer);
//!
//! impl PresentationBackend for Screen {
//!     fn present(&mut self, source: &PixelBuffer, region: &Region) -> lamina_core::Result<()> {
//!         self.0.copy_region_from(source, region);
//!         Ok(())
//!     }
//!     fn wait_for_sync(&mut self, _: std::time::Duration) -> bool { false }
//!     fn supports_page_flip(&self) -> bool { false }
//!     fn supports_async_vsync(&self) -> bool { false }
//!     fn size(&self) -> PixelSize { self.0.size() }
//! }
//!
//! let screen = Screen(PixelBuffer::try_new(PixelSize::new(64, 48))?);
//! let directory = Arc::new(ZOrderDirectory::new(PixelRect::new(0, 0, 64, 48)));
//! let mut compositor =
//!     Compositor::new(CompositorConfig::default(), Arc::clone(&directory), screen)?;
//!
//! let desc = SurfaceDesc::opaque(SurfaceId(1), PixelPoint::new(8, 8), PixelSize::new(16, 16));
//! let window = compositor.create_surface(desc)?;
//! directory.insert(Arc::clone(&window), ZPosition::Top)?;
//!
//! let mut pixels = window.acquire_write()?;
//! pixels.fill(Pixel::opaque_rgb(200, 40, 40));
//! pixels.commit_all();
//!
//! let outcome = compositor.run_cycle(WakeReason::Signaled);
//! assert!(matches!(outcome, CycleOutcome::Presented { damage_area: 256, .. }));
//! assert_eq!(compositor.run_cycle(WakeReason::Timeout), CycleOutcome::Idle);
//! # Ok::<(), lamina_core::Error>(())
//! ```
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Emits frame-loop events to the attached
//!   [`TraceSink`](lamina_core::trace::TraceSink).
//! - `trace-rich` (disabled by default, implies `trace`): Also emits the
//!   damage rectangles of every presented frame.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod blend;
pub mod config;
mod engine;
pub mod fallback;
pub mod frame;
pub mod pool;
mod thread;

pub use config::{CompositorConfig, ConfigError};
pub use engine::{Compositor, CycleOutcome, EngineState, EngineStats};
pub use frame::CompositionFrame;
pub use pool::BufferPool;
pub use thread::{CompositorHandle, CompositorThread};
