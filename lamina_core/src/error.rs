// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by producers, the directory, and the compositor.

use crate::geometry::{PixelPoint, PixelSize};
use crate::surface::SurfaceId;

/// Errors reported by surfaces, the z-order directory, and backends.
///
/// Producer-side errors are always returned to the caller. A window that
/// cannot obtain a buffer should skip the paint rather than retry in a loop;
/// [`is_transient`](Self::is_transient) tells which errors are worth retrying
/// once the underlying condition clears.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A pixel buffer of the requested size could not be allocated.
    #[error("out of memory allocating a {width}x{height} pixel buffer")]
    OutOfMemory {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
    /// A surface size above [`MAX_SURFACE_DIMENSION`](crate::surface::MAX_SURFACE_DIMENSION),
    /// or a placement whose far edge does not fit in screen coordinates.
    #[error("surface geometry {size:?} at {origin:?} is out of range")]
    InvalidGeometry {
        /// Requested top-left corner.
        origin: PixelPoint,
        /// Requested size.
        size: PixelSize,
    },
    /// The surface is being resized; retry after the resize completes.
    #[error("surface resize in progress")]
    ResizeInProgress,
    /// The requested slot is held by another handle; retry later.
    #[error("surface buffer is busy")]
    BufferBusy,
    /// The surface has been removed from the directory.
    #[error("surface has been retired")]
    Retired,
    /// The backend rejected a present call.
    #[error("presentation failed: {0}")]
    PresentationFailure(String),
    /// An internal z-order invariant was violated.
    #[error("z-order directory inconsistent: {0}")]
    DirectoryInconsistent(String),
    /// The surface is not registered in the directory.
    #[error("surface {0:?} is not registered")]
    UnknownSurface(SurfaceId),
    /// The compositor thread is not running or did not answer in time.
    #[error("compositor thread is not running")]
    EngineStopped,
}

impl Error {
    /// Returns `true` for errors that clear on their own and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ResizeInProgress | Self::BufferBusy)
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = core::result::Result<T, Error>;
