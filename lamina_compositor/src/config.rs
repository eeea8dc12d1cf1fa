// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-start configuration.
//!
//! Every field has a documented default, so an empty TOML document (or
//! [`CompositorConfig::default`]) is a valid configuration:
//!
//! ```toml
//! enabled = true
//! pool_capacity = 16
//! refresh_interval_ns = 16666667
//! max_present_failures = 3
//! pool_trim_horizon = 120
//! background = [0, 0, 0, 255]
//! ```

use std::path::Path;
use std::time::Duration;

use lamina_core::pixel::Pixel;
use serde::{Deserialize, Serialize};

/// Errors loading a [`CompositorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("reading compositor config: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid TOML or has fields of the wrong type.
    #[error("parsing compositor config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value the compositor cannot run with.
    #[error("invalid compositor config: {0}")]
    Invalid(&'static str),
}

/// Compositor settings, fixed at process start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositorConfig {
    /// Composite surfaces (`true`, the default) or start directly on the
    /// uncomposited fallback path that draws only the topmost surface.
    pub enabled: bool,
    /// Maximum number of idle pixel buffers kept for reuse. Default 16.
    /// Zero disables pooling.
    pub pool_capacity: usize,
    /// Idle timeout of the compositor thread and upper bound on a
    /// vertical-blank wait, in nanoseconds. Default 16 666 667 (60 Hz).
    pub refresh_interval_ns: u64,
    /// Consecutive rejected presents before composition is disabled.
    /// Default 3.
    pub max_present_failures: u32,
    /// Frames an idle pooled buffer survives before it is freed. Default 120.
    pub pool_trim_horizon: u64,
    /// Straight RGBA colour painted where no surface covers the screen.
    /// Default opaque black.
    pub background: [u8; 4],
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pool_capacity: 16,
            refresh_interval_ns: 16_666_667,
            max_present_failures: 3,
            pool_trim_horizon: 120,
            background: [0, 0, 0, 255],
        }
    }
}

impl CompositorConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ns == 0 {
            return Err(ConfigError::Invalid("refresh_interval_ns must be non-zero"));
        }
        if self.max_present_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_present_failures must be at least 1",
            ));
        }
        Ok(())
    }

    /// Refresh interval as a [`Duration`].
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_nanos(self.refresh_interval_ns)
    }

    /// Background colour as a premultiplied pixel.
    #[must_use]
    pub fn background_pixel(&self) -> Pixel {
        let [r, g, b, a] = self.background;
        Pixel::from_straight_rgba(r, g, b, a)
    }
}
