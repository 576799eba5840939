// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Camera stream settings.

use std::time::Duration;

/// Tuning of the camera capture loops.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bambu_fleet::camera::CameraSettings;
///
/// let settings = CameraSettings::default()
///     .with_fps_cap(10)
///     .with_idle_timeout(None);
///
/// assert_eq!(settings.frame_interval(), Duration::from_millis(100));
/// assert_eq!(settings.idle_timeout, None);
/// ```
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Upper bound on captured and streamed frames per second.
    pub fps_cap: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Frames wider than this are downscaled, keeping the aspect ratio.
    pub max_width: u32,
    /// A stream nobody read from for this long stops itself. `None` keeps
    /// streams running until stopped explicitly.
    pub idle_timeout: Option<Duration>,
    /// Pause before reopening the source after a failed read.
    pub read_retry_delay: Duration,
    /// How long a snapshot request waits for the first frame.
    pub snapshot_wait: Duration,
    /// Polling interval while waiting for a snapshot frame.
    pub snapshot_poll: Duration,
    /// Bound on waiting for a capture loop to exit.
    pub stop_timeout: Duration,
}

impl CameraSettings {
    /// Sets the frame rate cap. Zero is treated as one frame per second.
    #[must_use]
    pub fn with_fps_cap(mut self, fps: u32) -> Self {
        self.fps_cap = fps;
        self
    }

    /// Sets the JPEG quality, clamped to 1-100.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Sets the maximum frame width.
    #[must_use]
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    /// Sets or disables the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the pause after a failed read.
    #[must_use]
    pub fn with_read_retry_delay(mut self, delay: Duration) -> Self {
        self.read_retry_delay = delay;
        self
    }

    /// Sets how long snapshot requests wait for a frame.
    #[must_use]
    pub fn with_snapshot_wait(mut self, wait: Duration) -> Self {
        self.snapshot_wait = wait;
        self
    }

    /// Returns the minimum time between two frames.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps_cap.max(1)
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fps_cap: 15,
            jpeg_quality: 70,
            max_width: 1280,
            idle_timeout: Some(Duration::from_secs(60)),
            read_retry_delay: Duration::from_secs(2),
            snapshot_wait: Duration::from_secs(2),
            snapshot_poll: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(5),
        }
    }
}
