// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One camera capture loop and its latest-frame slot.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::event::DeviceId;

use super::encode::encode_jpeg;
use super::settings::CameraSettings;
use super::source::{VideoSource, open_with_fallback};

/// Longest uninterrupted sleep of the capture loop, so `stop` is observed
/// quickly even during a long back-off.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// A running (or finished) capture loop for one printer camera.
///
/// The loop keeps only the most recent encoded frame. Reading it through
/// [`latest_frame`](Self::latest_frame) counts as viewer activity and keeps
/// the loop from being evicted as idle.
pub struct StreamHandle {
    device_id: DeviceId,
    url: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    running: AtomicBool,
    frame: Mutex<Option<Bytes>>,
    last_access: Mutex<Instant>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }

    /// Sleeps for `duration` unless the loop is stopped first.
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

impl StreamHandle {
    /// Starts a capture loop for `url` on the blocking thread pool of `runtime`.
    pub(crate) fn start(
        runtime: &Handle,
        device_id: DeviceId,
        url: String,
        source: Arc<dyn VideoSource>,
        settings: CameraSettings,
    ) -> Self {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            frame: Mutex::new(None),
            last_access: Mutex::new(Instant::now()),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let device_id = device_id.clone();
            let url = url.clone();
            runtime.spawn_blocking(move || {
                capture_loop(&shared, source.as_ref(), &url, &device_id, &settings);
            })
        };
        tracing::info!(device_id = %device_id, "Camera stream started");

        Self {
            device_id,
            url,
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Returns the printer this stream belongs to.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the address the stream was started with.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` while the capture loop runs.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.is_running()
    }

    /// Returns the most recent encoded frame and records viewer activity.
    #[must_use]
    pub fn latest_frame(&self) -> Option<Bytes> {
        self.touch();
        self.shared.frame.lock().clone()
    }

    /// Records viewer activity.
    pub fn touch(&self) {
        *self.shared.last_access.lock() = Instant::now();
    }

    /// Stops the capture loop and clears the frame slot.
    ///
    /// Waits at most `timeout` for the loop to exit; a decoder stuck in a
    /// blocking read is left to finish on its own.
    pub async fn stop(&self, timeout: Duration) {
        self.shared.running.store(false, Ordering::Release);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && tokio::time::timeout(timeout, worker).await.is_err()
        {
            tracing::warn!(device_id = %self.device_id, "Camera loop did not stop in time");
        }
        *self.shared.frame.lock() = None;
        tracing::info!(device_id = %self.device_id, "Camera stream stopped");
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("device_id", &self.device_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn capture_loop(
    shared: &Shared,
    source: &dyn VideoSource,
    url: &str,
    device_id: &DeviceId,
    settings: &CameraSettings,
) {
    let (mut capture, url) = match open_with_fallback(source, url, device_id) {
        Ok(opened) => opened,
        Err(_) => {
            shared.running.store(false, Ordering::Release);
            return;
        }
    };

    let frame_interval = settings.frame_interval();

    while shared.is_running() {
        if let Some(idle_timeout) = settings.idle_timeout
            && shared.idle_for() > idle_timeout
        {
            tracing::info!(device_id = %device_id, "Camera stream idle, stopping");
            break;
        }

        let started = Instant::now();
        match capture.read_frame() {
            Ok(frame) => {
                match encode_jpeg(frame, settings.max_width, settings.jpeg_quality) {
                    Ok(jpeg) => *shared.frame.lock() = Some(jpeg),
                    Err(e) => tracing::debug!(device_id = %device_id, error = %e, "Dropping frame"),
                }
            }
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "Camera read failed, reopening");
                shared.pause(settings.read_retry_delay);
                if !shared.is_running() {
                    break;
                }
                match source.open(&url) {
                    Ok(reopened) => capture = reopened,
                    Err(e) => {
                        tracing::warn!(device_id = %device_id, error = %e, "Camera reopen failed");
                    }
                }
                continue;
            }
        }

        let elapsed = started.elapsed();
        if elapsed < frame_interval {
            shared.pause(frame_interval - elapsed);
        }
    }

    shared.running.store(false, Ordering::Release);
}
