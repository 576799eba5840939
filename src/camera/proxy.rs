// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-printer camera streams with lazy start and idle eviction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

use crate::error::CameraError;
use crate::event::DeviceId;
use crate::supervisor::ConfigLookup;

use super::mjpeg;
use super::settings::CameraSettings;
use super::source::{VideoSource, stream_url};
use super::stream::StreamHandle;

/// Camera streams of all printers, keyed by device ID.
///
/// Streams start on first use and stop by themselves once nobody has read
/// a frame for [`CameraSettings::idle_timeout`]. Camera trouble never
/// escalates: every failure is reported as a [`CameraError`].
pub struct StreamProxy {
    configs: Arc<dyn ConfigLookup>,
    source: Arc<dyn VideoSource>,
    settings: CameraSettings,
    runtime: Handle,
    streams: Mutex<HashMap<DeviceId, Arc<StreamHandle>>>,
}

impl StreamProxy {
    /// Creates a proxy.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    #[must_use]
    pub fn new(
        configs: Arc<dyn ConfigLookup>,
        source: Arc<dyn VideoSource>,
        settings: CameraSettings,
    ) -> Self {
        Self {
            configs,
            source,
            settings,
            runtime: Handle::current(),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the crate was built with JPEG encoding support.
    #[must_use]
    pub const fn is_available() -> bool {
        cfg!(feature = "camera")
    }

    /// Returns the proxy's settings.
    #[must_use]
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Returns the camera address of a printer.
    ///
    /// # Errors
    ///
    /// Returns `CameraError::NoStreamUrl` if the printer is unknown or its
    /// configuration lacks the fields to build an address.
    pub fn stream_url(&self, device_id: &DeviceId) -> Result<String, CameraError> {
        let config = self
            .configs
            .printer_config(device_id)
            .ok_or_else(|| CameraError::NoStreamUrl(device_id.clone()))?;
        stream_url(&config)
    }

    /// Returns the printer's active stream, starting a new one if there is
    /// none or the previous one has stopped.
    ///
    /// # Errors
    ///
    /// Returns `CameraError::Unavailable` without the `camera` feature, or
    /// `CameraError::NoStreamUrl` if no address can be built.
    pub fn get_or_start_stream(
        &self,
        device_id: &DeviceId,
    ) -> Result<Arc<StreamHandle>, CameraError> {
        if !Self::is_available() {
            return Err(CameraError::Unavailable);
        }

        let mut streams = self.streams.lock();
        if let Some(handle) = streams.get(device_id)
            && handle.is_active()
        {
            handle.touch();
            return Ok(Arc::clone(handle));
        }

        let url = self.stream_url(device_id)?;
        let handle = Arc::new(StreamHandle::start(
            &self.runtime,
            device_id.clone(),
            url,
            Arc::clone(&self.source),
            self.settings.clone(),
        ));
        streams.insert(device_id.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Returns one JPEG frame, waiting briefly for the first one.
    ///
    /// # Errors
    ///
    /// Returns `CameraError::Unavailable` if no frame arrives within
    /// [`CameraSettings::snapshot_wait`] or the stream stops, or any error
    /// of [`get_or_start_stream`](Self::get_or_start_stream).
    pub async fn get_snapshot(&self, device_id: &DeviceId) -> Result<Bytes, CameraError> {
        let handle = self.get_or_start_stream(device_id)?;
        let deadline = tokio::time::Instant::now() + self.settings.snapshot_wait;

        loop {
            if let Some(frame) = handle.latest_frame() {
                return Ok(frame);
            }
            if !handle.is_active() || tokio::time::Instant::now() >= deadline {
                return Err(CameraError::Unavailable);
            }
            tokio::time::sleep(self.settings.snapshot_poll).await;
        }
    }

    /// Returns the printer's JPEG frames at no more than the frame rate cap.
    ///
    /// The stream ends when the capture loop stops. Each call yields an
    /// independent stream.
    ///
    /// # Errors
    ///
    /// Returns any error of [`get_or_start_stream`](Self::get_or_start_stream).
    pub fn stream_frames(
        &self,
        device_id: &DeviceId,
    ) -> Result<impl Stream<Item = Bytes> + Send + 'static, CameraError> {
        let handle = self.get_or_start_stream(device_id)?;
        let mut ticker = tokio::time::interval(self.settings.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Ok(stream::unfold((handle, ticker), |(handle, mut ticker)| async move {
            loop {
                ticker.tick().await;
                if !handle.is_active() {
                    return None;
                }
                if let Some(frame) = handle.latest_frame() {
                    return Some((frame, (handle, ticker)));
                }
            }
        }))
    }

    /// Returns the printer's frames framed as `multipart/x-mixed-replace`
    /// parts (see [`mjpeg::CONTENT_TYPE`]).
    ///
    /// # Errors
    ///
    /// Returns any error of [`get_or_start_stream`](Self::get_or_start_stream).
    pub fn mjpeg_stream(
        &self,
        device_id: &DeviceId,
    ) -> Result<impl Stream<Item = Bytes> + Send + 'static, CameraError> {
        Ok(self
            .stream_frames(device_id)?
            .map(|frame| mjpeg::part(&frame)))
    }

    /// Stops a printer's stream. Returns `false` if it had none.
    pub async fn stop(&self, device_id: &DeviceId) -> bool {
        let removed = self.streams.lock().remove(device_id);
        match removed {
            Some(handle) => {
                handle.stop(self.settings.stop_timeout).await;
                true
            }
            None => false,
        }
    }

    /// Stops every stream.
    pub async fn stop_all(&self) {
        let handles: Vec<Arc<StreamHandle>> =
            self.streams.lock().drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            handle.stop(self.settings.stop_timeout).await;
        }
    }

    /// Returns the IDs of printers whose capture loop is running.
    #[must_use]
    pub fn active_streams(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self
            .streams
            .lock()
            .iter()
            .filter(|(_, handle)| handle.is_active())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for StreamProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProxy")
            .field("settings", &self.settings)
            .field("streams", &self.streams.lock().len())
            .finish_non_exhaustive()
    }
}
