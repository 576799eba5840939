// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Camera stream proxy.
//!
//! Printers expose their chamber camera as an RTSP(S) stream. The
//! [`StreamProxy`] turns it into what a web front end can display: single
//! JPEG snapshots and a continuous MJPEG stream.
//!
//! Each printer gets at most one capture loop, running on tokio's blocking
//! pool. The loop keeps only the newest frame (downscaled to
//! [`CameraSettings::max_width`] and JPEG encoded) and stops by itself when
//! no viewer has asked for a frame within [`CameraSettings::idle_timeout`].
//!
//! Decoding is delegated to a host-supplied [`VideoSource`]. JPEG encoding
//! needs the `camera` feature (on by default); without it every camera
//! operation reports [`CameraError::Unavailable`](crate::error::CameraError).

mod encode;
pub mod mjpeg;
mod proxy;
mod settings;
mod source;
mod stream;

pub use encode::{encode_jpeg, scaled_height};
pub use proxy::StreamProxy;
pub use settings::CameraSettings;
pub use source::{CAMERA_PORT, Frame, VideoCapture, VideoSource, fallback_url, stream_url};
pub use stream::StreamHandle;
