// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `multipart/x-mixed-replace` framing for continuous JPEG streams.

use bytes::{BufMut, Bytes, BytesMut};

/// Multipart boundary between frames.
pub const BOUNDARY: &str = "frame";

/// `Content-Type` header value for an MJPEG response.
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wraps one JPEG image as a multipart part.
///
/// # Examples
///
/// ```
/// use bambu_fleet::camera::mjpeg;
///
/// let part = mjpeg::part(b"JPEG");
/// assert!(part.starts_with(b"--frame\r\n"));
/// assert!(part.ends_with(b"JPEG\r\n"));
/// ```
#[must_use]
pub fn part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut buf = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    buf.put_slice(header.as_bytes());
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}
