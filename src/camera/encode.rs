// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame downscaling and JPEG encoding.

use bytes::Bytes;

use crate::error::CameraError;

use super::source::Frame;

/// Returns the height that keeps the aspect ratio at `target_width`.
#[must_use]
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height;
    }
    let scaled = u64::from(height) * u64::from(target_width) / u64::from(width);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Downscales `frame` to at most `max_width` and encodes it as JPEG.
///
/// # Errors
///
/// Returns `CameraError::EncodeFailed` if the buffer does not match the
/// frame dimensions or the encoder fails.
#[cfg(feature = "camera")]
pub fn encode_jpeg(frame: Frame, max_width: u32, quality: u8) -> Result<Bytes, CameraError> {
    use image::RgbImage;
    use image::codecs::jpeg::JpegEncoder;
    use image::imageops::{self, FilterType};

    let Frame {
        width,
        height,
        data,
    } = frame;
    let mut image = RgbImage::from_raw(width, height, data).ok_or_else(|| {
        CameraError::EncodeFailed(format!("buffer does not hold a {width}x{height} RGB frame"))
    })?;

    if max_width > 0 && image.width() > max_width {
        let target_height = scaled_height(image.width(), image.height(), max_width);
        image = imageops::resize(&image, max_width, target_height, FilterType::Triangle);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&image)
        .map_err(|e| CameraError::EncodeFailed(e.to_string()))?;
    Ok(Bytes::from(out))
}

/// Without the `camera` feature there is no encoder.
///
/// # Errors
///
/// Always returns `CameraError::Unavailable`.
#[cfg(not(feature = "camera"))]
pub fn encode_jpeg(_frame: Frame, _max_width: u32, _quality: u8) -> Result<Bytes, CameraError> {
    Err(CameraError::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_height_keeps_aspect_ratio() {
        assert_eq!(scaled_height(1920, 1080, 1280), 720);
        assert_eq!(scaled_height(2560, 1440, 1280), 720);
        assert_eq!(scaled_height(4000, 1, 1280), 1);
        assert_eq!(scaled_height(0, 50, 1280), 50);
    }

    #[cfg(feature = "camera")]
    #[test]
    fn encodes_jpeg_and_downscales() {
        let frame = Frame::solid(64, 32, [200, 10, 10]);
        let jpeg = encode_jpeg(frame, 16, 70).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }

    #[cfg(feature = "camera")]
    #[test]
    fn rejects_short_buffer() {
        let frame = Frame {
            width: 10,
            height: 10,
            data: vec![0; 5],
        };
        assert!(matches!(
            encode_jpeg(frame, 1280, 70),
            Err(CameraError::EncodeFailed(_))
        ));
    }
}
