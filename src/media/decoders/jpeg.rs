// SPDX-License-Identifier: GPL-3.0-only

//! JPEG frame decoding
//!
//! A delivered JPEG frame carries its whole compressed image in a single
//! plane. Decoding produces RGB pixels, which are then rotated clockwise by
//! the frame's rotation so they come out display-upright.

use crate::backends::camera::FrameSink;
use crate::backends::camera::types::{Frame, PixelEncoding};
use crate::errors::{CameraError, DecodeError, DecodeResult};
use image::{ImageFormat, RgbImage, imageops};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

/// Decode a JPEG frame and rotate it display-upright
pub fn decode_upright(frame: &Frame<'_>) -> DecodeResult<RgbImage> {
    if frame.encoding != PixelEncoding::Jpeg {
        return Err(DecodeError::UnsupportedEncoding(frame.encoding));
    }
    let [plane] = frame.planes.as_slice() else {
        return Err(DecodeError::PlaneCount(frame.planes.len()));
    };

    let image = image::load_from_memory_with_format(plane, ImageFormat::Jpeg)?.to_rgb8();
    Ok(rotate_upright(image, frame.rotation))
}

/// Rotate clockwise by a multiple of 90 degrees; other values leave the image as is
pub fn rotate_upright(image: RgbImage, rotation: u32) -> RgbImage {
    match rotation % 360 {
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        _ => image,
    }
}

/// Frame sink that decodes each frame and hands the upright image on
pub struct JpegFrameDecoder<F> {
    on_image: F,
    decoded: AtomicU64,
    failed: AtomicU64,
}

impl<F> JpegFrameDecoder<F>
where
    F: Fn(RgbImage) + Send + Sync,
{
    pub fn new(on_image: F) -> Self {
        Self {
            on_image,
            decoded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn decoded_frames(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    /// Frames skipped because they could not be decoded
    pub fn failed_frames(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl<F> FrameSink for JpegFrameDecoder<F>
where
    F: Fn(RgbImage) + Send + Sync,
{
    fn on_frame(&self, frame: &Frame<'_>) {
        match decode_upright(frame) {
            Ok(image) => {
                self.decoded.fetch_add(1, Ordering::Relaxed);
                trace!(
                    width = image.width(),
                    height = image.height(),
                    rotation = frame.rotation,
                    "Frame decoded"
                );
                (self.on_image)(image);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Skipping frame");
            }
        }
    }

    fn on_error(&self, error: &CameraError) {
        warn!(error = %error, "Camera reported an error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::test_pattern_jpeg;
    use std::sync::Mutex;

    #[test]
    fn test_rotation_swaps_dimensions() {
        let image = RgbImage::new(4, 2);
        assert_eq!(rotate_upright(image.clone(), 90).dimensions(), (2, 4));
        assert_eq!(rotate_upright(image.clone(), 180).dimensions(), (4, 2));
        assert_eq!(rotate_upright(image.clone(), 270).dimensions(), (2, 4));
        assert_eq!(rotate_upright(image, 0).dimensions(), (4, 2));
    }

    #[test]
    fn test_rotate_90_is_clockwise() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        // Top-left moves to top-right
        let rotated = rotate_upright(image, 90);
        assert_eq!(rotated.get_pixel(1, 0), &image::Rgb([255, 0, 0]));
        assert_eq!(rotated.get_pixel(0, 0), &image::Rgb([0, 0, 0]));
    }

    #[test]
    fn test_rejects_multi_plane_frames() {
        let data = [0u8; 4];
        let frame = Frame {
            encoding: PixelEncoding::Jpeg,
            width: 2,
            height: 2,
            rotation: 0,
            planes: vec![&data[..], &data[..]],
        };
        assert!(matches!(
            decode_upright(&frame),
            Err(DecodeError::PlaneCount(2))
        ));
    }

    #[test]
    fn test_rejects_non_jpeg() {
        let data = [0u8; 4];
        let frame = Frame {
            encoding: PixelEncoding::Yuv420,
            width: 2,
            height: 2,
            rotation: 0,
            planes: vec![&data[..]],
        };
        assert!(matches!(
            decode_upright(&frame),
            Err(DecodeError::UnsupportedEncoding(PixelEncoding::Yuv420))
        ));
    }

    #[test]
    fn test_decoder_sink_delivers_upright_image() {
        let jpeg = test_pattern_jpeg(32, 16).unwrap();
        let frame = Frame {
            encoding: PixelEncoding::Jpeg,
            width: 32,
            height: 16,
            rotation: 270,
            planes: vec![&jpeg[..]],
        };

        let sizes = Mutex::new(Vec::new());
        let decoder = JpegFrameDecoder::new(|image: RgbImage| {
            sizes.lock().unwrap().push(image.dimensions());
        });
        decoder.on_frame(&frame);

        assert_eq!(decoder.decoded_frames(), 1);
        assert_eq!(decoder.failed_frames(), 0);
        assert_eq!(*sizes.lock().unwrap(), vec![(16, 32)]);
    }

    #[test]
    fn test_decoder_sink_counts_garbage() {
        let garbage = [1u8, 2, 3];
        let frame = Frame {
            encoding: PixelEncoding::Jpeg,
            width: 1,
            height: 1,
            rotation: 0,
            planes: vec![&garbage[..]],
        };
        let decoder = JpegFrameDecoder::new(|_image: RgbImage| {});
        decoder.on_frame(&frame);
        assert_eq!(decoder.failed_frames(), 1);
    }
}
