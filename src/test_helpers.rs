//! Shared test utilities for the retrocam test suite.
//!
//! Synthetic buffers and encoded images, so tests never depend on fixture
//! files on disk.

use crate::imaging::RasterBuffer;
use chrono::{NaiveDate, NaiveDateTime};

// =========================================================================
// Buffers
// =========================================================================

/// Opaque gray buffer with every channel set to `value`.
pub fn uniform_buffer(width: u32, height: u32, value: u8) -> RasterBuffer {
    RasterBuffer::filled(width, height, [value, value, value, 255])
}

/// Opaque buffer where every pixel differs from its neighbours.
///
/// Red ramps left to right, green top to bottom, blue on the diagonal, so
/// crops and offsets show up as value changes.
pub fn gradient_buffer(width: u32, height: u32) -> RasterBuffer {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = ((x + y) % 256) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    RasterBuffer::from_raw(width, height, data).unwrap()
}

// =========================================================================
// Encoded images
// =========================================================================

/// A real JPEG of [`gradient_buffer`], for exercising the actual decoder.
pub fn encode_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let rgb = image::DynamicImage::ImageRgba8(gradient_buffer(width, height).into_image()).to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 95);
    encoder.encode_image(&rgb).unwrap();
    bytes
}

// =========================================================================
// Time
// =========================================================================

/// 2024-03-05 14:07:33, stamped as `05/03/24 14:07`.
pub fn fixed_instant() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(14, 7, 33)
        .unwrap()
}
