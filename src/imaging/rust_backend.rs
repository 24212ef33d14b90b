//! Pure Rust codec: everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, BMP) | `image::ImageReader` with format sniffing |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` (RGB8) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (RGBA8) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder::new_lossless` (RGBA8) |

use super::backend::{CodecError, ImageCodec};
use super::params::{EncodeParams, OutputFormat};
use super::raster::RasterBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has one of the [supported extensions](supported_input_extensions).
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Codec backed by the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RasterBuffer, CodecError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(RasterBuffer::from_image(img.into_rgba8()))
    }

    fn encode(&self, buffer: &RasterBuffer, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
        if buffer.is_empty() {
            return Err(CodecError::Encode(format!(
                "cannot encode an empty {}x{} frame",
                buffer.width(),
                buffer.height()
            )));
        }
        let (width, height) = buffer.dimensions();
        let mut out = Vec::new();
        let result = match params.format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(buffer.as_image().clone()).into_rgb8();
                JpegEncoder::new_with_quality(&mut out, params.quality.value() as u8).write_image(
                    rgb.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            OutputFormat::Png => PngEncoder::new(&mut out).write_image(
                buffer.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            OutputFormat::Webp => WebPEncoder::new_lossless(&mut out).write_image(
                buffer.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
        };
        result.map_err(|e| CodecError::Encode(format!("{} encode failed: {}", params.format, e)))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::{encode_test_jpeg, gradient_buffer};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp", "bmp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn is_supported_input_ignores_case() {
        assert!(is_supported_input(Path::new("IMG_0001.JPG")));
        assert!(is_supported_input(Path::new("scan.tiff")));
        assert!(!is_supported_input(Path::new("clip.mov")));
        assert!(!is_supported_input(Path::new("noext")));
    }

    #[test]
    fn decode_synthetic_jpeg() {
        let bytes = encode_test_jpeg(200, 150);
        let buffer = RustCodec::new().decode(&bytes).unwrap();
        assert_eq!(buffer.dimensions(), (200, 150));
        assert_eq!(buffer.pixel(0, 0).map(|p| p[3]), Some(255));
    }

    #[test]
    fn decode_garbage_errors() {
        let result = RustCodec::new().decode(b"definitely not an image");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn decode_empty_errors() {
        assert!(RustCodec::new().decode(&[]).is_err());
    }

    #[test]
    fn encode_jpeg_roundtrips_dimensions() {
        let codec = RustCodec::new();
        let buffer = gradient_buffer(120, 96);
        let bytes = codec
            .encode(
                &buffer,
                &EncodeParams {
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(90),
                },
            )
            .unwrap();

        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (120, 96));
    }

    #[test]
    fn lower_quality_produces_smaller_jpeg() {
        let codec = RustCodec::new();
        let buffer = gradient_buffer(160, 128);
        let encode = |q| {
            codec
                .encode(
                    &buffer,
                    &EncodeParams {
                        format: OutputFormat::Jpeg,
                        quality: Quality::new(q),
                    },
                )
                .unwrap()
                .len()
        };
        assert!(encode(20) < encode(95));
    }

    #[test]
    fn encode_png_is_lossless() {
        let codec = RustCodec::new();
        let buffer = gradient_buffer(32, 24);
        let bytes = codec
            .encode(
                &buffer,
                &EncodeParams {
                    format: OutputFormat::Png,
                    quality: Quality::default(),
                },
            )
            .unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), buffer);
    }

    #[test]
    fn encode_webp_is_lossless() {
        let codec = RustCodec::new();
        let buffer = gradient_buffer(32, 24);
        let bytes = codec
            .encode(
                &buffer,
                &EncodeParams {
                    format: OutputFormat::Webp,
                    quality: Quality::default(),
                },
            )
            .unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), buffer);
    }

    #[test]
    fn encode_empty_frame_is_an_error() {
        let codec = RustCodec::new();
        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Webp] {
            let result = codec.encode(
                &RasterBuffer::filled(1, 0, [0, 0, 0, 255]),
                &EncodeParams {
                    format,
                    quality: Quality::default(),
                },
            );
            assert!(matches!(result, Err(CodecError::Encode(m)) if m.contains("empty 1x0")));
        }
    }
}
