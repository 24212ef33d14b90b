//! The RGBA8 pixel buffer that flows through every render stage.
//!
//! [`RasterBuffer`] wraps an `image::RgbaImage`, so channel values are 8-bit
//! by construction. Kernels do their arithmetic in `f64` and write back
//! through [`clamp_channel`], which clamps to `[0, 255]` and rounds. A buffer
//! is created per render and never shared between renders.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::calculations::CropGeometry;

/// Clamp a channel value to `[0, 255]` and round to the nearest integer.
///
/// Ties round to even, which is what a canvas `Uint8ClampedArray` does.
/// NaN maps to 0.
#[inline]
pub fn clamp_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0).round_ties_even() as u8
}

/// A width x height grid of straight-alpha RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    image: RgbaImage,
}

impl RasterBuffer {
    /// A buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(rgba)),
        }
    }

    /// Wrap raw RGBA8 bytes. Returns `None` when `data` is not `width * height * 4` long.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(Self::from_image)
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Pixel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Row-major index of the first byte of pixel `(x, y)`.
    #[inline]
    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width() as usize + x as usize) * 4
    }

    /// Apply `f` to the red, green and blue channels of every pixel.
    ///
    /// Alpha is untouched. Results are clamped and rounded before they are stored.
    pub fn map_rgb(&mut self, f: impl Fn(f64, f64, f64) -> (f64, f64, f64)) {
        for px in self.as_raw_mut().chunks_exact_mut(4) {
            let (r, g, b) = f(f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
            px[0] = clamp_channel(r);
            px[1] = clamp_channel(g);
            px[2] = clamp_channel(b);
        }
    }

    /// Cut out the crop region described by `geometry` and resample it to fill
    /// `output_width x output_height` exactly. No letterboxing.
    ///
    /// Resampling is bilinear, the smoothing a canvas `drawImage` applies.
    pub fn crop_and_scale(&self, geometry: &CropGeometry) -> RasterBuffer {
        let cropped = imageops::crop_imm(
            &self.image,
            geometry.origin_x,
            geometry.origin_y,
            geometry.crop_width,
            geometry.crop_height,
        )
        .to_image();
        let scaled = imageops::resize(
            &cropped,
            geometry.output_width,
            geometry.output_height,
            FilterType::Triangle,
        );
        Self::from_image(scaled)
    }
}
