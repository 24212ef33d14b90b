//! Crop and output-size math.
//!
//! All functions here are pure and testable without any pixels or I/O.
//! The render frame is 5:4 for landscape (and square) sources and 4:5 for
//! portrait ones; the crop is centered and always spans the full extent of
//! one source axis.

use serde::Serialize;
use thiserror::Error;

/// Fixed output width in pixels. The height follows from the aspect.
pub const OUTPUT_WIDTH: u32 = 1200;

/// Narrowest output whose landscape height is still at least one pixel.
pub const MIN_OUTPUT_WIDTH: u32 = 2;
pub const MAX_OUTPUT_WIDTH: u32 = 16_384;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid source dimensions {width}x{height}: both must be finite and greater than zero")]
    InvalidSource { width: f64, height: f64 },
    #[error("output width must be greater than zero")]
    ZeroOutputWidth,
    #[error("output width {0} is outside {MIN_OUTPUT_WIDTH}..={MAX_OUTPUT_WIDTH}")]
    OutputWidthOutOfRange(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// `width >= height` counts as landscape, so square sources get 5:4.
    pub fn of(width: f64, height: f64) -> Self {
        if width >= height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Target aspect for this orientation.
    pub fn aspect(self) -> AspectRatio {
        match self {
            Orientation::Landscape => AspectRatio {
                width: 5,
                height: 4,
            },
            Orientation::Portrait => AspectRatio {
                width: 4,
                height: 5,
            },
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        })
    }
}

/// Aspect ratio as whole-number width:height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// How a source bitmap maps into the fixed-aspect output frame.
///
/// Computed once per render and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropGeometry {
    pub source_width: u32,
    pub source_height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub origin_x: u32,
    pub origin_y: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub orientation: Orientation,
}

impl CropGeometry {
    pub fn aspect(&self) -> AspectRatio {
        self.orientation.aspect()
    }
}

/// Output widths that give a non-empty frame in both orientations.
pub fn check_output_width(output_width: u32) -> Result<(), GeometryError> {
    match output_width {
        0 => Err(GeometryError::ZeroOutputWidth),
        MIN_OUTPUT_WIDTH..=MAX_OUTPUT_WIDTH => Ok(()),
        w => Err(GeometryError::OutputWidthOutOfRange(w)),
    }
}

/// Output height for a given width and aspect: `floor(width * h / w)`.
///
/// # Examples
/// ```
/// # use retrocam::imaging::{AspectRatio, output_height};
/// assert_eq!(output_height(1200, AspectRatio { width: 5, height: 4 }), 960);
/// assert_eq!(output_height(1200, AspectRatio { width: 4, height: 5 }), 1500);
/// ```
pub fn output_height(output_width: u32, aspect: AspectRatio) -> u32 {
    (f64::from(output_width) * (f64::from(aspect.height) / f64::from(aspect.width))).floor() as u32
}

/// Resolve the centered crop and the output size for a source of `width x height`.
///
/// When the source is wider than the target aspect the full height is kept
/// and the width is cut; otherwise the full width is kept and the height is
/// cut. Both crop edges are at least one pixel.
///
/// # Errors
/// [`GeometryError::InvalidSource`] when either dimension is zero, negative,
/// NaN or infinite.
pub fn resolve_crop(
    width: f64,
    height: f64,
    output_width: u32,
) -> Result<CropGeometry, GeometryError> {
    if !width.is_finite() || !height.is_finite() || width < 1.0 || height < 1.0 {
        return Err(GeometryError::InvalidSource { width, height });
    }
    check_output_width(output_width)?;

    let (w, h) = (width.floor(), height.floor());
    let orientation = Orientation::of(w, h);
    let aspect = orientation.aspect();
    let target_ratio = aspect.ratio();
    let source_ratio = w / h;

    let (crop_w, crop_h) = if source_ratio > target_ratio {
        // Wider than the frame: keep the full height
        (h * target_ratio, h)
    } else {
        // Taller (or equal): keep the full width
        (w, w / target_ratio)
    };
    let crop_w = crop_w.floor().max(1.0);
    let crop_h = crop_h.floor().max(1.0);

    Ok(CropGeometry {
        source_width: w as u32,
        source_height: h as u32,
        crop_width: crop_w as u32,
        crop_height: crop_h as u32,
        origin_x: ((w - crop_w) / 2.0).floor() as u32,
        origin_y: ((h - crop_h) / 2.0).floor() as u32,
        output_width,
        output_height: output_height(output_width, aspect),
        orientation,
    })
}
