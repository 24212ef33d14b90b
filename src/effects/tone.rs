//! Per-pixel color kernels.
//!
//! Every kernel here reads a pixel, does its math in `f64` and writes the
//! clamped, rounded result back before the next pixel is read. None of them
//! look at neighbours, so they run in place.

use serde::{Deserialize, Serialize};

use super::{StageError, finite};
use crate::imaging::RasterBuffer;

/// Rec. 709 luma on a `0..=255` scale.
pub fn luminance(r: f64, g: f64, b: f64) -> f64 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Exposure in stops, then contrast around mid-gray 128.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExposureContrast {
    pub exposure_ev: f64,
    pub contrast: f64,
}

impl Default for ExposureContrast {
    fn default() -> Self {
        Self {
            exposure_ev: -0.64,
            contrast: 0.12,
        }
    }
}

impl ExposureContrast {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("exposure_ev", self.exposure_ev)?;
        finite("contrast", self.contrast)
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let mul = self.exposure_ev.exp2();
        let k = 1.0 + self.contrast;
        let f = |v: f64| (v * mul - 128.0) * k + 128.0;
        buffer.map_rgb(|r, g, b| (f(r), f(g), f(b)));
        Ok(())
    }
}

/// Warm/cool and green/magenta shifts, additive per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemperatureTint {
    /// Positive warms (more red, less blue).
    pub temperature: f64,
    /// Negative pushes toward green.
    pub tint: f64,
}

impl Default for TemperatureTint {
    fn default() -> Self {
        Self {
            temperature: 6.0,
            tint: -11.0,
        }
    }
}

impl TemperatureTint {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("temperature", self.temperature)?;
        finite("tint", self.tint)
    }

    /// `(red, green, blue)` offsets added to every pixel.
    pub fn shifts(&self) -> (f64, f64, f64) {
        let red = self.temperature * 1.2;
        let blue = -self.temperature;
        let green = -self.tint;
        let magenta = self.tint * 0.6;
        (red - magenta, green, blue - magenta)
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let (dr, dg, db) = self.shifts();
        buffer.map_rgb(|r, g, b| (r + dr, g + dg, b + db));
        Ok(())
    }
}

/// Uniform saturation boost plus vibrance, which favours dull pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaturationVibrance {
    pub saturation: f64,
    pub vibrance: f64,
}

impl Default for SaturationVibrance {
    fn default() -> Self {
        Self {
            saturation: 0.15,
            vibrance: 0.16,
        }
    }
}

impl SaturationVibrance {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("saturation", self.saturation)?;
        finite("vibrance", self.vibrance)
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let sat_factor = 1.0 + self.saturation;
        let vibrance = self.vibrance;
        buffer.map_rgb(|r, g, b| {
            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            let sat = if max == 0.0 { 0.0 } else { (max - min) / max };
            let k = sat_factor * (1.0 + vibrance * (1.0 - sat));
            let avg = (r + g + b) / 3.0;
            (
                avg + (r - avg) * k,
                avg + (g - avg) * k,
                avg + (b - avg) * k,
            )
        });
        Ok(())
    }
}

/// Partial blend toward the classic sepia matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Sepia {
    pub strength: f64,
}

impl Default for Sepia {
    fn default() -> Self {
        Self { strength: 0.05 }
    }
}

impl Sepia {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("strength", self.strength)
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let s = self.strength;
        buffer.map_rgb(|r, g, b| {
            let tr = 0.393 * r + 0.769 * g + 0.189 * b;
            let tg = 0.349 * r + 0.686 * g + 0.168 * b;
            let tb = 0.272 * r + 0.534 * g + 0.131 * b;
            (r + (tr - r) * s, g + (tg - g) * s, b + (tb - b) * s)
        });
        Ok(())
    }
}

/// Separate RGB offsets for shadows and highlights, split on luminance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitTone {
    pub shadows: [f64; 3],
    pub highlights: [f64; 3],
    /// Normalized luminance below which a pixel counts as shadow.
    pub balance: f64,
}

impl Default for SplitTone {
    fn default() -> Self {
        Self {
            shadows: [-4.0, 2.0, 8.0],
            highlights: [8.0, 4.0, -4.0],
            balance: 0.5,
        }
    }
}

impl SplitTone {
    pub fn validate(&self) -> Result<(), StageError> {
        for v in self.shadows {
            finite("shadows", v)?;
        }
        for v in self.highlights {
            finite("highlights", v)?;
        }
        super::unit_interval("balance", self.balance)
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let (shadows, highlights, balance) = (self.shadows, self.highlights, self.balance);
        buffer.map_rgb(|r, g, b| {
            let t = if luminance(r, g, b) / 255.0 < balance {
                shadows
            } else {
                highlights
            };
            (r + t[0], g + t[1], b + t[2])
        });
        Ok(())
    }
}
