//! Lens imperfections. Neither stage runs unless listed in `pipeline.extra_stages`.

use serde::{Deserialize, Serialize};

use super::blur::{check_sigma, gaussian_blur};
use super::tone::luminance;
use super::{StageError, finite};
use crate::imaging::{RasterBuffer, clamp_channel};

/// Red sampled `offset` px to the right, blue `offset` px to the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChromaticAberration {
    pub offset: i32,
}

impl Default for ChromaticAberration {
    fn default() -> Self {
        Self { offset: 1 }
    }
}

impl ChromaticAberration {
    /// Reads from `buffer`, writes into a copy that replaces it once every
    /// pixel is done. Samples clamp to the edge.
    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        let mut out = buffer.clone();
        let (w, h) = buffer.dimensions();
        let max_x = i64::from(w) - 1;
        let off = i64::from(self.offset);
        for y in 0..h {
            for x in 0..w {
                let rx = (i64::from(x) + off).clamp(0, max_x) as u32;
                let bx = (i64::from(x) - off).clamp(0, max_x) as u32;
                let red = buffer
                    .pixel(rx, y)
                    .ok_or_else(|| StageError::OutOfRange(format!("red tap ({rx}, {y})")))?[0];
                let blue = buffer
                    .pixel(bx, y)
                    .ok_or_else(|| StageError::OutOfRange(format!("blue tap ({bx}, {y})")))?[2];
                let i = out.offset(x, y);
                let px = &mut out.as_raw_mut()[i..i + 4];
                px[0] = red;
                px[2] = blue;
            }
        }
        *buffer = out;
        Ok(())
    }
}

/// Glow around highlights: bright-pass, blur, add back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bloom {
    /// Luminance (0-255) a pixel must exceed to glow.
    pub threshold: f64,
    pub sigma: f64,
    pub strength: f64,
}

impl Default for Bloom {
    fn default() -> Self {
        Self {
            threshold: 220.0,
            sigma: 3.0,
            strength: 0.1,
        }
    }
}

impl Bloom {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("threshold", self.threshold)?;
        check_sigma("sigma", self.sigma)?;
        finite("strength", self.strength)
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let mut bright = buffer.clone();
        let threshold = self.threshold;
        bright.map_rgb(|r, g, b| {
            if luminance(r, g, b) > threshold {
                (r, g, b)
            } else {
                (0.0, 0.0, 0.0)
            }
        });
        let glow = gaussian_blur(&bright, self.sigma)?;

        let strength = self.strength;
        for (px, gl) in buffer
            .as_raw_mut()
            .chunks_exact_mut(4)
            .zip(glow.as_raw().chunks_exact(4))
        {
            for c in 0..3 {
                px[c] = clamp_channel(f64::from(px[c]) + f64::from(gl[c]) * strength);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aberration_shifts_red_and_blue_only() {
        let mut buf = RasterBuffer::filled(4, 1, [0, 0, 0, 255]);
        for x in 0..4u32 {
            let i = buf.offset(x, 0);
            let v = (x as u8 + 1) * 10;
            buf.as_raw_mut()[i..i + 3].copy_from_slice(&[v, v, v]);
        }
        ChromaticAberration::default().apply(&mut buf).unwrap();
        assert_eq!(buf.pixel(0, 0), Some([20, 10, 10, 255]));
        assert_eq!(buf.pixel(1, 0), Some([30, 20, 10, 255]));
        assert_eq!(buf.pixel(3, 0), Some([40, 40, 30, 255]));
    }

    #[test]
    fn zero_offset_is_identity() {
        let mut buf = RasterBuffer::filled(3, 2, [5, 6, 7, 255]);
        ChromaticAberration { offset: 0 }.apply(&mut buf).unwrap();
        assert_eq!(buf, RasterBuffer::filled(3, 2, [5, 6, 7, 255]));
    }

    #[test]
    fn bloom_ignores_dark_frames() {
        let mut buf = RasterBuffer::filled(10, 10, [100, 100, 100, 255]);
        Bloom::default().apply(&mut buf).unwrap();
        assert_eq!(buf, RasterBuffer::filled(10, 10, [100, 100, 100, 255]));
    }

    #[test]
    fn bloom_brightens_around_highlights() {
        let mut buf = RasterBuffer::filled(21, 21, [50, 50, 50, 255]);
        for y in 8..13 {
            for x in 8..13 {
                let i = buf.offset(x, y);
                buf.as_raw_mut()[i..i + 3].copy_from_slice(&[250, 250, 250]);
            }
        }
        Bloom::default().apply(&mut buf).unwrap();
        assert!(buf.pixel(6, 10).unwrap()[0] > 50);
        assert_eq!(buf.pixel(0, 0), Some([50, 50, 50, 255]));
    }

    #[test]
    fn bloom_huge_sigma_degrades_cleanly() {
        let mut buf = RasterBuffer::filled(5, 5, [250, 250, 250, 255]);
        let bloom = Bloom {
            sigma: 1e15,
            ..Bloom::default()
        };
        assert!(bloom.validate().is_err());
        assert!(bloom.apply(&mut buf).is_err());
        assert_eq!(buf, RasterBuffer::filled(5, 5, [250, 250, 250, 255]));
    }
}
