//! Clarity and texture: unsharp-mask style local contrast.

use serde::{Deserialize, Serialize};

use super::blur::{check_sigma, gaussian_blur};
use super::{StageError, finite};
use crate::imaging::{RasterBuffer, clamp_channel};

/// Upper bound on low-pass repetitions.
const MAX_PASSES: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClarityTexture {
    pub clarity: f64,
    pub texture: f64,
    /// Standard deviation of the low-pass copy, in pixels.
    pub blur_sigma: f64,
    /// How many times the low-pass blur is run over its own output.
    pub blur_passes: u32,
}

impl Default for ClarityTexture {
    fn default() -> Self {
        Self {
            clarity: 0.19,
            texture: 0.20,
            blur_sigma: 3.0,
            blur_passes: 2,
        }
    }
}

impl ClarityTexture {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("clarity", self.clarity)?;
        finite("texture", self.texture)?;
        check_sigma("blur_sigma", self.blur_sigma)?;
        if self.blur_passes > MAX_PASSES {
            return Err(StageError::invalid(
                "blur_passes",
                format!("{} exceeds {MAX_PASSES}", self.blur_passes),
            ));
        }
        Ok(())
    }

    /// Combined gain applied to the high-pass signal.
    pub fn gain(&self) -> f64 {
        self.clarity * 1.5 + self.texture * 1.2
    }

    /// `buffer` is the sharp read side; the low-pass copy is built before any
    /// write. The high-pass signal is taken from the red channel only and the
    /// same scalar is added to red, green and blue.
    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let mut low = buffer.clone();
        for _ in 0..self.blur_passes {
            low = gaussian_blur(&low, self.blur_sigma)?;
        }
        if low.dimensions() != buffer.dimensions() {
            return Err(StageError::OutOfRange(
                "low-pass copy does not match the buffer".to_string(),
            ));
        }

        let gain = self.gain();
        for (px, lp) in buffer
            .as_raw_mut()
            .chunks_exact_mut(4)
            .zip(low.as_raw().chunks_exact(4))
        {
            let detail = (f64::from(px[0]) - f64::from(lp[0])) * gain;
            for c in &mut px[..3] {
                *c = clamp_channel(f64::from(*c) + detail);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gain() {
        assert!((ClarityTexture::default().gain() - 0.525).abs() < 1e-12);
    }

    #[test]
    fn uniform_buffer_is_unchanged() {
        let mut buf = RasterBuffer::filled(20, 16, [91, 88, 78, 255]);
        ClarityTexture::default().apply(&mut buf).unwrap();
        assert_eq!(buf, RasterBuffer::filled(20, 16, [91, 88, 78, 255]));
    }

    #[test]
    fn red_detail_is_applied_to_all_channels() {
        // A lone red spike on black: green and blue had no detail of their own
        let mut buf = RasterBuffer::filled(15, 15, [0, 40, 40, 255]);
        let i = buf.offset(7, 7);
        buf.as_raw_mut()[i] = 200;

        ClarityTexture::default().apply(&mut buf).unwrap();
        let px = buf.pixel(7, 7).unwrap();
        assert_eq!(px[0], 255);
        assert!(px[1] > 40);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn edge_contrast_increases() {
        let mut buf = RasterBuffer::filled(24, 4, [60, 60, 60, 255]);
        for y in 0..4 {
            for x in 12..24 {
                let i = buf.offset(x, y);
                buf.as_raw_mut()[i..i + 3].copy_from_slice(&[160, 160, 160]);
            }
        }
        ClarityTexture::default().apply(&mut buf).unwrap();
        assert!(buf.pixel(11, 1).unwrap()[0] < 60);
        assert!(buf.pixel(12, 1).unwrap()[0] > 160);
    }

    #[test]
    fn negative_sigma_leaves_buffer_untouched() {
        let mut buf = RasterBuffer::filled(3, 3, [1, 2, 3, 255]);
        let stage = ClarityTexture {
            blur_sigma: -1.0,
            ..ClarityTexture::default()
        };
        assert!(stage.apply(&mut buf).is_err());
        assert_eq!(buf, RasterBuffer::filled(3, 3, [1, 2, 3, 255]));
    }

    #[test]
    fn huge_sigma_is_rejected_without_allocating() {
        let mut buf = RasterBuffer::filled(4, 4, [9, 8, 7, 255]);
        for blur_sigma in [1e15, 1000.0, crate::effects::blur::MAX_SIGMA + 1.0] {
            let stage = ClarityTexture {
                blur_sigma,
                ..ClarityTexture::default()
            };
            assert!(stage.validate().is_err());
            assert!(stage.apply(&mut buf).is_err());
        }
        assert_eq!(buf, RasterBuffer::filled(4, 4, [9, 8, 7, 255]));
    }

    #[test]
    fn too_many_passes_rejected() {
        let stage = ClarityTexture {
            blur_passes: 1_000_000,
            ..ClarityTexture::default()
        };
        assert!(stage.validate().is_err());
    }
}
