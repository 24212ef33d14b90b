//! Gaussian and directional blur kernels.

use serde::{Deserialize, Serialize};

use super::StageError;
use super::composite::draw_offset;
use crate::imaging::{RasterBuffer, clamp_channel};

/// Largest Gaussian sigma any stage accepts. Radius tops out at 192 px.
pub const MAX_SIGMA: f64 = 64.0;

/// Largest directional blur travel in pixels, either direction.
pub const MAX_TRAVEL: f64 = 256.0;

/// `sigma` must be finite and within `0..=MAX_SIGMA`.
pub fn check_sigma(name: &'static str, sigma: f64) -> Result<(), StageError> {
    if !sigma.is_finite() || !(0.0..=MAX_SIGMA).contains(&sigma) {
        return Err(StageError::invalid(
            name,
            format!("{sigma} must be finite and within 0..={MAX_SIGMA}"),
        ));
    }
    Ok(())
}

/// Normalized 1-D Gaussian weights for `sigma`, radius `ceil(3 * sigma)`.
pub fn gaussian_kernel(sigma: f64) -> Result<Vec<f64>, StageError> {
    check_sigma("sigma", sigma)?;
    if sigma == 0.0 {
        return Ok(vec![1.0]);
    }

    let r = (sigma * 3.0).ceil() as i64;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = i as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(StageError::invalid("sigma", "gaussian kernel sum is zero"));
    }
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}

/// Separable Gaussian blur over interleaved `f64` planes, edges clamped.
pub fn blur_planes(
    src: &[f64],
    width: u32,
    height: u32,
    channels: usize,
    sigma: f64,
) -> Result<Vec<f64>, StageError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| StageError::OutOfRange("blur buffer size overflow".to_string()))?;
    if src.len() != expected {
        return Err(StageError::OutOfRange(format!(
            "blur expects {expected} samples, got {}",
            src.len()
        )));
    }
    let kernel = gaussian_kernel(sigma)?;
    if kernel.len() == 1 || expected == 0 {
        return Ok(src.to_vec());
    }

    let radius = (kernel.len() / 2) as i64;
    let (w, h) = (i64::from(width), i64::from(height));
    let mut tmp = vec![0.0f64; expected];
    let mut out = vec![0.0f64; expected];

    for y in 0..h {
        for x in 0..w {
            let o = ((y * w + x) as usize) * channels;
            for (ki, &kw) in kernel.iter().enumerate() {
                let sx = (x + ki as i64 - radius).clamp(0, w - 1);
                let i = ((y * w + sx) as usize) * channels;
                for c in 0..channels {
                    tmp[o + c] += kw * src[i + c];
                }
            }
        }
    }
    for y in 0..h {
        for x in 0..w {
            let o = ((y * w + x) as usize) * channels;
            for (ki, &kw) in kernel.iter().enumerate() {
                let sy = (y + ki as i64 - radius).clamp(0, h - 1);
                let i = ((sy * w + x) as usize) * channels;
                for c in 0..channels {
                    out[o + c] += kw * tmp[i + c];
                }
            }
        }
    }
    Ok(out)
}

/// Gaussian-blurred copy of `src` with standard deviation `sigma` pixels.
///
/// All four channels are blurred; the result is rounded back to RGBA8.
pub fn gaussian_blur(src: &RasterBuffer, sigma: f64) -> Result<RasterBuffer, StageError> {
    let (width, height) = src.dimensions();
    let planes: Vec<f64> = src.as_raw().iter().map(|&v| f64::from(v)).collect();
    let blurred = blur_planes(&planes, width, height, 4, sigma)?;
    let bytes = blurred.into_iter().map(clamp_channel).collect();
    RasterBuffer::from_raw(width, height, bytes)
        .ok_or_else(|| StageError::OutOfRange("blurred buffer has the wrong length".to_string()))
}

/// Motion-style smear: translucent copies of the frame stepped along a line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectionalBlur {
    /// Direction of travel in degrees, clockwise from +x (y points down).
    pub angle_deg: f64,
    /// Total travel in pixels.
    pub radius: f64,
    pub steps: u32,
    /// Alpha of each copy.
    pub opacity: f64,
}

impl Default for DirectionalBlur {
    fn default() -> Self {
        Self {
            angle_deg: 3.0,
            radius: 3.0,
            steps: 8,
            opacity: 0.04,
        }
    }
}

impl DirectionalBlur {
    pub fn validate(&self) -> Result<(), StageError> {
        super::finite("angle_deg", self.angle_deg)?;
        super::finite("radius", self.radius)?;
        if self.radius.abs() > MAX_TRAVEL {
            return Err(StageError::invalid(
                "radius",
                format!("{} exceeds {MAX_TRAVEL} px", self.radius),
            ));
        }
        super::unit_interval("opacity", self.opacity)?;
        if self.steps == 0 {
            return Err(StageError::invalid("steps", "must be at least 1"));
        }
        Ok(())
    }

    /// Offset of copy `i` (1-based).
    pub fn offset(&self, i: u32) -> (f64, f64) {
        let angle = self.angle_deg.to_radians();
        let step = self.radius / f64::from(self.steps);
        (
            angle.cos() * step * f64::from(i),
            angle.sin() * step * f64::from(i),
        )
    }

    /// Each copy is drawn from the same pre-stage snapshot and blended
    /// independently at `opacity`; earlier composites are not re-weighted.
    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let snapshot = buffer.clone();
        for i in 1..=self.steps {
            let (dx, dy) = self.offset(i);
            draw_offset(buffer, &snapshot, dx, dy, self.opacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::gradient_buffer;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(3.0).unwrap();
        assert_eq!(k.len(), 19);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(k[0], k[18]);
        assert!(k[9] > k[8]);
    }

    #[test]
    fn kernel_rejects_bad_sigma() {
        assert!(gaussian_kernel(f64::NAN).is_err());
        assert!(gaussian_kernel(-1.0).is_err());
        assert!(gaussian_kernel(MAX_SIGMA + 0.5).is_err());
        assert!(gaussian_kernel(1e15).is_err());
        assert_eq!(gaussian_kernel(MAX_SIGMA).unwrap().len(), 385);
    }

    #[test]
    fn huge_sigma_fails_before_touching_the_buffer() {
        let src = gradient_buffer(6, 5);
        assert!(matches!(
            gaussian_blur(&src, 1e15),
            Err(StageError::InvalidParameter { name: "sigma", .. })
        ));
    }

    #[test]
    fn blur_sigma_0_is_identity() {
        let src = gradient_buffer(5, 4);
        assert_eq!(gaussian_blur(&src, 0.0).unwrap(), src);
    }

    #[test]
    fn blur_constant_image_is_identity() {
        let src = RasterBuffer::filled(12, 9, [10, 20, 30, 255]);
        assert_eq!(gaussian_blur(&src, 3.0).unwrap(), src);
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let mut src = RasterBuffer::filled(9, 9, [0, 0, 0, 255]);
        let i = src.offset(4, 4);
        src.as_raw_mut()[i] = 255;

        let out = gaussian_blur(&src, 1.0).unwrap();
        let lit = out.as_raw().chunks_exact(4).filter(|px| px[0] != 0).count();
        assert!(lit > 1);
        assert!(out.pixel(4, 4).unwrap()[0] < 255);

        let total: u32 = out.as_raw().chunks_exact(4).map(|px| u32::from(px[0])).sum();
        assert!((total as i32 - 255).abs() <= 12);
    }

    #[test]
    fn blur_planes_rejects_wrong_length() {
        assert!(matches!(
            blur_planes(&[0.0; 7], 2, 2, 2, 1.0),
            Err(StageError::OutOfRange(_))
        ));
    }

    #[test]
    fn directional_offsets_follow_the_angle() {
        let blur = DirectionalBlur::default();
        let (dx, dy) = blur.offset(8);
        assert!((dx - 3.0 * 3f64.to_radians().cos()).abs() < 1e-12);
        assert!((dy - 3.0 * 3f64.to_radians().sin()).abs() < 1e-12);
        let (dx1, _) = blur.offset(1);
        assert!((dx1 * 8.0 - dx).abs() < 1e-12);
    }

    #[test]
    fn directional_blur_keeps_uniform_image() {
        let mut buf = RasterBuffer::filled(16, 12, [94, 90, 76, 255]);
        DirectionalBlur::default().apply(&mut buf).unwrap();
        assert_eq!(buf, RasterBuffer::filled(16, 12, [94, 90, 76, 255]));
    }

    #[test]
    fn directional_blur_smears_an_edge_rightwards() {
        // Left half white, right half black
        let mut buf = RasterBuffer::filled(20, 4, [0, 0, 0, 255]);
        for y in 0..4 {
            for x in 0..10 {
                let i = buf.offset(x, y);
                buf.as_raw_mut()[i..i + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        let before = buf.clone();
        DirectionalBlur {
            angle_deg: 0.0,
            radius: 4.0,
            steps: 4,
            opacity: 0.25,
        }
        .apply(&mut buf)
        .unwrap();

        // Just right of the edge picks up light, far right stays black
        assert!(buf.pixel(10, 1).unwrap()[0] > 0);
        assert_eq!(buf.pixel(19, 1).unwrap()[0], 0);
        // The left edge only ever sees copies of white
        assert_eq!(buf.pixel(0, 1), before.pixel(0, 1));
    }

    #[test]
    fn directional_blur_rejects_huge_travel() {
        let mut buf = gradient_buffer(8, 6);
        let before = buf.clone();
        for radius in [-1e300, 1e300, MAX_TRAVEL + 1.0] {
            let blur = DirectionalBlur {
                radius,
                ..DirectionalBlur::default()
            };
            assert!(blur.validate().is_err());
            assert!(blur.apply(&mut buf).is_err());
        }
        assert_eq!(buf, before);
    }

    #[test]
    fn directional_blur_rejects_zero_steps() {
        let mut buf = gradient_buffer(4, 4);
        let before = buf.clone();
        let blur = DirectionalBlur {
            steps: 0,
            ..DirectionalBlur::default()
        };
        assert!(blur.apply(&mut buf).is_err());
        assert_eq!(buf, before);
    }
}
