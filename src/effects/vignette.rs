//! Radial vignette: a black gradient laid over the frame.

use serde::{Deserialize, Serialize};

use super::composite::over;
use super::{StageError, finite};
use crate::imaging::RasterBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Vignette {
    /// Alpha of the black at the outer radius.
    pub strength: f64,
    /// Inner radius is `min(w, h) / inner_divisor`.
    pub inner_divisor: f64,
    /// Outer radius is `max(w, h) / outer_divisor`.
    pub outer_divisor: f64,
}

impl Default for Vignette {
    fn default() -> Self {
        Self {
            strength: 1.0,
            inner_divisor: 3.0,
            outer_divisor: 1.2,
        }
    }
}

impl Vignette {
    pub fn validate(&self) -> Result<(), StageError> {
        super::unit_interval("strength", self.strength)?;
        for (name, v) in [
            ("inner_divisor", self.inner_divisor),
            ("outer_divisor", self.outer_divisor),
        ] {
            finite(name, v)?;
            if v <= 0.0 {
                return Err(StageError::invalid(name, "must be > 0"));
            }
        }
        Ok(())
    }

    /// `(inner, outer)` radii for a `width x height` frame.
    pub fn radii(&self, width: u32, height: u32) -> (f64, f64) {
        let (w, h) = (f64::from(width), f64::from(height));
        (w.min(h) / self.inner_divisor, w.max(h) / self.outer_divisor)
    }

    /// Gradient alpha at distance `d` from the center.
    pub fn alpha_at(&self, d: f64, inner: f64, outer: f64) -> f64 {
        let t = ((d - inner) / (outer - inner)).clamp(0.0, 1.0);
        self.strength * t
    }

    pub fn apply(&self, buffer: &mut RasterBuffer) -> Result<(), StageError> {
        self.validate()?;
        let (w, h) = buffer.dimensions();
        let (inner, outer) = self.radii(w, h);
        if outer <= inner {
            return Err(StageError::OutOfRange(format!(
                "outer radius {outer:.1} does not exceed inner radius {inner:.1}"
            )));
        }

        let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
        for y in 0..h {
            let dy = f64::from(y) + 0.5 - cy;
            for x in 0..w {
                let dx = f64::from(x) + 0.5 - cx;
                let alpha = self.alpha_at(dx.hypot(dy), inner, outer);
                if alpha <= 0.0 {
                    continue;
                }
                let i = buffer.offset(x, y);
                let px = &mut buffer.as_raw_mut()[i..i + 4];
                let out = over([px[0], px[1], px[2], px[3]], [0.0; 3], alpha);
                px.copy_from_slice(&out);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radii_for_landscape_output() {
        let (inner, outer) = Vignette::default().radii(1200, 960);
        assert_eq!(inner, 320.0);
        assert_eq!(outer, 1000.0);
    }

    #[test]
    fn alpha_ramps_linearly() {
        let v = Vignette::default();
        assert_eq!(v.alpha_at(100.0, 320.0, 1000.0), 0.0);
        assert_eq!(v.alpha_at(660.0, 320.0, 1000.0), 0.5);
        assert_eq!(v.alpha_at(2000.0, 320.0, 1000.0), 1.0);
    }

    #[test]
    fn center_is_untouched_and_corners_darken() {
        let mut buf = RasterBuffer::filled(120, 96, [200, 200, 200, 255]);
        Vignette::default().apply(&mut buf).unwrap();
        assert_eq!(buf.pixel(60, 48), Some([200, 200, 200, 255]));
        let corner = buf.pixel(0, 0).unwrap();
        // d = 76.1, alpha = (76.1 - 32) / 68
        assert!((65..=75).contains(&corner[0]), "corner = {corner:?}");
        assert_eq!(corner[3], 255);
        // Symmetric about the center
        assert_eq!(buf.pixel(0, 0), buf.pixel(119, 95));
    }

    #[test]
    fn zero_strength_is_identity() {
        let mut buf = RasterBuffer::filled(30, 20, [10, 20, 30, 255]);
        Vignette {
            strength: 0.0,
            ..Vignette::default()
        }
        .apply(&mut buf)
        .unwrap();
        assert_eq!(buf, RasterBuffer::filled(30, 20, [10, 20, 30, 255]));
    }

    #[test]
    fn collapsed_gradient_degrades() {
        let mut buf = RasterBuffer::filled(10, 10, [10, 20, 30, 255]);
        let v = Vignette {
            inner_divisor: 1.0,
            outer_divisor: 1.0,
            ..Vignette::default()
        };
        assert!(matches!(v.apply(&mut buf), Err(StageError::OutOfRange(_))));
        assert_eq!(buf, RasterBuffer::filled(10, 10, [10, 20, 30, 255]));
    }
}
