//! Straight-alpha source-over compositing.
//!
//! Buffers hold straight (non-premultiplied) RGBA8. Colors going in are
//! `0.0..=255.0` floats; coverage/alpha is `0.0..=1.0`.

use crate::imaging::{RasterBuffer, clamp_channel};

/// Composite `src` at `alpha` over `dst`.
pub fn over(dst: [u8; 4], src: [f64; 3], alpha: f64) -> [u8; 4] {
    let sa = if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if sa <= 0.0 {
        return dst;
    }

    let da = f64::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src[i] * sa + f64::from(dst[i]) * da * (1.0 - sa)) / out_a;
        out[i] = clamp_channel(c);
    }
    out[3] = clamp_channel(out_a * 255.0);
    out
}

/// Bilinear sample of `src` at pixel-center coordinates `(sx, sy)`.
///
/// Texels outside the buffer are transparent, so edges fade out the way a
/// sub-pixel `drawImage` does. Returns straight color and coverage.
pub fn sample_bilinear(src: &RasterBuffer, sx: f64, sy: f64) -> ([f64; 3], f64) {
    let (w, h) = src.dimensions();
    // No tap can land inside the buffer; also keeps the casts below in range
    if !(sx > -1.0 && sx < f64::from(w) && sy > -1.0 && sy < f64::from(h)) {
        return ([0.0; 3], 0.0);
    }
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut premul = [0.0f64; 3];
    let mut alpha = 0.0f64;
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    for (x, y, w) in taps {
        if w == 0.0 || x < 0 || y < 0 {
            continue;
        }
        let Some(px) = src.pixel(x as u32, y as u32) else {
            continue;
        };
        let a = f64::from(px[3]) / 255.0 * w;
        for c in 0..3 {
            premul[c] += f64::from(px[c]) * a;
        }
        alpha += a;
    }

    if alpha <= 0.0 {
        return ([0.0; 3], 0.0);
    }
    (
        [premul[0] / alpha, premul[1] / alpha, premul[2] / alpha],
        alpha,
    )
}

/// Draw `src` translated by `(dx, dy)` over `dst` at `opacity`.
///
/// `src` is read-only and must have the same dimensions as `dst`.
pub fn draw_offset(dst: &mut RasterBuffer, src: &RasterBuffer, dx: f64, dy: f64, opacity: f64) {
    let (w, h) = dst.dimensions();
    for y in 0..h {
        for x in 0..w {
            let (color, coverage) = sample_bilinear(src, f64::from(x) - dx, f64::from(y) - dy);
            if coverage <= 0.0 {
                continue;
            }
            let i = dst.offset(x, y);
            let px = &mut dst.as_raw_mut()[i..i + 4];
            let out = over([px[0], px[1], px[2], px[3]], color, coverage * opacity);
            px.copy_from_slice(&out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_alpha_0_is_noop() {
        let dst = [1, 2, 3, 255];
        assert_eq!(over(dst, [200.0, 200.0, 200.0], 0.0), dst);
    }

    #[test]
    fn over_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        assert_eq!(over(dst, [255.0, 0.0, 0.0], 1.0), [255, 0, 0, 255]);
    }

    #[test]
    fn over_half_black_halves_opaque_dst() {
        assert_eq!(over([200, 100, 50, 255], [0.0; 3], 0.5), [100, 50, 25, 255]);
    }

    #[test]
    fn over_onto_transparent_takes_src_color() {
        assert_eq!(over([0, 0, 0, 0], [100.0, 110.0, 120.0], 0.5), [100, 110, 120, 128]);
    }

    #[test]
    fn sample_on_integer_coords_is_exact() {
        let mut buf = RasterBuffer::filled(3, 3, [0, 0, 0, 255]);
        let i = buf.offset(1, 1);
        buf.as_raw_mut()[i..i + 4].copy_from_slice(&[90, 60, 30, 255]);
        let (c, a) = sample_bilinear(&buf, 1.0, 1.0);
        assert_eq!(c, [90.0, 60.0, 30.0]);
        assert_eq!(a, 1.0);
    }

    #[test]
    fn sample_past_the_edge_loses_coverage() {
        let buf = RasterBuffer::filled(2, 2, [50, 50, 50, 255]);
        let (c, a) = sample_bilinear(&buf, -0.25, 0.0);
        assert!((a - 0.75).abs() < 1e-12);
        assert!((c[0] - 50.0).abs() < 1e-9);
        assert_eq!(sample_bilinear(&buf, -1.0, 0.0).1, 0.0);
    }

    #[test]
    fn sample_far_outside_is_transparent() {
        let buf = RasterBuffer::filled(2, 2, [50, 50, 50, 255]);
        for (sx, sy) in [
            (-1e300, 0.0),
            (1e300, 0.0),
            (0.0, -1e300),
            (0.5, 1e300),
            (f64::NAN, 0.0),
            (9.2e18, 9.2e18),
        ] {
            assert_eq!(sample_bilinear(&buf, sx, sy), ([0.0; 3], 0.0));
        }
    }

    #[test]
    fn draw_offset_far_away_leaves_dst_alone() {
        let src = RasterBuffer::filled(4, 3, [200, 10, 10, 255]);
        let mut dst = RasterBuffer::filled(4, 3, [5, 5, 5, 255]);
        let before = dst.clone();
        draw_offset(&mut dst, &src, -1e300, 1e300, 1.0);
        assert_eq!(dst, before);
    }

    #[test]
    fn draw_offset_of_uniform_image_is_identity_inside() {
        let src = RasterBuffer::filled(10, 8, [77, 66, 55, 255]);
        let mut dst = src.clone();
        draw_offset(&mut dst, &src, 1.7, 0.3, 0.5);
        assert_eq!(dst, src);
    }
}
