//! Capture timestamp burned into the bottom-right corner.
//!
//! Text is drawn with the `font8x8` basic set, each 8x8 glyph scaled to a
//! `font_size` square cell and anti-aliased by 4x4 supersampling. A blurred
//! copy of the glyph coverage is composited first as the drop shadow.

use chrono::NaiveDateTime;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::effects::StageError;
use crate::effects::blur::{MAX_SIGMA, blur_planes};
use crate::effects::composite::over;
use crate::imaging::{Orientation, RasterBuffer};

/// `DD/MM/YY HH:MM`, 24-hour, zero padded.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M";

const SUPERSAMPLE: u32 = 4;

/// Largest accepted `shadow_blur`: twice the largest blur sigma.
pub const MAX_SHADOW_BLUR: f64 = 2.0 * MAX_SIGMA;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("invalid color {0:?}: expected #RGB or #RRGGBB")]
    InvalidColor(String),
    #[error("font size must be greater than zero")]
    ZeroFontSize,
    #[error("shadow blur {0} must be finite and within 0..=128")]
    InvalidShadowBlur(f64),
    #[error("shadow blur failed: {0}")]
    Shadow(#[from] StageError),
}

pub fn format_timestamp(captured_at: &NaiveDateTime) -> String {
    captured_at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse `#RRGGBB` or `#RGB` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Result<[u8; 3], OverlayError> {
    let err = || OverlayError::InvalidColor(s.to_string());
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return Err(err());
    }
    let channel = |h: &str| u8::from_str_radix(h, 16).map_err(|_| err());
    match hex.len() {
        6 => Ok([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        3 => {
            let mut rgb = [0u8; 3];
            for (i, slot) in rgb.iter_mut().enumerate() {
                *slot = channel(&hex[i..=i])? * 17;
            }
            Ok(rgb)
        }
        _ => Err(err()),
    }
}

/// Look and placement of the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimestampOverlayConfig {
    pub enabled: bool,
    pub font_size_landscape: u32,
    pub font_size_portrait: u32,
    /// Distance from the right and bottom edges.
    pub padding: u32,
    pub color: String,
    pub shadow_color: String,
    /// Canvas-style shadow blur; the Gaussian sigma is half of this.
    pub shadow_blur: f64,
}

impl Default for TimestampOverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_size_landscape: 28,
            font_size_portrait: 36,
            padding: 40,
            color: "#F4A261".to_string(),
            shadow_color: "#000000".to_string(),
            shadow_blur: 6.0,
        }
    }
}

impl TimestampOverlayConfig {
    pub fn validate(&self) -> Result<(), OverlayError> {
        parse_hex_color(&self.color)?;
        parse_hex_color(&self.shadow_color)?;
        if self.font_size_landscape == 0 || self.font_size_portrait == 0 {
            return Err(OverlayError::ZeroFontSize);
        }
        if !self.shadow_blur.is_finite() || !(0.0..=MAX_SHADOW_BLUR).contains(&self.shadow_blur) {
            return Err(OverlayError::InvalidShadowBlur(self.shadow_blur));
        }
        Ok(())
    }

    pub fn font_size(&self, orientation: Orientation) -> u32 {
        match orientation {
            Orientation::Landscape => self.font_size_landscape,
            Orientation::Portrait => self.font_size_portrait,
        }
    }
}

/// Where the text landed. `x`/`y` is the top-left of the first cell and may
/// be negative when the text is wider than the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextPlacement {
    pub text: String,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
}

/// Glyph bitmap for `ch`, falling back to `?`.
pub fn glyph_for(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Right edge at `width - padding`, cell bottom at `height - padding`.
pub fn place_text(
    text: &str,
    width: u32,
    height: u32,
    font_size: u32,
    padding: u32,
) -> TextPlacement {
    let chars = text.chars().count() as u32;
    let text_width = chars.saturating_mul(font_size);
    TextPlacement {
        text: text.to_string(),
        x: i64::from(width) - i64::from(padding) - i64::from(text_width),
        y: i64::from(height) - i64::from(padding) - i64::from(font_size),
        width: text_width,
        height: font_size,
        font_size,
    }
}

/// Fraction of pixel `(px, py)` (text-local) covered by lit glyph bits.
fn coverage(glyphs: &[[u8; 8]], font_size: u32, px: i64, py: i64) -> f64 {
    let size = f64::from(font_size);
    let n = f64::from(SUPERSAMPLE);
    let mut hits = 0u32;
    for sy in 0..SUPERSAMPLE {
        let y = py as f64 + (f64::from(sy) + 0.5) / n;
        if y < 0.0 || y >= size {
            continue;
        }
        let row = ((y / size) * 8.0) as usize;
        for sx in 0..SUPERSAMPLE {
            let x = px as f64 + (f64::from(sx) + 0.5) / n;
            if x < 0.0 {
                continue;
            }
            let cell = (x / size) as usize;
            let Some(glyph) = glyphs.get(cell) else {
                continue;
            };
            let col = (((x - cell as f64 * size) / size) * 8.0) as u32;
            if col < 8 && (glyph[row.min(7)] >> col) & 1 == 1 {
                hits += 1;
            }
        }
    }
    f64::from(hits) / (n * n)
}

/// Draw the formatted `captured_at` onto `buffer`.
///
/// Text and shadow are clipped to the buffer. This is the last write to the
/// buffer before encoding.
pub fn render_timestamp(
    buffer: &mut RasterBuffer,
    captured_at: &NaiveDateTime,
    orientation: Orientation,
    config: &TimestampOverlayConfig,
) -> Result<TextPlacement, OverlayError> {
    config.validate()?;
    let color = parse_hex_color(&config.color)?;
    let shadow = parse_hex_color(&config.shadow_color)?;
    let font_size = config.font_size(orientation);
    let text = format_timestamp(captured_at);
    let (w, h) = buffer.dimensions();
    let placement = place_text(&text, w, h, font_size, config.padding);
    let glyphs: Vec<[u8; 8]> = text.chars().map(glyph_for).collect();

    let sigma = config.shadow_blur / 2.0;
    let margin = (sigma * 3.0).ceil() as i64;

    // Working region: text box grown by the shadow reach, clipped to the frame
    let x0 = placement.x.saturating_sub(margin).max(0);
    let y0 = placement.y.saturating_sub(margin).max(0);
    let x1 = placement
        .x
        .saturating_add(i64::from(placement.width))
        .saturating_add(margin)
        .min(i64::from(w));
    let y1 = placement
        .y
        .saturating_add(i64::from(placement.height))
        .saturating_add(margin)
        .min(i64::from(h));
    if x1 <= x0 || y1 <= y0 {
        return Ok(placement);
    }
    let (rw, rh) = ((x1 - x0) as u32, (y1 - y0) as u32);

    let mut mask = Vec::with_capacity(rw as usize * rh as usize);
    for y in y0..y1 {
        for x in x0..x1 {
            mask.push(coverage(&glyphs, font_size, x - placement.x, y - placement.y));
        }
    }
    let shadow_mask = blur_planes(&mask, rw, rh, 1, sigma)?;
    let shadow_rgb = shadow.map(f64::from);
    let text_rgb = color.map(f64::from);

    for (row, y) in (y0..y1).enumerate() {
        for (col, x) in (x0..x1).enumerate() {
            let m = row * rw as usize + col;
            let (a_shadow, a_text) = (shadow_mask[m], mask[m]);
            if a_shadow <= 0.0 && a_text <= 0.0 {
                continue;
            }
            let i = buffer.offset(x as u32, y as u32);
            let px = &mut buffer.as_raw_mut()[i..i + 4];
            let under = over([px[0], px[1], px[2], px[3]], shadow_rgb, a_shadow);
            px.copy_from_slice(&over(under, text_rgb, a_text));
        }
    }
    Ok(placement)
}
