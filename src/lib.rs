//! # retrocam
//!
//! Gives a freshly captured photo the look of a cheap disposable film camera:
//! a fixed crop, a fixed chain of film-stock effects, and the capture time
//! burned into the bottom-right corner in orange bitmap text.
//!
//! # Render Flow
//!
//! ```text
//! bytes ─decode─▶ RasterBuffer ─crop+scale─▶ 1200x960 / 1200x1500
//!       ─stages─▶ exposure … directional blur ─overlay─▶ timestamp ─encode─▶ JPEG q90
//! ```
//!
//! Geometry is computed once from the source dimensions
//! ([`imaging::resolve_crop`]); everything after it works on one exclusively
//! owned RGBA8 buffer. Stages run strictly in order. A stage that rejects its
//! parameters is skipped and recorded in the [`effects::PipelineReport`]
//! instead of failing the render; decode, geometry and encode errors are fatal.
//!
//! # Determinism
//!
//! Grain is the only random stage. It draws from an explicit
//! [`effects::Rng64`] handed to each render, so a fixed seed reproduces a
//! photo byte-for-byte and renders never share random state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Crop math, raster buffer, codec seam, and the [`imaging::Renderer`] |
//! | [`effects`] | The stage chain: tone, detail, vignette, grain, blur, optional extras |
//! | [`overlay`] | Timestamp formatting, placement and glyph rendering |
//! | [`config`] | `retrocam.toml` loading, merging over stock defaults, validation |
//! | [`process`] | Batch rendering of a directory with a JSON manifest |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Example
//!
//! ```
//! use retrocam::effects::Rng64;
//! use retrocam::imaging::{RasterBuffer, Renderer};
//!
//! let source = RasterBuffer::filled(400, 300, [128, 128, 128, 255]);
//! let captured_at = chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
//!     .and_then(|d| d.and_hms_opt(14, 7, 0))
//!     .unwrap();
//!
//! let result = Renderer::default()
//!     .render(&source, &captured_at, &mut Rng64::new(42))
//!     .unwrap();
//! assert_eq!(result.buffer.dimensions(), (1200, 960));
//! assert_eq!(result.timestamp.unwrap().text, "05/03/24 14:07");
//! ```

pub mod config;
pub mod effects;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod overlay;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
