//! Image plumbing around the effect pipeline, in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, TIFF, WebP, BMP) |
//! | **Crop + scale** | `imageops::crop_imm` + `imageops::resize` (Triangle) |
//! | **Encode** | JPEG at quality, PNG, lossless WebP |
//!
//! The module is split into:
//! - **Calculations**: Pure crop and output-size math (unit testable)
//! - **Raster**: [`RasterBuffer`], the RGBA8 buffer every stage works on
//! - **Parameters**: Data structures describing the encode
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: [`Renderer`], combining calculations, effects, overlay and codec

pub mod backend;
mod calculations;
pub mod operations;
mod params;
mod raster;
pub mod rust_backend;

pub use backend::{CodecError, Dimensions, ImageCodec};
pub use calculations::{
    AspectRatio, CropGeometry, GeometryError, MAX_OUTPUT_WIDTH, MIN_OUTPUT_WIDTH, OUTPUT_WIDTH,
    Orientation, check_output_width, output_height, resolve_crop,
};
pub use operations::{RenderError, RenderResult, RenderedPhoto, Renderer};
pub use params::{EncodeParams, OutputFormat, Quality};
pub use raster::{RasterBuffer, clamp_channel};
pub use rust_backend::{RustCodec, is_supported_input, supported_input_extensions};
