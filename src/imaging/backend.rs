//! Codec boundary: decoding captured files and encoding the finished render.
//!
//! The [`ImageCodec`] trait is everything the render core asks of the outside
//! world: turn an arbitrary captured file into a [`RasterBuffer`], and turn a
//! finished buffer into compressed bytes. Decoding and encoding themselves are
//! not part of the render math, so they sit behind this seam.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), pure Rust, built on the
//! `image` crate.

use super::params::EncodeParams;
use super::raster::RasterBuffer;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of an encoded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for decode/encode backends.
///
/// Implementations must be `Sync`: batch rendering shares one codec across
/// worker threads.
pub trait ImageCodec: Sync {
    /// Decode a captured file (any supported container) into RGBA8.
    fn decode(&self, bytes: &[u8]) -> Result<RasterBuffer, CodecError>;

    /// Serialize a finished buffer.
    fn encode(&self, buffer: &RasterBuffer, params: &EncodeParams) -> Result<Vec<u8>, CodecError>;
}
