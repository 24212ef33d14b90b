//! High-level render operations.
//!
//! These functions combine the crop math, the effect pipeline and the
//! overlay, and call the codec at the edges. Decode, geometry and encode
//! failures are fatal; stage failures are collected in the report.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::backend::{CodecError, Dimensions, ImageCodec};
use super::calculations::{CropGeometry, GeometryError, resolve_crop};
use super::params::{EncodeParams, OutputFormat};
use super::raster::RasterBuffer;
use crate::config::{ConfigError, RenderConfig};
use crate::effects::{Pipeline, PipelineReport, Rng64, StageDegradation, StageName};
use crate::overlay::{TextPlacement, render_timestamp};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not decode {len}-byte source: {source}")]
    Decode {
        len: usize,
        #[source]
        source: CodecError,
    },
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),
    #[error("could not encode {width}x{height} {format}: {source}")]
    Encode {
        format: OutputFormat,
        width: u32,
        height: u32,
        #[source]
        source: CodecError,
    },
}

/// The finished buffer and how it was produced. Not yet encoded.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub buffer: RasterBuffer,
    pub geometry: CropGeometry,
    pub report: PipelineReport,
    /// `None` when the overlay is disabled or could not be drawn.
    pub timestamp: Option<TextPlacement>,
}

/// Encoded bytes ready to hand off, plus what went into them.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPhoto {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub dimensions: Dimensions,
    pub geometry: CropGeometry,
    pub report: PipelineReport,
    pub timestamp: Option<TextPlacement>,
}

/// A validated config with its pipeline built once.
///
/// Holds no per-render state, so one renderer can be shared by any number
/// of threads; each render owns its buffer and random source.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
    pipeline: Pipeline,
}

impl Default for Renderer {
    fn default() -> Self {
        let config = RenderConfig::default();
        let pipeline = Pipeline::retro(&config.effects);
        Self { config, pipeline }
    }
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pipeline = Pipeline::build(&config.effects, &config.pipeline.extra_stages)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn encode_params(&self) -> EncodeParams {
        self.config.output.encode_params()
    }

    /// Crop, scale, run the pipeline and stamp the time onto a decoded source.
    #[tracing::instrument(skip_all, fields(width = source.width(), height = source.height()))]
    pub fn render(
        &self,
        source: &RasterBuffer,
        captured_at: &NaiveDateTime,
        rng: &mut Rng64,
    ) -> Result<RenderResult, RenderError> {
        let (w, h) = source.dimensions();
        let geometry = resolve_crop(f64::from(w), f64::from(h), self.config.output.width)?;
        debug!(
            crop = %format!("{}x{}+{}+{}", geometry.crop_width, geometry.crop_height, geometry.origin_x, geometry.origin_y),
            output = %format!("{}x{}", geometry.output_width, geometry.output_height),
            "resolved crop"
        );

        let mut buffer = source.crop_and_scale(&geometry);
        let mut report = self.pipeline.run(&mut buffer, rng);

        let timestamp = if self.config.timestamp.enabled {
            match render_timestamp(
                &mut buffer,
                captured_at,
                geometry.orientation,
                &self.config.timestamp,
            ) {
                Ok(placement) => Some(placement),
                Err(e) => {
                    warn!(error = %e, "timestamp overlay skipped");
                    report.degraded.push(StageDegradation {
                        stage: StageName::TimestampOverlay,
                        reason: e.to_string(),
                    });
                    None
                }
            }
        } else {
            None
        };

        Ok(RenderResult {
            buffer,
            geometry,
            report,
            timestamp,
        })
    }

    /// Decode `bytes` with `codec`, render, and encode with the configured format.
    #[tracing::instrument(skip_all, fields(len = bytes.len()))]
    pub fn render_bytes(
        &self,
        codec: &impl ImageCodec,
        bytes: &[u8],
        captured_at: &NaiveDateTime,
        rng: &mut Rng64,
    ) -> Result<RenderedPhoto, RenderError> {
        let source = codec.decode(bytes).map_err(|source| RenderError::Decode {
            len: bytes.len(),
            source,
        })?;
        let result = self.render(&source, captured_at, rng)?;

        let params = self.encode_params();
        let (width, height) = result.buffer.dimensions();
        let encoded =
            codec
                .encode(&result.buffer, &params)
                .map_err(|source| RenderError::Encode {
                    format: params.format,
                    width,
                    height,
                    source,
                })?;
        info!(
            width,
            height,
            format = %params.format,
            bytes = encoded.len(),
            degraded = result.report.degraded.len(),
            "rendered"
        );

        Ok(RenderedPhoto {
            bytes: encoded,
            format: params.format,
            dimensions: Dimensions { width, height },
            geometry: result.geometry,
            report: result.report,
            timestamp: result.timestamp,
        })
    }
}
