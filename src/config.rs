//! Render configuration module.
//!
//! Handles loading, validating, and merging `retrocam.toml`. Stock defaults
//! are the fixed retro look; a user file overrides just the values it names.
//!
//! ## Config File Location
//!
//! Pass `--config <file>` or place `retrocam.toml` in the working directory.
//! Without either, the stock defaults are used unchanged.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! width = 1200              # Output width in px; height follows the 5:4 / 4:5 frame
//! format = "jpeg"           # jpeg | png | webp (lossless)
//! quality = 90              # JPEG quality (1-100)
//!
//! [effects.exposure_contrast]
//! exposure_ev = -0.64
//! contrast = 0.12
//!
//! [effects.grain]
//! enabled = true            # false renders fully deterministic output
//! amplitude = 30.0
//! blend = 0.5
//!
//! [pipeline]
//! extra_stages = [{ stage = "bloom", after = "vignette" }]
//!
//! [timestamp]
//! enabled = true
//! font_size_landscape = 28
//! font_size_portrait = 36
//! padding = 40
//! color = "#F4A261"
//! shadow_color = "#000000"
//! shadow_blur = 6.0
//!
//! [processing]
//! max_processes = 4         # Max parallel renders (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only soften the vignette
//! [effects.vignette]
//! strength = 0.6
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::effects::{EffectParams, ExtraStage, Pipeline};
use crate::imaging::{EncodeParams, OUTPUT_WIDTH, OutputFormat, Quality, check_output_width};
use crate::overlay::TimestampOverlayConfig;

/// File name picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "retrocam.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Render configuration loaded from `retrocam.toml`.
///
/// All fields have defaults equal to the fixed retro look. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Output frame width and encoding.
    pub output: OutputConfig,
    /// Parameters for every stage, default and optional.
    pub effects: EffectParams,
    /// Optional stages spliced into the default chain.
    pub pipeline: PipelineConfig,
    /// Burned-in capture time.
    pub timestamp: TimestampOverlayConfig,
    /// Parallel batch settings.
    pub processing: ProcessingConfig,
}

impl RenderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_output_width(self.output.width)
            .map_err(|e| ConfigError::Validation(format!("output.width: {e}")))?;
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        self.effects
            .validate()
            .map_err(|(stage, e)| ConfigError::Validation(format!("effects.{stage}: {e}")))?;
        self.timestamp
            .validate()
            .map_err(|e| ConfigError::Validation(format!("timestamp: {e}")))?;
        Pipeline::build(&self.effects, &self.pipeline.extra_stages)
            .map_err(|e| ConfigError::Validation(format!("pipeline.extra_stages: {e}")))?;
        Ok(())
    }
}

/// Output frame and encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Output width in pixels. Height is derived from the orientation.
    pub width: u32,
    pub format: OutputFormat,
    /// Lossy quality (1 = worst, 100 = best). Ignored by PNG and WebP.
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: OUTPUT_WIDTH,
            format: OutputFormat::Jpeg,
            quality: 90,
        }
    }
}

impl OutputConfig {
    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            format: self.format,
            quality: Quality::new(self.quality),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub extra_stages: Vec<ExtraStage>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel renders.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RenderConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<RenderConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// `retrocam.toml` in `dir`, if there is one.
pub fn discover_config(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

/// Load config from `path`, or the stock defaults when `path` is `None`.
///
/// A path that is given but missing is an error.
pub fn load_config(path: Option<&Path>) -> Result<RenderConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(overlay)
}

/// Returns a fully-commented stock `retrocam.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# retrocam configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults: the fixed retro look.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Output width in pixels. Landscape sources get a 5:4 frame (1200x960),
# portrait sources a 4:5 frame (1200x1500).
width = 1200

# jpeg | png | webp (webp is lossless)
format = "jpeg"

# JPEG quality (1 = worst, 100 = best).
quality = 90

# ---------------------------------------------------------------------------
# Effects, in pipeline order
# ---------------------------------------------------------------------------
[effects.exposure_contrast]
# Exposure in stops, then contrast around mid-gray.
exposure_ev = -0.64
contrast = 0.12

[effects.temperature_tint]
# Positive temperature warms; negative tint pushes toward green.
temperature = 6.0
tint = -11.0

[effects.saturation_vibrance]
saturation = 0.15
vibrance = 0.16

[effects.clarity_texture]
clarity = 0.19
texture = 0.2
# Low-pass copy: Gaussian sigma in px, run this many times.
blur_sigma = 3.0
blur_passes = 2

[effects.vignette]
# Alpha of the black at the outer radius.
strength = 1.0
# Inner radius = min(w, h) / inner_divisor, outer = max(w, h) / outer_divisor.
inner_divisor = 3.0
outer_divisor = 1.2

[effects.grain]
# Random per-pixel luminance noise. Disable for reproducible output.
enabled = true
amplitude = 30.0
blend = 0.5

[effects.sepia]
strength = 0.05

[effects.directional_blur]
angle_deg = 3.0
radius = 3.0
steps = 8
opacity = 0.04

# ---------------------------------------------------------------------------
# Optional stages (only run when listed in [pipeline].extra_stages)
# ---------------------------------------------------------------------------
[effects.split_tone]
shadows = [-4.0, 2.0, 8.0]
highlights = [8.0, 4.0, -4.0]
balance = 0.5

[effects.chromatic_aberration]
offset = 1

[effects.bloom]
threshold = 220.0
sigma = 3.0
strength = 0.1

[pipeline]
# Splice optional stages in after a named stage, e.g.
# extra_stages = [{ stage = "bloom", after = "vignette" }]
extra_stages = []

# ---------------------------------------------------------------------------
# Timestamp overlay
# ---------------------------------------------------------------------------
[timestamp]
enabled = true
font_size_landscape = 28
font_size_portrait = 36
# Distance from the right and bottom edges, in px.
padding = 40
color = "#F4A261"
shadow_color = "#000000"
shadow_blur = 6.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel renders in batch mode.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
