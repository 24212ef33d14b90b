//! The film-look stage chain.
//!
//! A [`Pipeline`] is an ordered list of [`Effect`]s. The default chain is
//! eight stages in a fixed order; later stages see the cumulative result of
//! earlier ones, so order is part of the look.
//!
//! | # | Stage | Kernel |
//! |---|---|---|
//! | 1 | `exposure_contrast` | [`tone::ExposureContrast`] |
//! | 2 | `temperature_tint` | [`tone::TemperatureTint`] |
//! | 3 | `saturation_vibrance` | [`tone::SaturationVibrance`] |
//! | 4 | `clarity_texture` | [`detail::ClarityTexture`] |
//! | 5 | `vignette` | [`vignette::Vignette`] |
//! | 6 | `grain` | [`grain::Grain`] (skipped when disabled) |
//! | 7 | `sepia` | [`tone::Sepia`] |
//! | 8 | `directional_blur` | [`blur::DirectionalBlur`] |
//!
//! Split tone, chromatic aberration and bloom are optional: they only run
//! when an [`ExtraStage`] places them after one of the stages above.
//!
//! ## Degradation
//!
//! A stage that cannot complete returns a [`StageError`] without having
//! written to the buffer. [`Pipeline::run`] logs it, records a
//! [`StageDegradation`] and carries the previous stage's output forward.

pub mod blur;
pub mod composite;
pub mod detail;
pub mod grain;
pub mod optics;
pub mod tone;
pub mod vignette;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, debug_span, warn};

use crate::imaging::RasterBuffer;
pub use blur::DirectionalBlur;
pub use detail::ClarityTexture;
pub use grain::{Grain, Rng64};
pub use optics::{Bloom, ChromaticAberration};
pub use tone::{ExposureContrast, SaturationVibrance, Sepia, SplitTone, TemperatureTint};
pub use vignette::Vignette;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("buffer access out of range: {0}")]
    OutOfRange(String),
}

impl StageError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        StageError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub(crate) fn finite(name: &'static str, value: f64) -> Result<(), StageError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StageError::invalid(name, format!("{value} is not finite")))
    }
}

pub(crate) fn unit_interval(name: &'static str, value: f64) -> Result<(), StageError> {
    finite(name, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StageError::invalid(name, format!("{value} is outside 0..=1")))
    }
}

/// Stable identifier for every stage, used in config, logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ExposureContrast,
    TemperatureTint,
    SaturationVibrance,
    ClarityTexture,
    Vignette,
    Grain,
    Sepia,
    DirectionalBlur,
    SplitTone,
    ChromaticAberration,
    Bloom,
    /// Not a pixel stage; reported when the overlay could not be drawn.
    TimestampOverlay,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::ExposureContrast => "exposure_contrast",
            StageName::TemperatureTint => "temperature_tint",
            StageName::SaturationVibrance => "saturation_vibrance",
            StageName::ClarityTexture => "clarity_texture",
            StageName::Vignette => "vignette",
            StageName::Grain => "grain",
            StageName::Sepia => "sepia",
            StageName::DirectionalBlur => "directional_blur",
            StageName::SplitTone => "split_tone",
            StageName::ChromaticAberration => "chromatic_aberration",
            StageName::Bloom => "bloom",
            StageName::TimestampOverlay => "timestamp_overlay",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that was skipped, leaving the buffer as the previous stage left it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDegradation {
    pub stage: StageName,
    pub reason: String,
}

impl fmt::Display for StageDegradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}

/// One configured stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ExposureContrast(ExposureContrast),
    TemperatureTint(TemperatureTint),
    SaturationVibrance(SaturationVibrance),
    ClarityTexture(ClarityTexture),
    Vignette(Vignette),
    Grain(Grain),
    Sepia(Sepia),
    DirectionalBlur(DirectionalBlur),
    SplitTone(SplitTone),
    ChromaticAberration(ChromaticAberration),
    Bloom(Bloom),
}

impl Effect {
    pub fn name(&self) -> StageName {
        match self {
            Effect::ExposureContrast(_) => StageName::ExposureContrast,
            Effect::TemperatureTint(_) => StageName::TemperatureTint,
            Effect::SaturationVibrance(_) => StageName::SaturationVibrance,
            Effect::ClarityTexture(_) => StageName::ClarityTexture,
            Effect::Vignette(_) => StageName::Vignette,
            Effect::Grain(_) => StageName::Grain,
            Effect::Sepia(_) => StageName::Sepia,
            Effect::DirectionalBlur(_) => StageName::DirectionalBlur,
            Effect::SplitTone(_) => StageName::SplitTone,
            Effect::ChromaticAberration(_) => StageName::ChromaticAberration,
            Effect::Bloom(_) => StageName::Bloom,
        }
    }

    /// Run the stage over `buffer`. On error the buffer is untouched.
    ///
    /// `rng` is only drawn from by the grain stage.
    pub fn apply(&self, buffer: &mut RasterBuffer, rng: &mut Rng64) -> Result<(), StageError> {
        match self {
            Effect::ExposureContrast(s) => s.apply(buffer),
            Effect::TemperatureTint(s) => s.apply(buffer),
            Effect::SaturationVibrance(s) => s.apply(buffer),
            Effect::ClarityTexture(s) => s.apply(buffer),
            Effect::Vignette(s) => s.apply(buffer),
            Effect::Grain(s) => s.apply(buffer, rng),
            Effect::Sepia(s) => s.apply(buffer),
            Effect::DirectionalBlur(s) => s.apply(buffer),
            Effect::SplitTone(s) => s.apply(buffer),
            Effect::ChromaticAberration(s) => s.apply(buffer),
            Effect::Bloom(s) => s.apply(buffer),
        }
    }
}

/// Stages that exist but are not part of the default chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalStage {
    SplitTone,
    ChromaticAberration,
    Bloom,
}

impl OptionalStage {
    pub const ALL: [OptionalStage; 3] = [
        OptionalStage::SplitTone,
        OptionalStage::ChromaticAberration,
        OptionalStage::Bloom,
    ];

    pub fn name(self) -> StageName {
        match self {
            OptionalStage::SplitTone => StageName::SplitTone,
            OptionalStage::ChromaticAberration => StageName::ChromaticAberration,
            OptionalStage::Bloom => StageName::Bloom,
        }
    }

    fn effect(self, params: &EffectParams) -> Effect {
        match self {
            OptionalStage::SplitTone => Effect::SplitTone(params.split_tone),
            OptionalStage::ChromaticAberration => {
                Effect::ChromaticAberration(params.chromatic_aberration)
            }
            OptionalStage::Bloom => Effect::Bloom(params.bloom),
        }
    }
}

/// Place an optional stage immediately after `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraStage {
    pub stage: OptionalStage,
    pub after: StageName,
}

/// Parameters for every stage, default and optional.
///
/// Defaults are the retro look.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectParams {
    pub exposure_contrast: ExposureContrast,
    pub temperature_tint: TemperatureTint,
    pub saturation_vibrance: SaturationVibrance,
    pub clarity_texture: ClarityTexture,
    pub vignette: Vignette,
    pub grain: Grain,
    pub sepia: Sepia,
    pub directional_blur: DirectionalBlur,
    pub split_tone: SplitTone,
    pub chromatic_aberration: ChromaticAberration,
    pub bloom: Bloom,
}

impl EffectParams {
    /// Check every stage's parameters, naming the first stage that fails.
    pub fn validate(&self) -> Result<(), (StageName, StageError)> {
        let checks: [(StageName, Result<(), StageError>); 10] = [
            (
                StageName::ExposureContrast,
                self.exposure_contrast.validate(),
            ),
            (StageName::TemperatureTint, self.temperature_tint.validate()),
            (
                StageName::SaturationVibrance,
                self.saturation_vibrance.validate(),
            ),
            (StageName::ClarityTexture, self.clarity_texture.validate()),
            (StageName::Vignette, self.vignette.validate()),
            (StageName::Grain, self.grain.validate()),
            (StageName::Sepia, self.sepia.validate()),
            (StageName::DirectionalBlur, self.directional_blur.validate()),
            (StageName::SplitTone, self.split_tone.validate()),
            (StageName::Bloom, self.bloom.validate()),
        ];
        for (stage, result) in checks {
            result.map_err(|e| (stage, e))?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("cannot place {stage} after {after}: {after} is not in the pipeline")]
    MissingAnchor { stage: StageName, after: StageName },
    #[error("{0} is listed more than once in extra_stages")]
    Duplicate(StageName),
}

/// What happened during one [`Pipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub applied: Vec<StageName>,
    pub degraded: Vec<StageDegradation>,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Effect>,
}

impl Pipeline {
    /// The default chain. Grain is left out when `params.grain.enabled` is false.
    pub fn retro(params: &EffectParams) -> Self {
        let mut stages = vec![
            Effect::ExposureContrast(params.exposure_contrast),
            Effect::TemperatureTint(params.temperature_tint),
            Effect::SaturationVibrance(params.saturation_vibrance),
            Effect::ClarityTexture(params.clarity_texture),
            Effect::Vignette(params.vignette),
        ];
        if params.grain.enabled {
            stages.push(Effect::Grain(params.grain));
        }
        stages.push(Effect::Sepia(params.sepia));
        stages.push(Effect::DirectionalBlur(params.directional_blur));
        Self { stages }
    }

    /// The default chain with `extras` spliced in.
    ///
    /// Extras anchored to the same stage keep their listed order. An extra may
    /// anchor to an earlier extra.
    pub fn build(params: &EffectParams, extras: &[ExtraStage]) -> Result<Self, PipelineError> {
        let mut pipeline = Self::retro(params);
        // Anchor each inserted stage was placed after
        let mut anchors: Vec<Option<StageName>> = vec![None; pipeline.stages.len()];

        for (i, extra) in extras.iter().enumerate() {
            let name = extra.stage.name();
            if extras[..i].iter().any(|e| e.stage == extra.stage) {
                return Err(PipelineError::Duplicate(name));
            }
            let Some(anchor_pos) = pipeline.stages.iter().position(|s| s.name() == extra.after)
            else {
                return Err(PipelineError::MissingAnchor {
                    stage: name,
                    after: extra.after,
                });
            };
            let mut at = anchor_pos + 1;
            while anchors.get(at).copied().flatten() == Some(extra.after) {
                at += 1;
            }
            pipeline.stages.insert(at, extra.stage.effect(params));
            anchors.insert(at, Some(extra.after));
        }
        Ok(pipeline)
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(Effect::name).collect()
    }

    /// Run every stage in order. Never fails: stages that error are reported.
    pub fn run(&self, buffer: &mut RasterBuffer, rng: &mut Rng64) -> PipelineReport {
        let mut report = PipelineReport::default();
        for effect in &self.stages {
            let name = effect.name();
            let _span = debug_span!("stage", name = %name).entered();
            match effect.apply(buffer, rng) {
                Ok(()) => {
                    debug!("applied");
                    report.applied.push(name);
                }
                Err(e) => {
                    warn!(stage = %name, error = %e, "stage skipped, carrying previous output forward");
                    report.degraded.push(StageDegradation {
                        stage: name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
