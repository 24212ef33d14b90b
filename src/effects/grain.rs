//! Film grain and the random source that drives it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{StageError, finite};
use crate::imaging::{RasterBuffer, clamp_channel};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

static ENTROPY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SplitMix64 generator. Small, fast, and fully determined by its seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rng64 {
    state: u64,
}

impl Rng64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seed from wall clock, process id and a process-wide counter, so two
    /// generators created in the same nanosecond still differ.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let pid = u64::from(std::process::id());
        let count = ENTROPY_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::new(nanos ^ (pid << 32) ^ count.wrapping_mul(GOLDEN_GAMMA))
    }

    /// Independent stream for item `index` of a batch seeded with `seed`.
    pub fn derive(seed: u64, index: u64) -> Self {
        Self::new(seed ^ index.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) * (1.0 / ((1u64 << 53) as f64))
    }
}

/// Luminance noise: one draw per pixel, the same offset on R, G and B.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Grain {
    /// When false the stage is left out of the pipeline entirely.
    pub enabled: bool,
    /// Draws are uniform in `[-amplitude, amplitude]`.
    pub amplitude: f64,
    pub blend: f64,
}

impl Default for Grain {
    fn default() -> Self {
        Self {
            enabled: true,
            amplitude: 30.0,
            blend: 0.5,
        }
    }
}

impl Grain {
    pub fn validate(&self) -> Result<(), StageError> {
        finite("amplitude", self.amplitude)?;
        finite("blend", self.blend)?;
        if self.amplitude < 0.0 {
            return Err(StageError::invalid("amplitude", "must be >= 0"));
        }
        Ok(())
    }

    pub fn apply(&self, buffer: &mut RasterBuffer, rng: &mut Rng64) -> Result<(), StageError> {
        self.validate()?;
        let (amplitude, blend) = (self.amplitude, self.blend);
        for px in buffer.as_raw_mut().chunks_exact_mut(4) {
            let n = (rng.next_f64() * 2.0 - 1.0) * amplitude * blend;
            for c in &mut px[..3] {
                *c = clamp_channel(f64::from(*c) + n);
            }
        }
        Ok(())
    }
}
