// Dynamics - Feed-forward compressor and peak limiter

use super::effect::Effect;
use crate::audio::dsp_utils::{EnvelopeFollower, Frame, db_to_gain, gain_to_db, scale};
use crate::pattern::{EffectKind, EffectParams};

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    pub threshold_db: f32,
    /// Input/output ratio above threshold (1.0 - 20.0)
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 4.0,
            attack_ms: 3.0,
            release_ms: 250.0,
        }
    }
}

impl CompressorParams {
    pub fn from_bag(params: &EffectParams) -> Self {
        let d = Self::default();
        Self {
            threshold_db: params.get_or("threshold_db", d.threshold_db).clamp(-60.0, 0.0),
            ratio: params.get_or("ratio", d.ratio).clamp(1.0, 20.0),
            attack_ms: params.get_or("attack_ms", d.attack_ms).clamp(0.1, 500.0),
            release_ms: params.get_or("release_ms", d.release_ms).clamp(1.0, 2000.0),
        }
    }
}

/// Stereo-linked compressor driven by the louder channel
pub struct Compressor {
    params: CompressorParams,
    detector: EnvelopeFollower,
}

impl Compressor {
    pub fn new(params: CompressorParams, sample_rate: f32) -> Self {
        Self {
            params,
            detector: EnvelopeFollower::new(params.attack_ms, params.release_ms, sample_rate),
        }
    }

    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        Self::new(CompressorParams::from_bag(params), sample_rate)
    }

    /// Gain (linear) applied for a detector level
    fn gain_for(&self, level: f32) -> f32 {
        let level_db = gain_to_db(level);
        let over = level_db - self.params.threshold_db;
        if over <= 0.0 {
            1.0
        } else {
            db_to_gain(-over * (1.0 - 1.0 / self.params.ratio))
        }
    }
}

impl Effect for Compressor {
    fn process(&mut self, input: Frame) -> Frame {
        let level = self.detector.process(input.0.abs().max(input.1.abs()));
        scale(input, self.gain_for(level))
    }

    fn reset(&mut self) {
        self.detector.reset();
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Compressor
    }
}

/// Peak limiter: fast attack, smooth release, hard ceiling
pub struct Limiter {
    ceiling: f32,
    detector: EnvelopeFollower,
}

impl Limiter {
    pub fn new(threshold_db: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            ceiling: db_to_gain(threshold_db.clamp(-60.0, 0.0)),
            detector: EnvelopeFollower::new(0.0, release_ms, sample_rate),
        }
    }

    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        Self::new(
            params.get_or("threshold_db", -3.0),
            params.get_or("release_ms", 50.0).clamp(1.0, 1000.0),
            sample_rate,
        )
    }
}

impl Effect for Limiter {
    fn process(&mut self, input: Frame) -> Frame {
        let level = self.detector.process(input.0.abs().max(input.1.abs()));
        let gain = if level > self.ceiling {
            self.ceiling / level
        } else {
            1.0
        };
        let (l, r) = scale(input, gain);
        (
            l.clamp(-self.ceiling, self.ceiling),
            r.clamp(-self.ceiling, self.ceiling),
        )
    }

    fn reset(&mut self) {
        self.detector.reset();
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Limiter
    }
}
