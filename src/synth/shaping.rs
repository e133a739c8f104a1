// Waveshaping - Distortion, soft clipper and bit crusher

use super::effect::Effect;
use crate::audio::dsp_utils::{Frame, mix, soft_clip};
use crate::pattern::{EffectKind, EffectParams};

/// tanh overdrive with drive-dependent pre-gain and level compensation
pub struct Distortion {
    pre_gain: f32,
    post_gain: f32,
    mix: f32,
}

impl Distortion {
    /// `drive` in 0..=1
    pub fn new(drive: f32, mix: f32) -> Self {
        let drive = drive.clamp(0.0, 1.0);
        let pre_gain = 1.0 + drive * 49.0;
        Self {
            pre_gain,
            post_gain: 1.0 / pre_gain.tanh(),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    pub fn from_params(params: &EffectParams, _sample_rate: f32) -> Self {
        Self::new(params.get_or("drive", 0.4), params.get_or("mix", 1.0))
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        (x * self.pre_gain).tanh() * self.post_gain
    }
}

impl Effect for Distortion {
    fn process(&mut self, input: Frame) -> Frame {
        let wet = (self.shape(input.0), self.shape(input.1));
        mix(input, wet, self.mix)
    }

    fn reset(&mut self) {}

    fn kind(&self) -> EffectKind {
        EffectKind::Distortion
    }
}

/// Gentle saturation that keeps peaks inside [-1, 1]
pub struct SoftClipper {
    drive: f32,
}

impl SoftClipper {
    pub fn from_params(params: &EffectParams, _sample_rate: f32) -> Self {
        Self {
            drive: params.get_or("drive", 1.5).clamp(0.1, 10.0),
        }
    }
}

impl Effect for SoftClipper {
    fn process(&mut self, input: Frame) -> Frame {
        (
            soft_clip(input.0 * self.drive),
            soft_clip(input.1 * self.drive),
        )
    }

    fn reset(&mut self) {}

    fn kind(&self) -> EffectKind {
        EffectKind::SoftClip
    }
}

/// Amplitude quantiser
pub struct BitCrusher {
    levels: f32,
    mix: f32,
}

impl BitCrusher {
    /// `bits` in 1..=16
    pub fn new(bits: f32, mix: f32) -> Self {
        Self {
            levels: 2f32.powf(bits.clamp(1.0, 16.0).round() - 1.0),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    pub fn from_params(params: &EffectParams, _sample_rate: f32) -> Self {
        Self::new(params.get_or("bits", 4.0), params.get_or("mix", 1.0))
    }

    #[inline]
    fn crush(&self, x: f32) -> f32 {
        (x * self.levels).round() / self.levels
    }
}

impl Effect for BitCrusher {
    fn process(&mut self, input: Frame) -> Frame {
        let wet = (self.crush(input.0), self.crush(input.1));
        mix(input, wet, self.mix)
    }

    fn reset(&mut self) {}

    fn kind(&self) -> EffectKind {
        EffectKind::BitCrusher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distortion_keeps_full_scale_peak() {
        let mut dist = Distortion::new(1.0, 1.0);
        let (l, _) = dist.process((1.0, 1.0));
        assert!((l - 1.0).abs() < 1e-4);
        let (quiet, _) = dist.process((0.1, 0.1));
        // heavy drive pushes small signals up
        assert!(quiet > 0.5);
    }

    #[test]
    fn test_soft_clipper_bounds() {
        let mut clip = SoftClipper::from_params(&EffectParams::new().with("drive", 10.0), 48000.0);
        let (l, r) = clip.process((5.0, -5.0));
        assert!(l <= 1.0 && r >= -1.0);
    }

    #[test]
    fn test_bit_crusher_quantises() {
        // 2 bits: steps of 0.5
        let mut crusher = BitCrusher::new(2.0, 1.0);
        assert_eq!(crusher.process((0.3, -0.8)), (0.5, -1.0));
        assert_eq!(crusher.process((0.2, 0.0)), (0.0, 0.0));
    }
}
