// Effect - Common interface for stereo effect processors
//
// Every effect kind a track can carry maps to exactly one processor here.
// Processors work frame by frame and must not allocate in `process()`.

use super::delay::{Delay, PingPongDelay};
use super::dynamics::{Compressor, Limiter};
use super::modulation::{Chorus, Flanger, PitchShifter};
use super::reverb::Reverb;
use super::shaping::{BitCrusher, Distortion, SoftClipper};
use super::tone::{Eq3, StereoWidth};
use crate::audio::dsp_utils::Frame;
use crate::pattern::{EffectKind, EffectParams};

/// Stereo effect processor
///
/// # Real-time Safety
/// Implementations must be real-time safe:
/// - No allocations in `process()`
/// - No blocking operations
pub trait Effect: Send {
    /// Process one stereo frame
    fn process(&mut self, input: Frame) -> Frame;

    /// Clear delay lines, filter states and detectors
    fn reset(&mut self);

    /// Which catalogue entry this processor implements
    fn kind(&self) -> EffectKind;

    /// Effect latency in samples
    fn latency_samples(&self) -> usize {
        0
    }
}

/// Build the processor for `kind`, reading its parameters from `params`.
///
/// Missing or non-finite parameters fall back to the kind's defaults and
/// out-of-range values are clamped, so this never fails.
///
/// # Example
/// ```
/// use loopstation::pattern::{EffectKind, EffectParams};
/// use loopstation::synth::effect::build_effect;
///
/// let mut delay = build_effect(EffectKind::Delay, &EffectParams::new(), 48000.0);
/// let out = delay.process((0.5, 0.5));
/// assert_eq!(delay.kind(), EffectKind::Delay);
/// assert!(out.0.is_finite());
/// ```
pub fn build_effect(kind: EffectKind, params: &EffectParams, sample_rate: f32) -> Box<dyn Effect> {
    match kind {
        EffectKind::Delay => Box::new(Delay::from_params(params, sample_rate)),
        EffectKind::Echo => Box::new(PingPongDelay::from_params(params, sample_rate)),
        EffectKind::Reverb => Box::new(Reverb::from_params(params, sample_rate)),
        EffectKind::Chorus => Box::new(Chorus::from_params(params, sample_rate)),
        EffectKind::Flanger => Box::new(Flanger::from_params(params, sample_rate)),
        EffectKind::PitchShift => Box::new(PitchShifter::from_params(params, sample_rate)),
        EffectKind::Distortion => Box::new(Distortion::from_params(params, sample_rate)),
        EffectKind::BitCrusher => Box::new(BitCrusher::from_params(params, sample_rate)),
        EffectKind::SoftClip => Box::new(SoftClipper::from_params(params, sample_rate)),
        EffectKind::Compressor => Box::new(Compressor::from_params(params, sample_rate)),
        EffectKind::Limiter => Box::new(Limiter::from_params(params, sample_rate)),
        EffectKind::StereoWidth => Box::new(StereoWidth::from_params(params, sample_rate)),
        EffectKind::Eq3 => Box::new(Eq3::from_params(params, sample_rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_builds_matching_processor() {
        for kind in EffectKind::ALL {
            let mut effect = build_effect(kind, &EffectParams::new(), 44100.0);
            assert_eq!(effect.kind(), kind);

            for i in 0..2048 {
                let x = if i % 64 == 0 { 0.8 } else { 0.0 };
                let (l, r) = effect.process((x, x));
                assert!(l.is_finite() && r.is_finite(), "{kind:?} produced NaN");
            }
            effect.reset();
        }
    }

    #[test]
    fn test_silence_in_silence_out_after_reset() {
        for kind in EffectKind::ALL {
            let mut effect = build_effect(kind, &EffectParams::new(), 44100.0);
            for _ in 0..512 {
                effect.process((0.7, -0.7));
            }
            effect.reset();
            let (l, r) = effect.process((0.0, 0.0));
            assert!(l.abs() < 1e-6 && r.abs() < 1e-6, "{kind:?} kept state");
        }
    }
}
