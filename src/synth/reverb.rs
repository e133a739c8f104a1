// Reverb - Freeverb-style stereo reverb
//
// Based on the Freeverb algorithm by Jezar at Dreampoint (public domain):
// parallel damped comb filters feeding series allpass filters, one bank per
// channel with the right bank detuned by a fixed spread.

use super::effect::Effect;
use crate::audio::dsp_utils::{Frame, flush_denormals_to_zero, mix};
use crate::pattern::{EffectKind, EffectParams};

/// Reverb parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Room size (0.0 - 1.0, where 1.0 is largest)
    pub room_size: f32,
    /// High-frequency damping (0.0 - 1.0)
    pub damping: f32,
    /// Dry/Wet mix (0.0 = fully dry, 1.0 = fully wet)
    pub mix: f32,
}

impl ReverbParams {
    pub fn new(room_size: f32, damping: f32, mix: f32) -> Self {
        Self {
            room_size: room_size.clamp(0.0, 1.0),
            damping: damping.clamp(0.0, 1.0),
            mix: mix.clamp(0.0, 1.0),
        }
    }
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            mix: 0.25,
        }
    }
}

/// Comb filter with a one-pole low-pass in the feedback path
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    damping: f32,
    filter_state: f32,
}

impl CombFilter {
    fn new(size: usize, feedback: f32, damping: f32) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback,
            damping,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filter_state = flush_denormals_to_zero(
            output * (1.0 - self.damping) + self.filter_state * self.damping,
        );
        self.buffer[self.index] = input + self.filter_state * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
        self.filter_state = 0.0;
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.index];
        self.buffer[self.index] = input + delayed * 0.5;
        self.index = (self.index + 1) % self.buffer.len();
        delayed - input
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

/// One channel's filter bank
#[derive(Debug, Clone)]
struct Tank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl Tank {
    fn process(&mut self, input: f32) -> f32 {
        let mut out: f32 = self.combs.iter_mut().map(|c| c.process(input)).sum();
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
    }
}

/// Freeverb-style stereo reverb
///
/// # Example
/// ```
/// use loopstation::synth::effect::Effect;
/// use loopstation::synth::reverb::{Reverb, ReverbParams};
///
/// let mut reverb = Reverb::new(ReverbParams::default(), 44100.0);
/// let (left, right) = reverb.process((0.5, 0.5));
/// assert!(left.is_finite() && right.is_finite());
/// ```
pub struct Reverb {
    params: ReverbParams,
    left: Tank,
    right: Tank,
}

impl Reverb {
    // Freeverb tunings at 44.1 kHz
    const COMB_TUNINGS: [usize; 4] = [1116, 1188, 1277, 1356];
    const ALLPASS_TUNINGS: [usize; 2] = [556, 441];
    const STEREO_SPREAD: usize = 23;

    const SCALE_WET: f32 = 3.0;
    const SCALE_DAMPING: f32 = 0.4;
    const SCALE_ROOM: f32 = 0.28;
    const OFFSET_ROOM: f32 = 0.7;
    const INPUT_GAIN: f32 = 0.015;

    pub fn new(params: ReverbParams, sample_rate: f32) -> Self {
        let scale = sample_rate / 44100.0;
        let feedback = params.room_size * Self::SCALE_ROOM + Self::OFFSET_ROOM;
        let damping = params.damping * Self::SCALE_DAMPING;

        let tank = |spread: usize| Tank {
            combs: Self::COMB_TUNINGS
                .iter()
                .map(|&t| CombFilter::new(((t + spread) as f32 * scale) as usize, feedback, damping))
                .collect(),
            allpasses: Self::ALLPASS_TUNINGS
                .iter()
                .map(|&t| AllpassFilter::new(((t + spread) as f32 * scale) as usize))
                .collect(),
        };

        Self {
            params,
            left: tank(0),
            right: tank(Self::STEREO_SPREAD),
        }
    }

    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        let defaults = ReverbParams::default();
        Self::new(
            ReverbParams::new(
                params.get_or("room_size", defaults.room_size),
                params.get_or("damping", defaults.damping),
                params.get_or("mix", defaults.mix),
            ),
            sample_rate,
        )
    }

    pub fn params(&self) -> ReverbParams {
        self.params
    }
}

impl Effect for Reverb {
    fn process(&mut self, input: Frame) -> Frame {
        let mono = (input.0 + input.1) * Self::INPUT_GAIN;
        let wet_gain = Self::SCALE_WET * 0.25;
        let wet = (
            self.left.process(mono) * wet_gain,
            self.right.process(mono) * wet_gain,
        );
        mix(input, wet, self.params.mix)
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Reverb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_signal_passes_with_zero_mix() {
        let params = ReverbParams::new(0.5, 0.5, 0.0);
        let mut reverb = Reverb::new(params, 44100.0);
        assert_eq!(reverb.process((0.3, -0.2)), (0.3, -0.2));
    }

    #[test]
    fn test_impulse_produces_a_tail() {
        let params = ReverbParams::new(0.8, 0.3, 1.0);
        let mut reverb = Reverb::new(params, 44100.0);
        reverb.process((1.0, 1.0));

        let mut energy = 0.0;
        for _ in 0..44100 {
            let (l, r) = reverb.process((0.0, 0.0));
            assert!(l.is_finite() && r.is_finite());
            energy += l * l + r * r;
        }
        assert!(energy > 0.0);
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut reverb = Reverb::new(ReverbParams::new(0.9, 0.1, 1.0), 44100.0);
        for _ in 0..2000 {
            reverb.process((0.5, 0.5));
        }
        reverb.reset();
        assert_eq!(reverb.process((0.0, 0.0)), (0.0, 0.0));
    }
}
