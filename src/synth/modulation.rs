// Modulated delays - LFO, chorus, flanger and delay-line pitch shifter

use super::delay::DelayLine;
use super::effect::Effect;
use super::oscillator::{SimpleOscillator, WaveformType};
use crate::audio::dsp_utils::{Frame, mix};
use crate::pattern::{EffectKind, EffectParams};

/// Low frequency oscillator returning values in [-1, 1]
#[derive(Debug, Clone)]
pub struct Lfo {
    oscillator: SimpleOscillator,
}

impl Lfo {
    /// `rate` in Hz, clamped to 0.01..=20
    pub fn new(rate: f32, sample_rate: f32) -> Self {
        let mut oscillator = SimpleOscillator::new(WaveformType::Sine, sample_rate);
        oscillator.set_frequency(rate.clamp(0.01, 20.0));
        Self { oscillator }
    }

    /// Next value plus a second one `offset` cycles ahead (stereo spread)
    #[inline]
    pub fn next_stereo(&mut self, offset: f32) -> (f32, f32) {
        let right = self.oscillator.peek(offset);
        (self.oscillator.next_sample(), right)
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        self.oscillator.next_sample()
    }

    pub fn reset(&mut self) {
        self.oscillator.reset();
    }
}

fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * 0.001 * sample_rate
}

/// Stereo chorus: two modulated taps in quadrature
pub struct Chorus {
    lfo: Lfo,
    lines: [DelayLine; 2],
    /// Centre delay in samples
    centre: f32,
    /// Sweep half-width in samples
    sweep: f32,
    mix: f32,
}

impl Chorus {
    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        let delay_ms = params.get_or("delay_ms", 3.5).clamp(1.0, 30.0);
        let depth = params.get_or("depth", 0.7).clamp(0.0, 1.0);
        let centre = ms_to_samples(delay_ms + 2.0, sample_rate);
        let capacity = (centre * 2.0) as usize + 4;

        Self {
            lfo: Lfo::new(params.get_or("rate", 1.5), sample_rate),
            lines: [DelayLine::new(capacity), DelayLine::new(capacity)],
            centre,
            sweep: ms_to_samples(2.0, sample_rate) * depth,
            mix: params.get_or("mix", 0.5).clamp(0.0, 1.0),
        }
    }
}

impl Effect for Chorus {
    fn process(&mut self, input: Frame) -> Frame {
        let (mod_l, mod_r) = self.lfo.next_stereo(0.25);
        let [left, right] = &mut self.lines;

        left.write(input.0);
        right.write(input.1);
        let wet = (
            left.read(self.centre + self.sweep * mod_l),
            right.read(self.centre + self.sweep * mod_r),
        );
        mix(input, wet, self.mix)
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
        self.lfo.reset();
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Chorus
    }
}

/// Short modulated delay with feedback
pub struct Flanger {
    lfo: Lfo,
    lines: [DelayLine; 2],
    base: f32,
    sweep: f32,
    feedback: f32,
    mix: f32,
    last: Frame,
}

impl Flanger {
    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        let delay_ms = params.get_or("delay_ms", 2.0).clamp(0.1, 10.0);
        let depth = params.get_or("depth", 0.5).clamp(0.0, 1.0);
        let base = ms_to_samples(delay_ms, sample_rate);
        let capacity = (base * 2.0) as usize + 4;

        Self {
            lfo: Lfo::new(params.get_or("rate", 0.25), sample_rate),
            lines: [DelayLine::new(capacity), DelayLine::new(capacity)],
            base,
            sweep: base * depth,
            feedback: params.get_or("feedback", 0.6).clamp(-0.95, 0.95),
            mix: params.get_or("mix", 0.5).clamp(0.0, 1.0),
            last: (0.0, 0.0),
        }
    }
}

impl Effect for Flanger {
    fn process(&mut self, input: Frame) -> Frame {
        let delay = self.base + self.sweep * self.lfo.next_value();
        let [left, right] = &mut self.lines;

        left.write((input.0 + self.feedback * self.last.0).clamp(-2.0, 2.0));
        right.write((input.1 + self.feedback * self.last.1).clamp(-2.0, 2.0));
        self.last = (left.read(delay), right.read(delay));
        mix(input, self.last, self.mix)
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
        self.lfo.reset();
        self.last = (0.0, 0.0);
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Flanger
    }
}

/// Two crossfaded taps sweeping through a delay window.
///
/// Each tap's delay ramps linearly so its playback rate equals the pitch
/// ratio; a triangular window hides the jump when a tap wraps around.
pub struct PitchShifter {
    lines: [DelayLine; 2],
    window: f32,
    /// Phase of tap A in [0, 1); tap B is half a window later
    phase: f32,
    /// Phase advance per sample
    increment: f32,
    mix: f32,
}

impl PitchShifter {
    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        let semitones = params.get_or("semitones", 0.0).clamp(-24.0, 24.0);
        let window = ms_to_samples(params.get_or("window_ms", 100.0).clamp(20.0, 500.0), sample_rate);
        let ratio = 2f32.powf(semitones / 12.0);

        Self {
            lines: [
                DelayLine::new(window as usize + 4),
                DelayLine::new(window as usize + 4),
            ],
            window,
            phase: 0.0,
            // delay shrinks by (ratio - 1) samples per sample
            increment: (1.0 - ratio) / window,
            mix: params.get_or("mix", 1.0).clamp(0.0, 1.0),
        }
    }

    fn tap(line: &DelayLine, phase: f32, window: f32) -> f32 {
        let gain = 1.0 - (2.0 * phase - 1.0).abs();
        line.read(1.0 + phase * window) * gain
    }
}

impl Effect for PitchShifter {
    fn process(&mut self, input: Frame) -> Frame {
        let [left, right] = &mut self.lines;
        left.write(input.0);
        right.write(input.1);

        let a = self.phase;
        let b = (self.phase + 0.5).rem_euclid(1.0);
        let wet = (
            Self::tap(left, a, self.window) + Self::tap(left, b, self.window),
            Self::tap(right, a, self.window) + Self::tap(right, b, self.window),
        );
        self.phase = (self.phase + self.increment).rem_euclid(1.0);

        mix(input, wet, self.mix)
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
        self.phase = 0.0;
    }

    fn kind(&self) -> EffectKind {
        EffectKind::PitchShift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn run(effect: &mut dyn Effect, frames: usize) -> Vec<Frame> {
        (0..frames)
            .map(|i| {
                let x = (i as f32 * 0.05).sin() * 0.5;
                effect.process((x, x))
            })
            .collect()
    }

    #[test]
    fn test_lfo_range() {
        let mut lfo = Lfo::new(5.0, SR);
        for _ in 0..SR as usize {
            let v = lfo.next_value();
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_chorus_decorrelates_channels() {
        let mut chorus = Chorus::from_params(&EffectParams::new().with("mix", 1.0), SR);
        let out = run(&mut chorus, 4800);
        assert!(out.iter().all(|(l, r)| l.is_finite() && r.is_finite()));
        assert!(out.iter().skip(1000).any(|(l, r)| (l - r).abs() > 1e-4));
    }

    #[test]
    fn test_flanger_stays_bounded() {
        let params = EffectParams::new().with("feedback", 0.95).with("mix", 1.0);
        let mut flanger = Flanger::from_params(&params, SR);
        let out = run(&mut flanger, 48000);
        assert!(out.iter().all(|(l, r)| l.abs() <= 2.0 && r.abs() <= 2.0));
    }

    #[test]
    fn test_pitch_shift_of_zero_is_a_plain_delay() {
        let mut shifter = PitchShifter::from_params(&EffectParams::new(), SR);
        assert_eq!(shifter.increment, 0.0);
        let out = run(&mut shifter, 9600);
        assert!(out.iter().all(|(l, _)| l.abs() <= 1.0));
    }
}
