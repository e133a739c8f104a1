// Oscillators - Waveform and noise generators

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveformType {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl WaveformType {
    /// Waveform value at a phase in [0, 1)
    #[inline]
    pub fn at(self, phase: f32) -> f32 {
        match self {
            WaveformType::Sine => (phase * 2.0 * PI).sin(),
            WaveformType::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveformType::Saw => phase * 2.0 - 1.0,
            WaveformType::Triangle => {
                if phase < 0.5 {
                    phase * 4.0 - 1.0
                } else {
                    3.0 - phase * 4.0
                }
            }
        }
    }
}

/// Phase-accumulating oscillator
#[derive(Debug, Clone)]
pub struct SimpleOscillator {
    waveform: WaveformType,
    phase: f32,
    phase_increment: f32,
    sample_rate: f32,
}

impl SimpleOscillator {
    pub fn new(waveform: WaveformType, sample_rate: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate,
        }
    }

    pub fn set_frequency(&mut self, freq: f32) {
        self.phase_increment = (freq / self.sample_rate).clamp(0.0, 0.5);
    }

    /// Next sample, with `phase_offset` (in cycles) added for phase modulation
    #[inline]
    pub fn next_with_offset(&mut self, phase_offset: f32) -> f32 {
        let sample = self.waveform.at((self.phase + phase_offset).rem_euclid(1.0));
        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.next_with_offset(0.0)
    }

    /// Value at the current phase plus `phase_offset`, without advancing
    #[inline]
    pub fn peek(&self, phase_offset: f32) -> f32 {
        self.waveform.at((self.phase + phase_offset).rem_euclid(1.0))
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Spectral colour of a noise source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

/// Seeded noise source. The same seed always yields the same signal.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    color: NoiseColor,
    rng: StdRng,
    // Paul Kellet's economy pink filter state
    pink: [f32; 3],
    brown: f32,
}

impl NoiseGenerator {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Self {
            color,
            rng: StdRng::seed_from_u64(seed),
            pink: [0.0; 3],
            brown: 0.0,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                self.pink[0] = 0.99765 * self.pink[0] + white * 0.0990460;
                self.pink[1] = 0.96300 * self.pink[1] + white * 0.2965164;
                self.pink[2] = 0.57000 * self.pink[2] + white * 1.0526913;
                (self.pink[0] + self.pink[1] + self.pink[2] + white * 0.1848) * 0.25
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + white * 0.02).clamp(-1.0, 1.0);
                self.brown * 3.5
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    #[test]
    fn test_sine_stays_in_range_and_starts_at_zero() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(440.0);
        assert!(osc.next_sample().abs() < 1e-6);
        for _ in 0..1000 {
            let s = osc.next_sample();
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_reset_returns_to_phase_zero() {
        let mut osc = SimpleOscillator::new(WaveformType::Saw, SAMPLE_RATE);
        osc.set_frequency(100.0);
        for _ in 0..100 {
            osc.next_sample();
        }
        osc.reset();
        assert_eq!(osc.next_sample(), -1.0);
    }

    #[test]
    fn test_waveform_shapes() {
        assert_eq!(WaveformType::Square.at(0.25), 1.0);
        assert_eq!(WaveformType::Square.at(0.75), -1.0);
        assert_eq!(WaveformType::Triangle.at(0.5), 1.0);
        assert_eq!(WaveformType::Saw.at(0.0), -1.0);
    }

    #[test]
    fn test_noise_is_deterministic_per_seed() {
        let mut a = NoiseGenerator::new(NoiseColor::White, 7);
        let mut b = NoiseGenerator::new(NoiseColor::White, 7);
        for _ in 0..64 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn test_noise_colours_are_bounded() {
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let mut noise = NoiseGenerator::new(color, 1);
            for _ in 0..10_000 {
                assert!(noise.next_sample().abs() <= 4.0);
            }
        }
    }
}
