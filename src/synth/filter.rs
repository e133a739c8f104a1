// Filters - Chamberlin state variable filter and one-pole splitters
//
// The SVF gives simultaneous low/high/band outputs at 12 dB/octave; it is
// stable up to about Fs/6, so cutoffs are clamped there. The one-pole
// low-pass is used for cheap band splitting (EQ) and damping.

use std::f32::consts::PI;

/// Which SVF output to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
}

/// State Variable Filter (Chamberlin)
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    filter_type: FilterType,
    sample_rate: f32,
    low: f32,
    band: f32,
    /// Frequency coefficient: 2 * sin(π * fc / Fs)
    f: f32,
    /// Damping: 1 / Q
    q: f32,
}

impl StateVariableFilter {
    pub fn new(filter_type: FilterType, cutoff: f32, resonance: f32, sample_rate: f32) -> Self {
        let mut filter = Self {
            filter_type,
            sample_rate,
            low: 0.0,
            band: 0.0,
            f: 0.0,
            q: 0.0,
        };
        filter.set_cutoff(cutoff, resonance);
        filter
    }

    /// Update cutoff (Hz) and resonance (Q, 0.5..=20)
    pub fn set_cutoff(&mut self, cutoff: f32, resonance: f32) {
        let safe_cutoff = cutoff.clamp(20.0, self.sample_rate / 6.0);
        self.f = 2.0 * (PI * safe_cutoff / self.sample_rate).sin();
        self.q = (1.0 / resonance.clamp(0.5, 20.0)).clamp(0.01, 2.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let high = input - self.low - self.q * self.band;
        self.band += self.f * high;
        self.low += self.f * self.band;

        match self.filter_type {
            FilterType::LowPass => self.low,
            FilterType::HighPass => high,
            FilterType::BandPass => self.band,
        }
    }

    pub fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
    }
}

/// First-order low-pass; `input - output` gives the matching high-pass
#[derive(Debug, Clone)]
pub struct OnePoleLowPass {
    coefficient: f32,
    state: f32,
}

impl OnePoleLowPass {
    pub fn new(cutoff: f32, sample_rate: f32) -> Self {
        let x = (-2.0 * PI * cutoff.max(1.0) / sample_rate).exp();
        Self {
            coefficient: 1.0 - x,
            state: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.coefficient * (input - self.state);
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
