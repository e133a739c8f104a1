// Tone shaping - Three-band EQ and mid/side stereo width

use super::effect::Effect;
use super::filter::OnePoleLowPass;
use crate::audio::dsp_utils::{Frame, db_to_gain};
use crate::pattern::{EffectKind, EffectParams};

/// Splits one channel into low, mid and high bands
#[derive(Debug, Clone)]
struct BandSplitter {
    low: OnePoleLowPass,
    high: OnePoleLowPass,
}

impl BandSplitter {
    #[inline]
    fn split(&mut self, x: f32) -> (f32, f32, f32) {
        let low = self.low.process(x);
        let below_high = self.high.process(x);
        (low, below_high - low, x - below_high)
    }

    fn reset(&mut self) {
        self.low.reset();
        self.high.reset();
    }
}

/// Three-band equaliser with complementary one-pole crossovers.
///
/// At 0 dB on every band the output equals the input.
pub struct Eq3 {
    bands: [BandSplitter; 2],
    gains: (f32, f32, f32),
}

impl Eq3 {
    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        let low_freq = params.get_or("low_freq", 400.0).clamp(20.0, 5000.0);
        let high_freq = params
            .get_or("high_freq", 2500.0)
            .clamp(low_freq + 1.0, sample_rate * 0.45);
        let band = || BandSplitter {
            low: OnePoleLowPass::new(low_freq, sample_rate),
            high: OnePoleLowPass::new(high_freq, sample_rate),
        };
        let gain = |name: &str| db_to_gain(params.get_or(name, 0.0).clamp(-24.0, 24.0));

        Self {
            bands: [band(), band()],
            gains: (gain("low_db"), gain("mid_db"), gain("high_db")),
        }
    }

    #[inline]
    fn apply(&self, (low, mid, high): (f32, f32, f32)) -> f32 {
        low * self.gains.0 + mid * self.gains.1 + high * self.gains.2
    }
}

impl Effect for Eq3 {
    fn process(&mut self, input: Frame) -> Frame {
        let [left, right] = &mut self.bands;
        let l = left.split(input.0);
        let r = right.split(input.1);
        (self.apply(l), self.apply(r))
    }

    fn reset(&mut self) {
        self.bands.iter_mut().for_each(BandSplitter::reset);
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Eq3
    }
}

/// Mid/side width control: 0 = mono, 0.5 = unchanged, 1 = sides doubled
pub struct StereoWidth {
    width: f32,
}

impl StereoWidth {
    pub fn from_params(params: &EffectParams, _sample_rate: f32) -> Self {
        Self {
            width: params.get_or("width", 0.5).clamp(0.0, 1.0),
        }
    }
}

impl Effect for StereoWidth {
    fn process(&mut self, (l, r): Frame) -> Frame {
        let mid = (l + r) * 0.5;
        let side = (l - r) * 0.5 * self.width * 2.0;
        (mid + side, mid - side)
    }

    fn reset(&mut self) {}

    fn kind(&self) -> EffectKind {
        EffectKind::StereoWidth
    }
}
