// Delay - Circular delay lines, feedback delay and ping-pong echo
//
// Buffers are allocated once at construction; processing never allocates.
// Feedback is capped below 1.0 and the recirculated signal is clamped so a
// runaway setting cannot blow up.

use super::effect::Effect;
use crate::audio::dsp_utils::{Frame, OnePoleSmoother, mix};
use crate::pattern::{EffectKind, EffectParams};

/// Longest delay time accepted, in milliseconds
pub const MAX_DELAY_MS: f32 = 2000.0;

/// Fixed-size circular buffer with fractional reads
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_samples.max(2)],
            write_pos: 0,
        }
    }

    /// Capacity in samples (reads are valid up to `len() - 1`)
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Sample written `delay` samples ago, linearly interpolated
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor();
        let frac = delay - whole;
        let i0 = (self.write_pos + len - whole as usize) % len;
        let i1 = (i0 + len - 1) % len;
        self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Delay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams {
    /// Delay time in milliseconds (1.0 - MAX_DELAY_MS)
    pub time_ms: f32,
    /// Feedback amount (0.0 - 0.95)
    pub feedback: f32,
    /// Dry/Wet mix (0.0 = fully dry, 1.0 = fully wet)
    pub mix: f32,
}

impl DelayParams {
    pub fn new(time_ms: f32, feedback: f32, mix: f32) -> Self {
        Self {
            time_ms: time_ms.clamp(1.0, MAX_DELAY_MS),
            feedback: feedback.clamp(0.0, 0.95),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    /// Read from a parameter bag, falling back to `defaults`
    pub fn from_bag(params: &EffectParams, defaults: DelayParams) -> Self {
        Self::new(
            params.get_or("time_ms", defaults.time_ms),
            params.get_or("feedback", defaults.feedback),
            params.get_or("mix", defaults.mix),
        )
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            time_ms: 250.0,
            feedback: 0.5,
            mix: 0.3,
        }
    }
}

fn delay_in_samples(time_ms: f32, sample_rate: f32) -> f32 {
    time_ms * 0.001 * sample_rate
}

fn line_for(sample_rate: f32) -> DelayLine {
    DelayLine::new(delay_in_samples(MAX_DELAY_MS, sample_rate) as usize + 2)
}

/// Stereo feedback delay (one line per channel)
pub struct Delay {
    params: DelayParams,
    lines: [DelayLine; 2],
    delay_samples: f32,
    feedback_smoother: OnePoleSmoother,
    mix_smoother: OnePoleSmoother,
}

impl Delay {
    pub fn new(params: DelayParams, sample_rate: f32) -> Self {
        Self {
            params,
            lines: [line_for(sample_rate), line_for(sample_rate)],
            delay_samples: delay_in_samples(params.time_ms, sample_rate),
            feedback_smoother: OnePoleSmoother::new(params.feedback, 10.0, sample_rate),
            mix_smoother: OnePoleSmoother::new(params.mix, 10.0, sample_rate),
        }
    }

    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        Self::new(DelayParams::from_bag(params, DelayParams::default()), sample_rate)
    }

    pub fn params(&self) -> DelayParams {
        self.params
    }
}

impl Effect for Delay {
    fn process(&mut self, input: Frame) -> Frame {
        let feedback = self.feedback_smoother.process(self.params.feedback);
        let amount = self.mix_smoother.process(self.params.mix);

        let [left, right] = &mut self.lines;
        let dl = left.read(self.delay_samples);
        let dr = right.read(self.delay_samples);
        left.write((input.0 + feedback * dl).clamp(-2.0, 2.0));
        right.write((input.1 + feedback * dr).clamp(-2.0, 2.0));

        mix(input, (dl, dr), amount)
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Delay
    }
}

/// Ping-pong echo: repeats alternate between left and right
pub struct PingPongDelay {
    params: DelayParams,
    lines: [DelayLine; 2],
    delay_samples: f32,
}

impl PingPongDelay {
    pub const DEFAULTS: DelayParams = DelayParams {
        time_ms: 375.0,
        feedback: 0.4,
        mix: 0.35,
    };

    pub fn new(params: DelayParams, sample_rate: f32) -> Self {
        Self {
            params,
            lines: [line_for(sample_rate), line_for(sample_rate)],
            delay_samples: delay_in_samples(params.time_ms, sample_rate),
        }
    }

    pub fn from_params(params: &EffectParams, sample_rate: f32) -> Self {
        Self::new(DelayParams::from_bag(params, Self::DEFAULTS), sample_rate)
    }
}

impl Effect for PingPongDelay {
    fn process(&mut self, input: Frame) -> Frame {
        let feedback = self.params.feedback;
        let [left, right] = &mut self.lines;
        let dl = left.read(self.delay_samples);
        let dr = right.read(self.delay_samples);

        let mono = 0.5 * (input.0 + input.1);
        left.write((mono + feedback * dr).clamp(-2.0, 2.0));
        right.write((feedback * dl).clamp(-2.0, 2.0));

        mix(input, (dl, dr), self.params.mix)
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Echo
    }
}
