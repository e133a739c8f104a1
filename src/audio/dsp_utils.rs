// DSP utilities - Audio hygiene, gain conversion and parameter smoothing

/// One stereo sample: (left, right)
pub type Frame = (f32, f32);

/// Silence
pub const SILENCE: Frame = (0.0, 0.0);

/// Flush denormals to zero
///
/// Values very close to 0 can slow some CPUs down badly inside feedback loops.
/// Threshold: 1e-15, far below 32-bit float noise.
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft clipping with tanh
///
/// Near-linear around 0, saturates asymptotically towards [-1, 1].
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Decibels to linear amplitude
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Linear amplitude to decibels (-inf for silence is clamped to -120 dB)
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.abs().max(1e-6).log10()
}

/// Scale both channels
#[inline]
pub fn scale(frame: Frame, gain: f32) -> Frame {
    (frame.0 * gain, frame.1 * gain)
}

/// Linear dry/wet blend
#[inline]
pub fn mix(dry: Frame, wet: Frame, amount: f32) -> Frame {
    (
        dry.0 + (wet.0 - dry.0) * amount,
        dry.1 + (wet.1 - dry.1) * amount,
    )
}

/// One-pole smoother
///
/// Smooths abrupt parameter changes to avoid clicks.
///
/// Formula: y[n] = y[n-1] + α * (x[n] - y[n-1])
#[derive(Debug, Clone)]
pub struct OnePoleSmoother {
    current: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// Create a smoother
    ///
    /// # Arguments
    /// * `initial_value` - Starting value
    /// * `time_constant_ms` - Time to reach ~63% of the target
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Example
    /// ```
    /// use loopstation::audio::dsp_utils::OnePoleSmoother;
    /// // 10ms smoothing at 44.1kHz
    /// let smoother = OnePoleSmoother::new(0.5, 10.0, 44100.0);
    /// assert_eq!(smoother.get(), 0.5);
    /// ```
    pub fn new(initial_value: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let time_constant_samples = (time_constant_ms * 0.001 * sample_rate).max(1.0);
        Self {
            current: initial_value,
            coefficient: (1.0 / time_constant_samples).min(1.0),
        }
    }

    /// Advance one sample towards `target`
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coefficient * (target - self.current);
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    /// Jump to a value without smoothing
    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }
}

/// Peak envelope follower with separate attack and release times
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    level: f32,
    attack: f32,
    release: f32,
}

impl EnvelopeFollower {
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            level: 0.0,
            attack: Self::coefficient(attack_ms, sample_rate),
            release: Self::coefficient(release_ms, sample_rate),
        }
    }

    fn coefficient(time_ms: f32, sample_rate: f32) -> f32 {
        let samples = (time_ms * 0.001 * sample_rate).max(1.0);
        (-1.0 / samples).exp()
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let x = input.abs();
        let coef = if x > self.level { self.attack } else { self.release };
        self.level = flush_denormals_to_zero(x + coef * (self.level - x));
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}
