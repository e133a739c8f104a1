// ADSR Envelope
//
// Attack-Decay-Sustain-Release amplitude envelope used by every voice.
// Percussive voices use a zero sustain so the sound dies out on its own.

/// ADSR envelope parameters (times in seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    /// Sustain level (0.0 to 1.0)
    pub sustain: f32,
    pub release: f32,
}

impl AdsrParams {
    /// Create parameters, clamping times to 0.001..=10 s and sustain to 0..=1
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.clamp(0.001, 10.0),
            decay: decay.clamp(0.001, 10.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.clamp(0.001, 10.0),
        }
    }

    /// Attack and decay only, no sustain
    pub const fn percussive(attack: f32, decay: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain: 0.0,
            release,
        }
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear ADSR envelope generator
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    params: AdsrParams,
    stage: Stage,
    value: f32,
    /// Level at which the release started
    release_from: f32,
    /// Samples spent in the current stage
    position: f32,
    attack_samples: f32,
    decay_samples: f32,
    release_samples: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        Self {
            params,
            stage: Stage::Idle,
            value: 0.0,
            release_from: 0.0,
            position: 0.0,
            attack_samples: params.attack * sample_rate,
            decay_samples: params.decay * sample_rate,
            release_samples: params.release * sample_rate,
        }
    }

    pub fn params(&self) -> AdsrParams {
        self.params
    }

    /// Start the attack from the current level
    pub fn note_on(&mut self) {
        self.stage = Stage::Attack;
        self.position = self.value * self.attack_samples;
    }

    /// Enter the release stage from wherever the envelope is
    pub fn note_off(&mut self) {
        if self.stage != Stage::Idle && self.stage != Stage::Release {
            self.stage = Stage::Release;
            self.release_from = self.value;
            self.position = 0.0;
        }
    }

    /// Advance one sample and return the level (0.0 to 1.0)
    pub fn process(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => self.value = 0.0,
            Stage::Attack => {
                self.position += 1.0;
                if self.position >= self.attack_samples {
                    self.value = 1.0;
                    self.enter(Stage::Decay);
                } else {
                    self.value = self.position / self.attack_samples;
                }
            }
            Stage::Decay => {
                self.position += 1.0;
                let sustain = self.params.sustain;
                if self.position >= self.decay_samples {
                    self.value = sustain;
                    if sustain > 0.0 {
                        self.enter(Stage::Sustain);
                    } else {
                        self.enter(Stage::Idle);
                    }
                } else {
                    self.value = 1.0 - (self.position / self.decay_samples) * (1.0 - sustain);
                }
            }
            Stage::Sustain => self.value = self.params.sustain,
            Stage::Release => {
                self.position += 1.0;
                if self.position >= self.release_samples {
                    self.value = 0.0;
                    self.enter(Stage::Idle);
                } else {
                    self.value = self.release_from * (1.0 - self.position / self.release_samples);
                }
            }
        }
        self.value
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.position = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.value = 0.0;
        self.position = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn test_starts_idle() {
        let mut env = AdsrEnvelope::new(AdsrParams::default(), SR);
        assert!(!env.is_active());
        assert_eq!(env.process(), 0.0);
    }

    #[test]
    fn test_attack_reaches_peak() {
        let params = AdsrParams::new(0.01, 0.1, 0.5, 0.1);
        let mut env = AdsrEnvelope::new(params, SR);
        env.note_on();
        let mut peak: f32 = 0.0;
        for _ in 0..(0.01 * SR) as usize + 2 {
            peak = peak.max(env.process());
        }
        assert!((peak - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_sustain_then_release_to_idle() {
        let params = AdsrParams::new(0.001, 0.01, 0.5, 0.01);
        let mut env = AdsrEnvelope::new(params, SR);
        env.note_on();
        for _ in 0..2000 {
            env.process();
        }
        assert!((env.value() - 0.5).abs() < 1e-3);

        env.note_off();
        for _ in 0..1000 {
            env.process();
        }
        assert!(!env.is_active());
        assert_eq!(env.value(), 0.0);
    }

    #[test]
    fn test_percussive_envelope_ends_by_itself() {
        let mut env = AdsrEnvelope::new(AdsrParams::percussive(0.001, 0.05, 0.1), SR);
        env.note_on();
        for _ in 0..(0.06 * SR) as usize {
            env.process();
        }
        assert!(!env.is_active());
    }

    #[test]
    fn test_params_clamping() {
        let params = AdsrParams::new(-1.0, 20.0, 1.5, 0.0);
        assert_eq!(params.attack, 0.001);
        assert_eq!(params.decay, 10.0);
        assert_eq!(params.sustain, 1.0);
        assert_eq!(params.release, 0.001);
    }
}
