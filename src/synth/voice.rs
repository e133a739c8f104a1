// Voice - One sounding note of a drum or synth instrument
//
// A voice is started by a `VoiceTrigger`, holds for the trigger's duration,
// then releases. It stays active until its envelope is idle.

use super::envelope::{AdsrEnvelope, AdsrParams};
use super::filter::{FilterType, StateVariableFilter};
use super::oscillator::{NoiseColor, NoiseGenerator, SimpleOscillator, WaveformType};

/// Frequency used when a pitched voice is triggered without a pitch
const FALLBACK_FREQUENCY: f32 = 440.0;

/// Partial ratios of the metallic (inharmonic) voice
const METAL_RATIOS: [f32; 6] = [1.0, 1.483, 1.932, 2.546, 2.63, 3.897];

/// Request to start a voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTrigger {
    /// Pitch in Hz; `None` for unpitched voices
    pub frequency: Option<f32>,
    /// Hold time in seconds before the release starts
    pub duration: f32,
    /// Amplitude scale (0.0 to 1.0)
    pub velocity: f32,
}

impl VoiceTrigger {
    pub fn new(frequency: Option<f32>, duration: f32, velocity: f32) -> Self {
        Self {
            frequency,
            duration: duration.max(0.0),
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    /// Voice that holds until it is released explicitly
    pub fn held(frequency: f32, velocity: f32) -> Self {
        Self::new(Some(frequency), f32::INFINITY, velocity)
    }

    pub fn is_held(&self) -> bool {
        self.duration.is_infinite()
    }
}

/// Sine body whose pitch falls from `base * octaves` to `base`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembraneParams {
    /// Seconds for the pitch sweep
    pub pitch_decay: f32,
    pub octaves: f32,
    pub envelope: AdsrParams,
}

/// Six inharmonic FM square partials through a sweeping high-pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetallicParams {
    pub frequency: f32,
    pub harmonicity: f32,
    pub modulation_index: f32,
    /// High-pass floor in Hz
    pub resonance: f32,
    /// How far above `resonance` the high-pass starts, in octaves
    pub octaves: f32,
    pub envelope: AdsrParams,
}

impl MetallicParams {
    pub const fn new(frequency: f32, decay: f32, release: f32) -> Self {
        Self {
            frequency,
            harmonicity: 5.1,
            modulation_index: 32.0,
            resonance: 4000.0,
            octaves: 1.5,
            envelope: AdsrParams::percussive(0.001, decay, release),
        }
    }
}

/// Enveloped noise burst
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    pub color: NoiseColor,
    pub envelope: AdsrParams,
}

/// Oscillator arrangement of a melodic voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TonalEngine {
    /// Single oscillator
    Basic(WaveformType),
    /// Sine carrier phase-modulated by a sine at `harmonicity × f`
    Fm { harmonicity: f32, modulation_index: f32 },
    /// Carrier amplitude-modulated by a sine at `harmonicity × f`
    Am {
        waveform: WaveformType,
        harmonicity: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonalParams {
    pub engine: TonalEngine,
    pub envelope: AdsrParams,
}

/// Synthesis model shared by all voices of an instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceModel {
    Membrane(MembraneParams),
    Metallic(MetallicParams),
    Noise(NoiseParams),
    Tonal(TonalParams),
}

impl VoiceModel {
    pub fn envelope(&self) -> AdsrParams {
        match self {
            VoiceModel::Membrane(p) => p.envelope,
            VoiceModel::Metallic(p) => p.envelope,
            VoiceModel::Noise(p) => p.envelope,
            VoiceModel::Tonal(p) => p.envelope,
        }
    }
}

/// Per-model generator state
#[derive(Debug, Clone)]
enum Source {
    Membrane {
        oscillator: SimpleOscillator,
        params: MembraneParams,
        base: f32,
        elapsed: f32,
    },
    Metallic {
        carriers: [SimpleOscillator; 6],
        modulators: [SimpleOscillator; 6],
        filter: StateVariableFilter,
        params: MetallicParams,
    },
    Noise(NoiseGenerator),
    Tonal {
        carrier: SimpleOscillator,
        modulator: SimpleOscillator,
        engine: TonalEngine,
    },
}

impl Source {
    fn new(model: VoiceModel, sample_rate: f32, seed: u64) -> Self {
        match model {
            VoiceModel::Membrane(params) => Source::Membrane {
                oscillator: SimpleOscillator::new(WaveformType::Sine, sample_rate),
                params,
                base: FALLBACK_FREQUENCY,
                elapsed: 0.0,
            },
            VoiceModel::Metallic(params) => Source::Metallic {
                carriers: std::array::from_fn(|_| {
                    SimpleOscillator::new(WaveformType::Square, sample_rate)
                }),
                modulators: std::array::from_fn(|_| {
                    SimpleOscillator::new(WaveformType::Sine, sample_rate)
                }),
                filter: StateVariableFilter::new(
                    FilterType::HighPass,
                    params.resonance,
                    1.0,
                    sample_rate,
                ),
                params,
            },
            VoiceModel::Noise(params) => Source::Noise(NoiseGenerator::new(params.color, seed)),
            VoiceModel::Tonal(params) => {
                let waveform = match params.engine {
                    TonalEngine::Basic(waveform) | TonalEngine::Am { waveform, .. } => waveform,
                    TonalEngine::Fm { .. } => WaveformType::Sine,
                };
                Source::Tonal {
                    carrier: SimpleOscillator::new(waveform, sample_rate),
                    modulator: SimpleOscillator::new(WaveformType::Sine, sample_rate),
                    engine: params.engine,
                }
            }
        }
    }

    fn start(&mut self, frequency: Option<f32>) {
        match self {
            Source::Membrane {
                oscillator,
                params,
                base,
                elapsed,
            } => {
                *base = frequency.unwrap_or(FALLBACK_FREQUENCY);
                *elapsed = 0.0;
                oscillator.reset();
                oscillator.set_frequency(*base * params.octaves.max(1.0));
            }
            Source::Metallic {
                carriers,
                modulators,
                filter,
                params,
            } => {
                let base = frequency.unwrap_or(params.frequency);
                for ((carrier, modulator), ratio) in
                    carriers.iter_mut().zip(modulators.iter_mut()).zip(METAL_RATIOS)
                {
                    carrier.reset();
                    modulator.reset();
                    carrier.set_frequency(base * ratio);
                    modulator.set_frequency(base * ratio * params.harmonicity);
                }
                filter.reset();
            }
            Source::Noise(_) => {}
            Source::Tonal {
                carrier,
                modulator,
                engine,
            } => {
                let freq = frequency.unwrap_or(FALLBACK_FREQUENCY);
                carrier.reset();
                modulator.reset();
                carrier.set_frequency(freq);
                match engine {
                    TonalEngine::Basic(_) => {}
                    TonalEngine::Fm { harmonicity, .. } | TonalEngine::Am { harmonicity, .. } => {
                        modulator.set_frequency(freq * *harmonicity)
                    }
                }
            }
        }
    }

    /// Next raw sample; `level` is the current envelope value
    #[inline]
    fn next_sample(&mut self, level: f32, sample_period: f32) -> f32 {
        match self {
            Source::Membrane {
                oscillator,
                params,
                base,
                elapsed,
            } => {
                if *elapsed < params.pitch_decay {
                    // exponential glide from base * octaves down to base
                    let progress = *elapsed / params.pitch_decay;
                    let octaves = params.octaves.max(1.0);
                    oscillator.set_frequency(*base * octaves.powf(1.0 - progress));
                    *elapsed += sample_period;
                    if *elapsed >= params.pitch_decay {
                        oscillator.set_frequency(*base);
                    }
                }
                oscillator.next_sample()
            }
            Source::Metallic {
                carriers,
                modulators,
                filter,
                params,
            } => {
                let depth = params.modulation_index / 64.0;
                let mixed: f32 = carriers
                    .iter_mut()
                    .zip(modulators.iter_mut())
                    .map(|(carrier, modulator)| {
                        carrier.next_with_offset(depth * modulator.next_sample())
                    })
                    .sum();
                let sweep = 2f32.powf(params.octaves * level);
                filter.set_cutoff(params.resonance * sweep, 1.0);
                filter.process(mixed / METAL_RATIOS.len() as f32)
            }
            Source::Noise(noise) => noise.next_sample(),
            Source::Tonal {
                carrier,
                modulator,
                engine,
            } => match *engine {
                TonalEngine::Basic(_) => carrier.next_sample(),
                TonalEngine::Fm {
                    modulation_index, ..
                } => {
                    let offset = modulator.next_sample() * modulation_index / std::f32::consts::TAU;
                    carrier.next_with_offset(offset)
                }
                TonalEngine::Am { .. } => {
                    let amplitude = 0.5 + 0.5 * modulator.next_sample();
                    carrier.next_sample() * amplitude
                }
            },
        }
    }
}

/// A single voice of a polyphonic instrument
#[derive(Debug, Clone)]
pub struct Voice {
    source: Source,
    envelope: AdsrEnvelope,
    velocity: f32,
    /// Pitch of the current note
    frequency: Option<f32>,
    /// Samples left before the release starts; `None` holds until `release()`
    hold_remaining: Option<u64>,
    held: bool,
    /// Trigger order for voice stealing (higher = newer)
    age: u64,
    sample_rate: f32,
}

impl Voice {
    /// `seed` only matters for noise voices
    pub fn new(model: VoiceModel, sample_rate: f32, seed: u64) -> Self {
        Self {
            source: Source::new(model, sample_rate, seed),
            envelope: AdsrEnvelope::new(model.envelope(), sample_rate),
            velocity: 0.0,
            frequency: None,
            hold_remaining: None,
            held: false,
            age: 0,
            sample_rate,
        }
    }

    pub fn trigger(&mut self, trigger: &VoiceTrigger, age: u64) {
        self.velocity = trigger.velocity;
        self.frequency = trigger.frequency;
        self.hold_remaining = (!trigger.is_held())
            .then(|| (trigger.duration * self.sample_rate).round().max(1.0) as u64);
        self.held = true;
        self.age = age;
        self.source.start(trigger.frequency);
        self.envelope.reset();
        self.envelope.note_on();
    }

    /// Release immediately
    pub fn release(&mut self) {
        self.held = false;
        self.envelope.note_off();
    }

    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    pub fn is_releasing(&self) -> bool {
        !self.held && self.envelope.is_active()
    }

    /// Still holding a note at `frequency`
    pub fn is_holding(&self, frequency: Option<f32>) -> bool {
        self.held && self.frequency == frequency
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.envelope.is_active() {
            return 0.0;
        }
        if self.held {
            if let Some(remaining) = self.hold_remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.release();
                }
            }
        }
        let level = self.envelope.process();
        self.source.next_sample(level, 1.0 / self.sample_rate) * level * self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn membrane() -> VoiceModel {
        VoiceModel::Membrane(MembraneParams {
            pitch_decay: 0.05,
            octaves: 4.0,
            envelope: AdsrParams::new(0.001, 0.4, 0.01, 1.4),
        })
    }

    #[test]
    fn test_voice_releases_after_duration() {
        let mut voice = Voice::new(membrane(), SR, 0);
        voice.trigger(&VoiceTrigger::new(Some(55.0), 0.1, 1.0), 1);
        for _ in 0..(0.1 * SR) as usize - 1 {
            voice.next_sample();
        }
        assert!(!voice.is_releasing());
        voice.next_sample();
        assert!(voice.is_releasing());

        for _ in 0..(1.5 * SR) as usize {
            voice.next_sample();
        }
        assert!(!voice.is_active());
        assert_eq!(voice.next_sample(), 0.0);
    }

    #[test]
    fn test_held_voice_waits_for_release() {
        let mut voice = Voice::new(membrane(), SR, 0);
        voice.trigger(&VoiceTrigger::held(55.0, 1.0), 1);
        for _ in 0..(5.0 * SR) as usize {
            voice.next_sample();
        }
        assert!(voice.is_holding(Some(55.0)));
        assert!(!voice.is_holding(Some(110.0)));

        voice.release();
        assert!(voice.is_releasing());
        assert!(!voice.is_holding(Some(55.0)));
    }

    #[test]
    fn test_every_model_makes_bounded_sound() {
        let models = [
            membrane(),
            VoiceModel::Metallic(MetallicParams::new(200.0, 0.1, 0.1)),
            VoiceModel::Noise(NoiseParams {
                color: NoiseColor::Pink,
                envelope: AdsrParams::percussive(0.001, 0.2, 0.1),
            }),
            VoiceModel::Tonal(TonalParams {
                engine: TonalEngine::Fm {
                    harmonicity: 3.0,
                    modulation_index: 10.0,
                },
                envelope: AdsrParams::default(),
            }),
            VoiceModel::Tonal(TonalParams {
                engine: TonalEngine::Am {
                    waveform: WaveformType::Square,
                    harmonicity: 2.0,
                },
                envelope: AdsrParams::default(),
            }),
        ];

        for model in models {
            let mut voice = Voice::new(model, SR, 3);
            voice.trigger(&VoiceTrigger::new(Some(220.0), 0.05, 1.0), 1);
            let mut energy = 0.0;
            for _ in 0..4800 {
                let s = voice.next_sample();
                assert!(s.is_finite() && s.abs() <= 4.0, "{model:?}");
                energy += s * s;
            }
            assert!(energy > 0.0, "{model:?} was silent");
        }
    }

    #[test]
    fn test_velocity_scales_output() {
        let tonal = VoiceModel::Tonal(TonalParams {
            engine: TonalEngine::Basic(WaveformType::Square),
            envelope: AdsrParams::new(0.001, 0.1, 1.0, 0.1),
        });
        let mut loud = Voice::new(tonal, SR, 0);
        let mut soft = Voice::new(tonal, SR, 0);
        loud.trigger(&VoiceTrigger::new(Some(100.0), 1.0, 1.0), 1);
        soft.trigger(&VoiceTrigger::new(Some(100.0), 1.0, 0.5), 1);
        for _ in 0..1000 {
            let (a, b) = (loud.next_sample(), soft.next_sample());
            assert!((a * 0.5 - b).abs() < 1e-6);
        }
    }
}
