// Instrument catalogue - Drum synthesis table and synth presets
//
// Maps every (drum kind, variant) pair and every synth preset id to the
// voice model that renders it, plus the voicing used when the sequencer
// triggers a drum lane.

use crate::pattern::{DrumKind, DrumVariant, Pitch};
use crate::synth::envelope::AdsrParams;
use crate::synth::oscillator::{NoiseColor, WaveformType};
use crate::synth::voice::{
    MembraneParams, MetallicParams, NoiseParams, TonalEngine, TonalParams, VoiceModel,
};
use std::fmt;

/// Output level of every synth preset
pub const SYNTH_VOLUME_DB: f32 = -8.0;
/// Output level of drum instruments (the lane gain stage does the rest)
pub const DRUM_VOLUME_DB: f32 = 0.0;

const DRUM_POLYPHONY: usize = 4;
const SYNTH_POLYPHONY: usize = 16;

const MEMBRANE_ENVELOPE: AdsrParams = AdsrParams {
    attack: 0.001,
    decay: 0.4,
    sustain: 0.01,
    release: 1.4,
};

/// Which synthesis family a drum voice belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    /// Pitched body with a falling pitch sweep
    Membrane,
    /// Inharmonic partials, triggered without pitch
    Metallic,
    /// Filtered noise burst, triggered without pitch
    Noise,
}

/// How the sequencer triggers a drum voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voicing {
    pub pitch: Option<Pitch>,
    pub duration_steps: u8,
}

const fn membrane(pitch_decay: f32, octaves: f32) -> VoiceModel {
    VoiceModel::Membrane(MembraneParams {
        pitch_decay,
        octaves,
        envelope: MEMBRANE_ENVELOPE,
    })
}

const fn metal(frequency: f32, decay: f32) -> VoiceModel {
    VoiceModel::Metallic(MetallicParams::new(frequency, decay, 0.2))
}

const fn noise(color: NoiseColor, attack: f32, decay: f32) -> VoiceModel {
    VoiceModel::Noise(NoiseParams {
        color,
        envelope: AdsrParams::percussive(attack, decay, 0.1),
    })
}

/// Synthesis model for a drum lane. Unadvertised variants fall back to the
/// lane's default voice.
pub fn drum_model(kind: DrumKind, variant: DrumVariant) -> VoiceModel {
    use DrumVariant::*;
    match (kind, kind.normalize(variant)) {
        (DrumKind::Kick, Eight08) => membrane(0.05, 4.0),
        (DrumKind::Kick, Distorted) => membrane(0.08, 2.5),
        (DrumKind::Kick, _) => membrane(0.05, 2.0),

        (DrumKind::Snare, Eight08) => noise(NoiseColor::White, 0.005, 0.2),
        (DrumKind::Snare, Trap) => noise(NoiseColor::Pink, 0.005, 0.15),
        (DrumKind::Snare, Rim) => metal(200.0, 0.05),
        (DrumKind::Snare, _) => membrane(0.05, 2.0),

        (DrumKind::HiHat, Trap) => metal(400.0, 0.05),
        (DrumKind::HiHat, _) => metal(200.0, 0.1),

        (DrumKind::Clap, _) => noise(NoiseColor::White, 0.005, 0.1),

        (DrumKind::Tom, Eight08) => membrane(0.1, 2.0),
        (DrumKind::Tom, _) => membrane(0.08, 4.0),

        (DrumKind::Rim, _) => metal(400.0, 0.05),
        (DrumKind::Crash, _) => VoiceModel::Metallic(MetallicParams::new(150.0, 2.0, 3.0)),
        (DrumKind::Ride, _) => metal(800.0, 0.5),
        (DrumKind::Cowbell, _) => metal(540.0, 0.2),
        (DrumKind::Shaker, _) => noise(NoiseColor::White, 0.005, 0.05),
    }
}

pub fn drum_voice_kind(kind: DrumKind, variant: DrumVariant) -> VoiceKind {
    match drum_model(kind, variant) {
        VoiceModel::Membrane(_) | VoiceModel::Tonal(_) => VoiceKind::Membrane,
        VoiceModel::Metallic(_) => VoiceKind::Metallic,
        VoiceModel::Noise(_) => VoiceKind::Noise,
    }
}

/// Trigger pitch and length for a drum lane.
///
/// Membrane voices play Kick C1, Snare C2, Tom C3 for two steps; metallic
/// voices ring for one step; noise voices last two steps, the shaker one.
pub fn drum_voicing(kind: DrumKind, variant: DrumVariant) -> Voicing {
    match drum_voice_kind(kind, variant) {
        VoiceKind::Membrane => {
            let octave = match kind {
                DrumKind::Kick => 1,
                DrumKind::Snare => 2,
                _ => 3,
            };
            Voicing {
                pitch: Some(Pitch::new(0, octave)),
                duration_steps: 2,
            }
        }
        VoiceKind::Metallic => Voicing {
            pitch: None,
            duration_steps: 1,
        },
        VoiceKind::Noise => Voicing {
            pitch: None,
            duration_steps: if kind == DrumKind::Shaker { 1 } else { 2 },
        },
    }
}

/// A melodic instrument preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub model: VoiceModel,
}

const fn tonal(engine: TonalEngine, attack: f32, decay: f32, sustain: f32, release: f32) -> VoiceModel {
    VoiceModel::Tonal(TonalParams {
        engine,
        envelope: AdsrParams {
            attack,
            decay,
            sustain,
            release,
        },
    })
}

static SYNTH_PRESETS: [SynthPreset; 8] = [
    SynthPreset {
        id: "basic",
        name: "Basic Sine",
        model: tonal(TonalEngine::Basic(WaveformType::Sine), 0.005, 0.1, 0.3, 1.0),
    },
    SynthPreset {
        id: "square-lead",
        name: "Square Lead",
        model: tonal(TonalEngine::Basic(WaveformType::Square), 0.01, 0.2, 0.5, 0.4),
    },
    SynthPreset {
        id: "saw-bass",
        name: "Saw Bass",
        model: tonal(TonalEngine::Basic(WaveformType::Saw), 0.005, 0.15, 0.6, 0.2),
    },
    SynthPreset {
        id: "triangle-pad",
        name: "Triangle Pad",
        model: tonal(TonalEngine::Basic(WaveformType::Triangle), 0.4, 0.5, 0.8, 1.5),
    },
    SynthPreset {
        id: "fm-bell",
        name: "FM Bell",
        model: tonal(
            TonalEngine::Fm {
                harmonicity: 3.01,
                modulation_index: 14.0,
            },
            0.001,
            1.2,
            0.0,
            1.2,
        ),
    },
    SynthPreset {
        id: "am-keys",
        name: "AM Keys",
        model: tonal(
            TonalEngine::Am {
                waveform: WaveformType::Sine,
                harmonicity: 2.0,
            },
            0.01,
            0.3,
            0.4,
            0.8,
        ),
    },
    SynthPreset {
        id: "membrane-sub",
        name: "Membrane Sub",
        model: membrane(0.02, 2.0),
    },
    SynthPreset {
        id: "metal-chime",
        name: "Metal Chime",
        model: VoiceModel::Metallic(MetallicParams::new(300.0, 0.8, 0.6)),
    },
];

/// Every available synth preset
pub fn synth_presets() -> &'static [SynthPreset] {
    &SYNTH_PRESETS
}

/// Look up a synth preset by id
pub fn synth_preset(id: &str) -> Option<&'static SynthPreset> {
    SYNTH_PRESETS.iter().find(|p| p.id == id)
}

/// Instrument a backend is asked to build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstrumentSpec {
    Drum { kind: DrumKind, variant: DrumVariant },
    Synth { preset: String },
}

impl InstrumentSpec {
    pub fn drum(kind: DrumKind, variant: DrumVariant) -> Self {
        InstrumentSpec::Drum { kind, variant }
    }

    pub fn synth(preset: impl Into<String>) -> Self {
        InstrumentSpec::Synth {
            preset: preset.into(),
        }
    }

    /// Voice model, level in dB and polyphony; `None` for an unknown preset
    pub fn resolve(&self) -> Option<(VoiceModel, f32, usize)> {
        match self {
            InstrumentSpec::Drum { kind, variant } => {
                Some((drum_model(*kind, *variant), DRUM_VOLUME_DB, DRUM_POLYPHONY))
            }
            InstrumentSpec::Synth { preset } => {
                synth_preset(preset).map(|p| (p.model, SYNTH_VOLUME_DB, SYNTH_POLYPHONY))
            }
        }
    }
}

impl fmt::Display for InstrumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentSpec::Drum { kind, variant } => write!(f, "{kind} ({variant})"),
            InstrumentSpec::Synth { preset } => write!(f, "synth '{preset}'"),
        }
    }
}
