// AppState - One immutable snapshot of everything the sequencer plays

use super::drum::{DrumPattern, DrumTrack};
use super::effect::{EffectConfig, TrackEffects, TrackId};
use super::note::{DEFAULT_SYNTH_INSTRUMENT, SynthPattern};
use super::step_duration_seconds;
use crate::command::edit::{
    ValidationError, check_duration, check_gain, check_instrument, check_velocity,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default tempo in beats per minute
pub const DEFAULT_BPM: f64 = 120.0;
/// Slowest accepted tempo
pub const MIN_BPM: f64 = 60.0;
/// Fastest accepted tempo
pub const MAX_BPM: f64 = 180.0;

/// Complete sequencer state.
///
/// A value is never mutated once published: transitions build a new `AppState`
/// that shares every untouched lane, slot and chain with its predecessor.
/// Cloning is cheap (a handful of reference-count bumps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub bpm: f64,
    pub drums: DrumPattern,
    pub synth: SynthPattern,
    /// Preset given to newly drawn notes
    #[serde(default = "default_instrument")]
    pub synth_instrument: String,
    #[serde(default)]
    pub effects: TrackEffects,
}

fn default_instrument() -> String {
    DEFAULT_SYNTH_INSTRUMENT.to_string()
}

impl AppState {
    /// Empty pattern at the default tempo
    pub fn new() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            drums: DrumPattern::new(),
            synth: SynthPattern::new(),
            synth_instrument: default_instrument(),
            effects: TrackEffects::new(),
        }
    }

    /// Duration of one step at the current tempo, in seconds
    pub fn step_duration(&self) -> f64 {
        step_duration_seconds(self.bpm)
    }

    pub fn drum_track(&self, index: usize) -> Option<&DrumTrack> {
        self.drums.track(index)
    }

    pub fn effect_chain(&self, track: TrackId) -> &[EffectConfig] {
        self.effects.chain(track)
    }

    /// Presets the synth lane keeps built: every note's plus the one new notes get
    pub fn synth_lane_instruments(&self) -> BTreeSet<String> {
        let mut presets = self.synth.used_instruments();
        presets.insert(self.synth_instrument.clone());
        presets
    }

    /// Check every invariant a snapshot must satisfy before it is adopted.
    ///
    /// Covers tempo, lane layout, lane gains and variants, every note and the
    /// effect chains. Loaded files, presets and whole-state edits all pass here.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        if !self.bpm.is_finite() || !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(ValidationError::TempoOutOfRange(self.bpm));
        }
        if !self.drums.is_well_formed() {
            return Err(ValidationError::InvalidState(
                "drum lanes are missing or out of order".into(),
            ));
        }
        for track in self.drums.tracks() {
            check_gain(track.gain_db)?;
            if !track.kind.supports(track.variant) {
                return Err(ValidationError::UnsupportedVariant {
                    kind: track.kind,
                    variant: track.variant,
                });
            }
        }

        check_instrument(&self.synth_instrument)?;
        for (_, note) in self.synth.notes() {
            check_duration(note.duration_steps)?;
            check_velocity(note.velocity)?;
            if let Some(instrument) = &note.instrument {
                check_instrument(instrument)?;
            }
        }

        if let Some(track) = self.effects.tracks().find(|t| !t.is_valid()) {
            return Err(ValidationError::UnknownTrack(track));
        }
        if !self.effects.kinds_are_unique() {
            return Err(ValidationError::InvalidState(
                "a track holds the same effect kind twice".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
