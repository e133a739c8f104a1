// Edit - Validated user intents and the state transforms they produce
//
// An Edit is checked against the current state before anything is touched.
// Once `validate` passes, `apply_to` is total: it always yields a new state.

use crate::audio::instrument::synth_preset;
use crate::pattern::drum::{MAX_TRACK_GAIN_DB, MIN_TRACK_GAIN_DB};
use crate::pattern::note::{MAX_NOTE_DURATION, MIN_NOTE_DURATION};
use crate::pattern::state::{MAX_BPM, MIN_BPM};
use crate::pattern::{
    AppState, DrumKind, DrumTrack, DrumVariant, EffectConfig, EffectId, EffectKind, NoteId,
    STEPS, SynthNote, TrackId,
};

/// Rejected edit. The store is left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("track {0} does not exist")]
    UnknownTrack(TrackId),

    #[error("step {0} is outside the loop (0..16)")]
    StepOutOfRange(usize),

    #[error("duration of {0} steps is outside 1..=16")]
    DurationOutOfRange(u8),

    #[error("velocity {0} is outside 0..=1")]
    VelocityOutOfRange(f32),

    #[error("note {0} not found")]
    UnknownNote(NoteId),

    #[error("note {0} already exists")]
    DuplicateNote(NoteId),

    #[error("{kind} is already on {track}")]
    DuplicateEffect { track: TrackId, kind: EffectKind },

    #[error("effect {id} not found on {track}")]
    UnknownEffect { track: TrackId, id: EffectId },

    #[error("effect position {index} is past the end of the chain on {track}")]
    EffectIndexOutOfRange { track: TrackId, index: usize },

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("{variant} is not available for {kind}")]
    UnsupportedVariant { kind: DrumKind, variant: DrumVariant },

    #[error("tempo {0} BPM is outside 60..=180")]
    TempoOutOfRange(f64),

    #[error("gain {0} dB is outside -60..=0")]
    GainOutOfRange(f32),

    #[error("parameter '{0}' must be a finite number")]
    InvalidParameter(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// A user intent against the pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Flip one drum cell
    ToggleStep { track: usize, step: usize },
    SetStep { track: usize, step: usize, active: bool },
    /// Clear every drum cell (variants, gains and mutes are kept)
    ClearDrums,
    SetDrumVariant { track: usize, variant: DrumVariant },
    SetTrackGain { track: usize, gain_db: f32 },
    SetTrackMute { track: usize, muted: bool },

    AddNote { step: usize, note: SynthNote },
    /// Relocate a note to another onset step, keeping its id
    MoveNote { id: NoteId, to_step: usize },
    /// Copy a note to another onset step under `new_id`, leaving the original
    DuplicateNote { id: NoteId, to_step: usize, new_id: NoteId },
    ResizeNote { id: NoteId, duration_steps: u8 },
    DeleteNote { id: NoteId },
    SetNoteVelocity { id: NoteId, velocity: Option<f32> },
    /// Preset used for newly drawn notes
    SetSynthInstrument { instrument: String },

    SetTempo { bpm: f64 },

    AddEffect { track: TrackId, effect: EffectConfig },
    RemoveEffect { track: TrackId, id: EffectId },
    SetEffectEnabled { track: TrackId, id: EffectId, enabled: bool },
    SetEffectParam { track: TrackId, id: EffectId, name: String, value: f32 },
    /// Move an effect to another position in its chain
    MoveEffect { track: TrackId, id: EffectId, to_index: usize },

    /// Replace the whole pattern with a named preset
    LoadPreset { name: String, state: Box<AppState> },
    ReplaceState(Box<AppState>),
}

impl Edit {
    /// Drop `kind` onto a track with a fresh, enabled, default-parameter slot
    pub fn add_effect(track: TrackId, kind: EffectKind) -> Self {
        Edit::AddEffect {
            track,
            effect: EffectConfig::new(kind),
        }
    }

    /// Duplicate `id` onto `to_step` with a freshly generated id
    pub fn duplicate_note(id: NoteId, to_step: usize) -> Self {
        Edit::DuplicateNote {
            id,
            to_step,
            new_id: NoteId::new(),
        }
    }

    /// Check the edit against `state`
    pub fn validate(&self, state: &AppState) -> Result<(), ValidationError> {
        match self {
            Edit::ToggleStep { track, step } | Edit::SetStep { track, step, .. } => {
                drum_track(state, *track)?;
                check_step(*step)
            }
            Edit::ClearDrums => Ok(()),
            Edit::SetDrumVariant { track, variant } => {
                let lane = drum_track(state, *track)?;
                if lane.kind.supports(*variant) {
                    Ok(())
                } else {
                    Err(ValidationError::UnsupportedVariant {
                        kind: lane.kind,
                        variant: *variant,
                    })
                }
            }
            Edit::SetTrackGain { track, gain_db } => {
                drum_track(state, *track)?;
                check_gain(*gain_db)
            }
            Edit::SetTrackMute { track, .. } => drum_track(state, *track).map(|_| ()),

            Edit::AddNote { step, note } => {
                check_step(*step)?;
                check_duration(note.duration_steps)?;
                check_velocity(note.velocity)?;
                if let Some(instrument) = &note.instrument {
                    check_instrument(instrument)?;
                }
                if state.synth.contains(note.id) {
                    return Err(ValidationError::DuplicateNote(note.id));
                }
                Ok(())
            }
            Edit::MoveNote { id, to_step } => {
                check_step(*to_step)?;
                existing_note(state, *id)
            }
            Edit::DuplicateNote { id, to_step, new_id } => {
                check_step(*to_step)?;
                existing_note(state, *id)?;
                if state.synth.contains(*new_id) {
                    return Err(ValidationError::DuplicateNote(*new_id));
                }
                Ok(())
            }
            Edit::ResizeNote { id, duration_steps } => {
                check_duration(*duration_steps)?;
                existing_note(state, *id)
            }
            Edit::DeleteNote { id } => existing_note(state, *id),
            Edit::SetNoteVelocity { id, velocity } => {
                check_velocity(*velocity)?;
                existing_note(state, *id)
            }
            Edit::SetSynthInstrument { instrument } => check_instrument(instrument),

            Edit::SetTempo { bpm } => {
                if bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(bpm) {
                    Ok(())
                } else {
                    Err(ValidationError::TempoOutOfRange(*bpm))
                }
            }

            Edit::AddEffect { track, effect } => {
                check_track(*track)?;
                if state.effects.contains_kind(*track, effect.kind) {
                    return Err(ValidationError::DuplicateEffect {
                        track: *track,
                        kind: effect.kind,
                    });
                }
                if let Some((name, _)) = effect.params.iter().find(|(_, v)| !v.is_finite()) {
                    return Err(ValidationError::InvalidParameter(name.to_string()));
                }
                Ok(())
            }
            Edit::RemoveEffect { track, id } | Edit::SetEffectEnabled { track, id, .. } => {
                existing_effect(state, *track, *id)
            }
            Edit::SetEffectParam {
                track,
                id,
                name,
                value,
            } => {
                existing_effect(state, *track, *id)?;
                if value.is_finite() {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidParameter(name.clone()))
                }
            }
            Edit::MoveEffect {
                track,
                id,
                to_index,
            } => {
                existing_effect(state, *track, *id)?;
                if *to_index < state.effects.chain(*track).len() {
                    Ok(())
                } else {
                    Err(ValidationError::EffectIndexOutOfRange {
                        track: *track,
                        index: *to_index,
                    })
                }
            }

            Edit::LoadPreset { state: next, .. } | Edit::ReplaceState(next) => {
                next.check_invariants()
            }
        }
    }

    /// Produce the next state. Only called after `validate` succeeded.
    pub fn apply_to(&self, state: &AppState) -> AppState {
        match self {
            Edit::ToggleStep { track, step } => {
                update_drum(state, *track, |t| t.steps = t.steps.toggled(*step))
            }
            Edit::SetStep {
                track,
                step,
                active,
            } => update_drum(state, *track, |t| t.steps = t.steps.with(*step, *active)),
            Edit::ClearDrums => AppState {
                drums: state.drums.cleared(),
                ..state.clone()
            },
            Edit::SetDrumVariant { track, variant } => {
                update_drum(state, *track, |t| t.variant = *variant)
            }
            Edit::SetTrackGain { track, gain_db } => {
                update_drum(state, *track, |t| t.gain_db = *gain_db)
            }
            Edit::SetTrackMute { track, muted } => {
                update_drum(state, *track, |t| t.muted = *muted)
            }

            Edit::AddNote { step, note } => AppState {
                synth: state.synth.with_note(*step, note.clone()),
                ..state.clone()
            },
            Edit::MoveNote { id, to_step } => match state.synth.without_note(*id) {
                Some((synth, note, _)) => AppState {
                    synth: synth.with_note(*to_step, note),
                    ..state.clone()
                },
                None => state.clone(),
            },
            Edit::DuplicateNote {
                id,
                to_step,
                new_id,
            } => match state.synth.locate(*id) {
                Some((_, note)) => {
                    let copy = SynthNote {
                        id: *new_id,
                        ..note.clone()
                    };
                    AppState {
                        synth: state.synth.with_note(*to_step, copy),
                        ..state.clone()
                    }
                }
                None => state.clone(),
            },
            Edit::ResizeNote { id, duration_steps } => AppState {
                synth: state
                    .synth
                    .with_note_updated(*id, |n| n.duration_steps = *duration_steps),
                ..state.clone()
            },
            Edit::DeleteNote { id } => match state.synth.without_note(*id) {
                Some((synth, _, _)) => AppState {
                    synth,
                    ..state.clone()
                },
                None => state.clone(),
            },
            Edit::SetNoteVelocity { id, velocity } => AppState {
                synth: state.synth.with_note_updated(*id, |n| n.velocity = *velocity),
                ..state.clone()
            },
            Edit::SetSynthInstrument { instrument } => AppState {
                synth_instrument: instrument.clone(),
                ..state.clone()
            },

            Edit::SetTempo { bpm } => AppState {
                bpm: *bpm,
                ..state.clone()
            },

            Edit::AddEffect { track, effect } => update_chain(state, *track, |chain| {
                chain.push(effect.clone());
            }),
            Edit::RemoveEffect { track, id } => update_chain(state, *track, |chain| {
                chain.retain(|e| e.id != *id);
            }),
            Edit::SetEffectEnabled { track, id, enabled } => {
                update_chain(state, *track, |chain| {
                    if let Some(e) = chain.iter_mut().find(|e| e.id == *id) {
                        e.enabled = *enabled;
                    }
                })
            }
            Edit::SetEffectParam {
                track,
                id,
                name,
                value,
            } => update_chain(state, *track, |chain| {
                if let Some(e) = chain.iter_mut().find(|e| e.id == *id) {
                    e.params.set(name.clone(), *value);
                }
            }),
            Edit::MoveEffect {
                track,
                id,
                to_index,
            } => update_chain(state, *track, |chain| {
                if let Some(from) = chain.iter().position(|e| e.id == *id) {
                    let effect = chain.remove(from);
                    let at = (*to_index).min(chain.len());
                    chain.insert(at, effect);
                }
            }),

            Edit::LoadPreset { state: next, .. } | Edit::ReplaceState(next) => {
                AppState::clone(next)
            }
        }
    }

    /// Short human-readable label for history menus
    pub fn description(&self) -> String {
        match self {
            Edit::ToggleStep { track, step } => {
                format!("Toggle {} step {}", lane_name(*track), step + 1)
            }
            Edit::SetStep {
                track,
                step,
                active,
            } => format!(
                "{} {} step {}",
                if *active { "Set" } else { "Clear" },
                lane_name(*track),
                step + 1
            ),
            Edit::ClearDrums => "Clear drum pattern".to_string(),
            Edit::SetDrumVariant { track, variant } => {
                format!("Set {} to {}", lane_name(*track), variant)
            }
            Edit::SetTrackGain { track, gain_db } => {
                format!("Set {} gain to {:.1} dB", lane_name(*track), gain_db)
            }
            Edit::SetTrackMute { track, muted } => format!(
                "{} {}",
                if *muted { "Mute" } else { "Unmute" },
                lane_name(*track)
            ),
            Edit::AddNote { step, note } => format!("Add {} at step {}", note.pitch, step + 1),
            Edit::MoveNote { to_step, .. } => format!("Move note to step {}", to_step + 1),
            Edit::DuplicateNote { to_step, .. } => {
                format!("Duplicate note to step {}", to_step + 1)
            }
            Edit::ResizeNote { duration_steps, .. } => {
                format!("Resize note to {} steps", duration_steps)
            }
            Edit::DeleteNote { .. } => "Delete note".to_string(),
            Edit::SetNoteVelocity { .. } => "Set note velocity".to_string(),
            Edit::SetSynthInstrument { instrument } => format!("Select {}", instrument),
            Edit::SetTempo { bpm } => format!("Set tempo to {} BPM", bpm),
            Edit::AddEffect { track, effect } => format!("Add {} to {}", effect.kind, track),
            Edit::RemoveEffect { track, .. } => format!("Remove effect from {}", track),
            Edit::SetEffectEnabled { track, enabled, .. } => format!(
                "{} effect on {}",
                if *enabled { "Enable" } else { "Bypass" },
                track
            ),
            Edit::SetEffectParam { name, .. } => format!("Set effect {}", name),
            Edit::MoveEffect { track, .. } => format!("Reorder effects on {}", track),
            Edit::LoadPreset { name, .. } => format!("Load preset {}", name),
            Edit::ReplaceState(_) => "Replace pattern".to_string(),
        }
    }
}

fn lane_name(track: usize) -> &'static str {
    DrumKind::from_index(track).map_or("drum", DrumKind::name)
}

fn check_step(step: usize) -> Result<(), ValidationError> {
    if step < STEPS {
        Ok(())
    } else {
        Err(ValidationError::StepOutOfRange(step))
    }
}

pub(crate) fn check_duration(duration: u8) -> Result<(), ValidationError> {
    if (MIN_NOTE_DURATION..=MAX_NOTE_DURATION).contains(&duration) {
        Ok(())
    } else {
        Err(ValidationError::DurationOutOfRange(duration))
    }
}

pub(crate) fn check_velocity(velocity: Option<f32>) -> Result<(), ValidationError> {
    match velocity {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ValidationError::VelocityOutOfRange(v)),
        _ => Ok(()),
    }
}

pub(crate) fn check_instrument(id: &str) -> Result<(), ValidationError> {
    synth_preset(id)
        .map(|_| ())
        .ok_or_else(|| ValidationError::UnknownInstrument(id.to_string()))
}

pub(crate) fn check_gain(gain_db: f32) -> Result<(), ValidationError> {
    if gain_db.is_finite() && (MIN_TRACK_GAIN_DB..=MAX_TRACK_GAIN_DB).contains(&gain_db) {
        Ok(())
    } else {
        Err(ValidationError::GainOutOfRange(gain_db))
    }
}

fn check_track(track: TrackId) -> Result<(), ValidationError> {
    if track.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::UnknownTrack(track))
    }
}

fn drum_track(state: &AppState, index: usize) -> Result<&DrumTrack, ValidationError> {
    state
        .drum_track(index)
        .ok_or(ValidationError::UnknownTrack(TrackId::Drum(index)))
}

fn existing_note(state: &AppState, id: NoteId) -> Result<(), ValidationError> {
    if state.synth.contains(id) {
        Ok(())
    } else {
        Err(ValidationError::UnknownNote(id))
    }
}

fn existing_effect(state: &AppState, track: TrackId, id: EffectId) -> Result<(), ValidationError> {
    check_track(track)?;
    state
        .effects
        .find(track, id)
        .map(|_| ())
        .ok_or(ValidationError::UnknownEffect { track, id })
}

fn update_drum(state: &AppState, index: usize, update: impl FnOnce(&mut DrumTrack)) -> AppState {
    let Some(current) = state.drum_track(index) else {
        return state.clone();
    };
    let mut track = current.clone();
    update(&mut track);
    AppState {
        drums: state.drums.with_track(index, track),
        ..state.clone()
    }
}

fn update_chain(
    state: &AppState,
    track: TrackId,
    update: impl FnOnce(&mut Vec<EffectConfig>),
) -> AppState {
    let mut chain = state.effects.chain(track).to_vec();
    update(&mut chain);
    AppState {
        effects: state.effects.with_chain(track, chain),
        ..state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pitch;
    use std::sync::Arc;

    fn note(name: &str, duration: u8) -> SynthNote {
        SynthNote::new(name.parse::<Pitch>().unwrap(), duration)
    }

    fn run(state: &AppState, edit: Edit) -> AppState {
        edit.validate(state).unwrap();
        edit.apply_to(state)
    }

    #[test]
    fn test_toggle_step_twice_restores_state() {
        let state = AppState::new();
        let edit = Edit::ToggleStep { track: 2, step: 7 };
        let once = run(&state, edit.clone());
        assert!(once.drum_track(2).unwrap().is_active(7));
        let twice = run(&once, edit);
        assert_eq!(twice, state);
    }

    #[test]
    fn test_step_and_track_bounds() {
        let state = AppState::new();
        assert_eq!(
            Edit::ToggleStep { track: 0, step: 16 }.validate(&state),
            Err(ValidationError::StepOutOfRange(16))
        );
        assert_eq!(
            Edit::ToggleStep { track: 10, step: 0 }.validate(&state),
            Err(ValidationError::UnknownTrack(TrackId::Drum(10)))
        );
    }

    #[test]
    fn test_unsupported_variant_is_rejected() {
        let state = AppState::new();
        let edit = Edit::SetDrumVariant {
            track: 3,
            variant: DrumVariant::Eight08,
        };
        assert!(matches!(
            edit.validate(&state),
            Err(ValidationError::UnsupportedVariant { .. })
        ));
    }

    #[test]
    fn test_move_keeps_id_and_shares_untouched_slots() {
        let n = note("C4", 2);
        let id = n.id;
        let state = run(&AppState::new(), Edit::AddNote { step: 3, note: n });
        let moved = run(&state, Edit::MoveNote { id, to_step: 7 });

        assert_eq!(moved.synth.locate(id).map(|(s, _)| s), Some(7));
        assert!(moved.synth.slot(3).is_empty());
        assert!(Arc::ptr_eq(
            state.synth.slot_handle(0).unwrap(),
            moved.synth.slot_handle(0).unwrap()
        ));
        assert!(Arc::ptr_eq(
            state.drums.track_handle(0).unwrap(),
            moved.drums.track_handle(0).unwrap()
        ));
    }

    #[test]
    fn test_duplicate_leaves_original() {
        let n = note("G3", 4);
        let id = n.id;
        let state = run(&AppState::new(), Edit::AddNote { step: 3, note: n });
        let dup = Edit::duplicate_note(id, 7);
        let next = run(&state, dup.clone());

        let Edit::DuplicateNote { new_id, .. } = dup else {
            unreachable!()
        };
        let (s1, original) = next.synth.locate(id).unwrap();
        let (s2, copy) = next.synth.locate(new_id).unwrap();
        assert_eq!((s1, s2), (3, 7));
        assert_eq!(original.pitch, copy.pitch);
        assert_eq!(original.duration_steps, copy.duration_steps);
        assert_ne!(original.id, copy.id);
    }

    #[test]
    fn test_resize_bounds() {
        let n = note("C4", 2);
        let id = n.id;
        let state = run(&AppState::new(), Edit::AddNote { step: 0, note: n });
        assert_eq!(
            Edit::ResizeNote {
                id,
                duration_steps: 0
            }
            .validate(&state),
            Err(ValidationError::DurationOutOfRange(0))
        );
        assert_eq!(
            Edit::ResizeNote {
                id,
                duration_steps: 17
            }
            .validate(&state),
            Err(ValidationError::DurationOutOfRange(17))
        );
    }

    #[test]
    fn test_unknown_note_is_rejected() {
        let state = AppState::new();
        let id = NoteId::new();
        assert_eq!(
            Edit::DeleteNote { id }.validate(&state),
            Err(ValidationError::UnknownNote(id))
        );
    }

    #[test]
    fn test_add_effect_twice_is_rejected() {
        let state = run(
            &AppState::new(),
            Edit::add_effect(TrackId::Drum(0), EffectKind::Reverb),
        );
        let again = Edit::add_effect(TrackId::Drum(0), EffectKind::Reverb);
        assert_eq!(
            again.validate(&state),
            Err(ValidationError::DuplicateEffect {
                track: TrackId::Drum(0),
                kind: EffectKind::Reverb
            })
        );
        // another track is fine
        assert!(
            Edit::add_effect(TrackId::Synth, EffectKind::Reverb)
                .validate(&state)
                .is_ok()
        );
    }

    #[test]
    fn test_move_effect_reorders_chain() {
        let mut state = AppState::new();
        for kind in [EffectKind::Delay, EffectKind::Reverb, EffectKind::Chorus] {
            state = run(&state, Edit::add_effect(TrackId::Synth, kind));
        }
        let chorus = state.effect_chain(TrackId::Synth)[2].id;
        let next = run(
            &state,
            Edit::MoveEffect {
                track: TrackId::Synth,
                id: chorus,
                to_index: 0,
            },
        );
        let kinds: Vec<_> = next
            .effect_chain(TrackId::Synth)
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EffectKind::Chorus, EffectKind::Delay, EffectKind::Reverb]
        );
    }

    #[test]
    fn test_replacing_state_checks_every_note() {
        let current = AppState::new();
        let broken = SynthNote {
            duration_steps: 0,
            ..note("C4", 2)
        };
        let next = AppState {
            synth: current.synth.with_note(0, broken),
            ..AppState::new()
        };

        assert_eq!(
            Edit::ReplaceState(Box::new(next.clone())).validate(&current),
            Err(ValidationError::DurationOutOfRange(0))
        );
        let preset = Edit::LoadPreset {
            name: "Broken".into(),
            state: Box::new(next),
        };
        assert_eq!(
            preset.validate(&current),
            Err(ValidationError::DurationOutOfRange(0))
        );
    }

    #[test]
    fn test_tempo_bounds() {
        let state = AppState::new();
        assert!(Edit::SetTempo { bpm: 174.0 }.validate(&state).is_ok());
        assert!(Edit::SetTempo { bpm: 59.0 }.validate(&state).is_err());
        assert!(Edit::SetTempo { bpm: f64::NAN }.validate(&state).is_err());
    }

    #[test]
    fn test_unknown_instrument_is_rejected() {
        let state = AppState::new();
        let edit = Edit::AddNote {
            step: 0,
            note: note("C4", 1).with_instrument("theremin"),
        };
        assert_eq!(
            edit.validate(&state),
            Err(ValidationError::UnknownInstrument("theremin".into()))
        );
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            Edit::ToggleStep { track: 0, step: 0 }.description(),
            "Toggle Kick step 1"
        );
        assert_eq!(
            Edit::add_effect(TrackId::Drum(1), EffectKind::Delay).description(),
            "Add Delay to drum-1"
        );
    }
}
