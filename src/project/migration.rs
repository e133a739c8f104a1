// Session format migration
// Upgrades the unversioned legacy shape to the current `SessionFile`

use crate::pattern::drum::DRUM_TRACK_COUNT;
use crate::pattern::state::{MAX_BPM, MIN_BPM};
use crate::pattern::{
    AppState, DrumKind, DrumTrack, DrumVariant, STEPS, StepMask, SynthNote, TrackEffects,
};
use crate::project::PersistenceError;
use crate::project::types::{FORMAT_VERSION, FileFormat, SessionFile};
use serde::Deserialize;

/// Steps a bare note name lasts once upgraded
pub const LEGACY_NOTE_DURATION: u8 = 2;

/// A legacy synth slot entry: either a bare note name or a full note
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyNote {
    Note(SynthNote),
    Name(String),
}

/// The unversioned shape: a drum grid, per-step notes and variant labels
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySession {
    pub bpm: f64,
    pub pattern: Vec<Vec<bool>>,
    #[serde(default)]
    pub synth_pattern: Vec<Vec<LegacyNote>>,
    #[serde(default)]
    pub drum_types: Vec<String>,
    #[serde(default)]
    pub track_effects: TrackEffects,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StoredSession {
    Current(SessionFile),
    Legacy(LegacySession),
}

/// Migration result
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub state: AppState,
    /// Whether the file was in an older format and should be rewritten
    pub migrated: bool,
    pub messages: Vec<String>,
}

/// Parse a session file in any supported version
///
/// Legacy content is only recognized in JSON; RON files were always versioned.
pub fn read_session(text: &str, format: FileFormat) -> Result<MigrationResult, PersistenceError> {
    let stored = match format {
        FileFormat::Json => serde_json::from_str::<StoredSession>(text)?,
        FileFormat::Ron => StoredSession::Current(ron::from_str::<SessionFile>(text)?),
    };

    match stored {
        StoredSession::Current(file) => {
            if file.version > FORMAT_VERSION {
                return Err(PersistenceError::UnsupportedVersion(file.version));
            }
            Ok(MigrationResult {
                state: file.state,
                migrated: false,
                messages: Vec::new(),
            })
        }
        StoredSession::Legacy(legacy) => Ok(upgrade(legacy)),
    }
}

/// Convert a legacy session
///
/// Bare note names become two-step notes on the default instrument with fresh
/// ids. Unknown variant labels and unparsable names are skipped with a message.
pub fn upgrade(legacy: LegacySession) -> MigrationResult {
    let mut messages = vec![format!("Upgrading legacy session to v{}", FORMAT_VERSION)];
    let mut state = AppState::new();

    if legacy.bpm.is_finite() {
        state.bpm = legacy.bpm.clamp(MIN_BPM, MAX_BPM);
    }
    if state.bpm != legacy.bpm {
        messages.push(format!("Tempo {} clamped to {}", legacy.bpm, state.bpm));
    }

    for (index, kind) in DrumKind::ALL.into_iter().enumerate() {
        let mut track = DrumTrack::new(kind);
        if let Some(row) = legacy.pattern.get(index) {
            let active: Vec<usize> = row
                .iter()
                .take(STEPS)
                .enumerate()
                .filter_map(|(step, on)| on.then_some(step))
                .collect();
            track.steps = StepMask::from_steps(&active);
        }
        if let Some(label) = legacy.drum_types.get(index) {
            match DrumVariant::from_label(label) {
                Some(variant) => track.variant = kind.normalize(variant),
                None => messages.push(format!("Unknown {} variant '{}'", kind, label)),
            }
        }
        state.drums = state.drums.with_track(index, track);
    }
    if legacy.pattern.len() > DRUM_TRACK_COUNT {
        messages.push(format!(
            "Dropped {} extra drum rows",
            legacy.pattern.len() - DRUM_TRACK_COUNT
        ));
    }

    for (step, slot) in legacy.synth_pattern.into_iter().take(STEPS).enumerate() {
        for entry in slot {
            let note = match entry {
                LegacyNote::Note(note) => note,
                LegacyNote::Name(name) => match name.parse() {
                    Ok(pitch) => SynthNote::new(pitch, LEGACY_NOTE_DURATION),
                    Err(_) => {
                        messages.push(format!("Skipped unreadable note '{}'", name));
                        continue;
                    }
                },
            };
            if state.synth.contains(note.id) {
                state.synth = state.synth.with_note(step, note.duplicate());
            } else {
                state.synth = state.synth.with_note(step, note);
            }
        }
    }

    if legacy.track_effects.kinds_are_unique() && legacy.track_effects.tracks().all(|t| t.is_valid())
    {
        state.effects = legacy.track_effects;
    } else {
        messages.push("Dropped invalid effect chains".to_string());
    }

    MigrationResult {
        state,
        migrated: true,
        messages,
    }
}
