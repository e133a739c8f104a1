// Synth notes - Sparse per-step note collection for the melodic lane

use super::STEPS;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Preset used by notes that carry no instrument
pub const DEFAULT_SYNTH_INSTRUMENT: &str = "basic";
/// Shortest note, in steps
pub const MIN_NOTE_DURATION: u8 = 1;
/// Longest note, in steps
pub const MAX_NOTE_DURATION: u8 = STEPS as u8;

/// Unique identifier for notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid note name '{0}'")]
pub struct PitchParseError(pub String);

/// Scientific pitch: pitch class and octave (`C4` is middle C).
///
/// Persisted as its name, e.g. `"F#3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    /// Semitone index in the octave (0 = C, 11 = B)
    class: u8,
    octave: i8,
}

impl Pitch {
    /// Build from semitone index (wrapped into 0..12) and octave
    pub fn new(class: u8, octave: i8) -> Self {
        Self {
            class: class % 12,
            octave,
        }
    }

    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.class as i32
    }

    /// Equal-tempered frequency with A4 = 440 Hz
    pub fn frequency(&self) -> f32 {
        440.0 * 2f32.powf((self.midi() - 69) as f32 / 12.0)
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_NAMES[self.class as usize], self.octave)
    }
}

impl FromStr for Pitch {
    type Err = PitchParseError;

    /// Accepts a letter A-G, an optional `#` or `b`, then a (possibly negative) octave.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PitchParseError(s.to_string());
        let mut chars = s.trim().chars().peekable();

        let base: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(err()),
        };

        let accidental = match chars.peek() {
            Some('#') => {
                chars.next();
                1
            }
            Some('b') => {
                chars.next();
                -1
            }
            _ => 0,
        };

        let octave: i32 = chars.collect::<String>().parse().map_err(|_| err())?;
        let midi = (octave + 1) * 12 + base + accidental;
        if !(0..=127).contains(&midi) {
            return Err(err());
        }

        Ok(Self {
            class: midi.rem_euclid(12) as u8,
            octave: (midi.div_euclid(12) - 1) as i8,
        })
    }
}

impl TryFrom<String> for Pitch {
    type Error = PitchParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.to_string()
    }
}

/// A melodic note. Its onset step is the slot it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthNote {
    pub id: NoteId,
    #[serde(rename = "note")]
    pub pitch: Pitch,
    pub duration_steps: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "instrumentId")]
    pub instrument: Option<String>,
}

impl SynthNote {
    /// New note with a fresh id and the default instrument
    pub fn new(pitch: Pitch, duration_steps: u8) -> Self {
        Self {
            id: NoteId::new(),
            pitch,
            duration_steps,
            velocity: None,
            instrument: None,
        }
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = Some(instrument.into());
        self
    }

    /// Preset id this note plays on
    pub fn instrument_id(&self) -> &str {
        self.instrument.as_deref().unwrap_or(DEFAULT_SYNTH_INSTRUMENT)
    }

    /// Trigger velocity, full scale when unset
    pub fn gain(&self) -> f32 {
        self.velocity.unwrap_or(1.0)
    }

    /// Copy of this note under a fresh id
    pub fn duplicate(&self) -> Self {
        Self {
            id: NoteId::new(),
            ..self.clone()
        }
    }
}

type Slot = Arc<Vec<SynthNote>>;

/// Sixteen onset slots of notes.
///
/// Each slot is a set: notes are kept sorted by id so that two slots holding
/// the same notes compare equal regardless of insertion history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Vec<SynthNote>>")]
pub struct SynthPattern {
    slots: Vec<Slot>,
}

impl SynthPattern {
    /// Sixteen empty slots
    pub fn new() -> Self {
        let empty: Slot = Arc::new(Vec::new());
        Self {
            slots: vec![empty; STEPS],
        }
    }

    /// Notes starting at `step` (empty past the loop)
    pub fn slot(&self, step: usize) -> &[SynthNote] {
        self.slots.get(step).map(|s| s.as_slice()).unwrap_or(&[])
    }

    /// Shared handle to a slot (used to check structural sharing)
    pub fn slot_handle(&self, step: usize) -> Option<&Slot> {
        self.slots.get(step)
    }

    /// Find a note and its onset step
    pub fn locate(&self, id: NoteId) -> Option<(usize, &SynthNote)> {
        self.slots.iter().enumerate().find_map(|(step, slot)| {
            slot.binary_search_by(|n| n.id.cmp(&id))
                .ok()
                .map(|i| (step, &slot[i]))
        })
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.locate(id).is_some()
    }

    /// All notes with their onset step, in step order
    pub fn notes(&self) -> impl Iterator<Item = (usize, &SynthNote)> {
        self.slots
            .iter()
            .enumerate()
            .flat_map(|(step, slot)| slot.iter().map(move |n| (step, n)))
    }

    pub fn note_count(&self) -> usize {
        self.slots.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_empty())
    }

    /// Preset ids referenced by the notes
    pub fn used_instruments(&self) -> BTreeSet<String> {
        self.notes()
            .map(|(_, n)| n.instrument_id().to_string())
            .collect()
    }

    /// Copy with `note` added at `step`. Only that slot is reallocated.
    ///
    /// Callers guarantee the step is in range and the id is not yet present.
    #[must_use]
    pub fn with_note(&self, step: usize, note: SynthNote) -> Self {
        let mut slots = self.slots.clone();
        if let Some(slot) = slots.get_mut(step) {
            let mut notes = Vec::clone(slot);
            let at = notes
                .binary_search_by(|n| n.id.cmp(&note.id))
                .unwrap_or_else(|i| i);
            notes.insert(at, note);
            *slot = Arc::new(notes);
        }
        Self { slots }
    }

    /// Copy without the note `id`, returning the removed note and its step
    #[must_use]
    pub fn without_note(&self, id: NoteId) -> Option<(Self, SynthNote, usize)> {
        let (step, _) = self.locate(id)?;
        let mut slots = self.slots.clone();
        let mut notes = Vec::clone(&slots[step]);
        let index = notes.binary_search_by(|n| n.id.cmp(&id)).ok()?;
        let removed = notes.remove(index);
        slots[step] = Arc::new(notes);
        Some((Self { slots }, removed, step))
    }

    /// Copy with note `id` rewritten in place (same slot)
    #[must_use]
    pub fn with_note_updated(&self, id: NoteId, update: impl FnOnce(&mut SynthNote)) -> Self {
        let Some((step, _)) = self.locate(id) else {
            return self.clone();
        };
        let mut slots = self.slots.clone();
        let mut notes = Vec::clone(&slots[step]);
        if let Ok(index) = notes.binary_search_by(|n| n.id.cmp(&id)) {
            update(&mut notes[index]);
            // the id is the sort key and must not change
            notes[index].id = id;
        }
        slots[step] = Arc::new(notes);
        Self { slots }
    }
}

impl Default for SynthPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for SynthPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.slots.serialize(serializer)
    }
}

impl TryFrom<Vec<Vec<SynthNote>>> for SynthPattern {
    type Error = String;

    fn try_from(slots: Vec<Vec<SynthNote>>) -> Result<Self, Self::Error> {
        if slots.len() != STEPS {
            return Err(format!(
                "synth pattern has {} steps, expected {}",
                slots.len(),
                STEPS
            ));
        }

        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(STEPS);
        for mut notes in slots {
            for note in &notes {
                if !seen.insert(note.id) {
                    return Err(format!("note id {} appears more than once", note.id));
                }
                if !(MIN_NOTE_DURATION..=MAX_NOTE_DURATION).contains(&note.duration_steps) {
                    return Err(format!(
                        "note {} has duration {} outside 1..={}",
                        note.id, note.duration_steps, MAX_NOTE_DURATION
                    ));
                }
            }
            notes.sort_by(|a, b| a.id.cmp(&b.id));
            out.push(Arc::new(notes));
        }

        Ok(Self { slots: out })
    }
}
