// Pattern - Loop data model
//
// Everything the sequencer plays lives here: the ten drum lanes, the sparse
// per-step synth notes, per-track effect chains and the tempo. Containers are
// shared through `Arc` so that a new `AppState` only reallocates what changed.

pub mod drum;
pub mod effect;
pub mod note;
pub mod state;

pub use drum::{DrumKind, DrumPattern, DrumTrack, DrumVariant, StepMask};
pub use effect::{EffectConfig, EffectId, EffectKind, EffectParams, TrackEffects, TrackId};
pub use note::{NoteId, Pitch, SynthNote, SynthPattern};
pub use state::AppState;

/// Number of sixteenth-note steps in one loop
pub const STEPS: usize = 16;

/// Step duration in seconds for a tempo (one sixteenth note)
///
/// # Example
/// ```
/// use loopstation::pattern::step_duration_seconds;
/// assert_eq!(step_duration_seconds(120.0), 0.125);
/// ```
#[inline]
pub fn step_duration_seconds(bpm: f64) -> f64 {
    60.0 / bpm / 4.0
}
