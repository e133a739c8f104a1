// Timeline Editor - Pointer state machine for scrubbing and note drags
//
// Idle ──down on ruler──▶ Scrubbing ──up──▶ Idle
//  │
//  └──down on note──▶ DraggingNote(Move | Resize) ──up──▶ Idle (+ commit)
//                                                 ──cancel──▶ Idle
//
// A drag only updates its preview. The edit is produced once, on pointer-up,
// so the store sees a single atomic change.

use super::layout::{NoteZone, TimelineLayout};
use crate::command::{Edit, ValidationError};
use crate::pattern::note::{MAX_NOTE_DURATION, MIN_NOTE_DURATION};
use crate::pattern::{AppState, EffectKind, NoteId, STEPS, TrackId};

/// What a drag does to its note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize,
}

/// An in-flight note drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteDrag {
    pub kind: DragKind,
    pub note: NoteId,
    pub origin_step: usize,
    pub origin_duration: u8,
    pub pointer_origin_x: f32,
    /// Copy instead of relocating on drop (Move only)
    pub duplicate: bool,
    /// Onset shown while dragging
    pub preview_step: usize,
    /// Length shown while dragging
    pub preview_duration: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Idle,
    Scrubbing,
    DraggingNote(NoteDrag),
}

/// Area of the timeline a pointer went down on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Ruler,
    SynthLane,
    DrumLane(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// `duplicate` is the modifier held at drag start
    Down {
        target: PointerTarget,
        x: f32,
        duplicate: bool,
    },
    Move { x: f32 },
    Up { x: f32 },
    /// Pointer capture lost
    Cancel,
}

/// Side effect requested by the editor
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    /// Move the clock to a position in steps
    Seek(f64),
    /// Hand an edit to the store
    Commit(Edit),
}

/// Timeline pointer handling, selection and effect drops
#[derive(Debug, Clone, Default)]
pub struct TimelineEditor {
    state: EditorState,
    layout: TimelineLayout,
    selected: Option<NoteId>,
}

impl TimelineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn layout(&self) -> &TimelineLayout {
        &self.layout
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.layout.set_zoom(zoom);
    }

    pub fn set_scroll_x(&mut self, scroll_x: f32) {
        self.layout.set_scroll_x(scroll_x);
    }

    pub fn selected(&self) -> Option<NoteId> {
        self.selected
    }

    pub fn select(&mut self, note: Option<NoteId>) {
        self.selected = note;
    }

    pub fn is_scrubbing(&self) -> bool {
        matches!(self.state, EditorState::Scrubbing)
    }

    /// The drag preview, if a note is being dragged
    pub fn preview(&self) -> Option<&NoteDrag> {
        match &self.state {
            EditorState::DraggingNote(drag) => Some(drag),
            _ => None,
        }
    }

    /// Feed one pointer event. `state` is the current store snapshot.
    pub fn handle(&mut self, event: PointerEvent, state: &AppState) -> Option<EditorAction> {
        match (self.state, event) {
            (EditorState::Idle, PointerEvent::Down { target, x, duplicate }) => {
                self.pointer_down(target, x, duplicate, state)
            }
            (EditorState::Scrubbing, PointerEvent::Move { x }) => {
                Some(EditorAction::Seek(self.layout.ruler_position(x)))
            }
            (EditorState::DraggingNote(mut drag), PointerEvent::Move { x }) => {
                self.update_preview(&mut drag, x);
                self.state = EditorState::DraggingNote(drag);
                None
            }
            (EditorState::DraggingNote(mut drag), PointerEvent::Up { x }) => {
                self.update_preview(&mut drag, x);
                self.state = EditorState::Idle;
                Self::finish_drag(&drag).map(EditorAction::Commit)
            }
            (_, PointerEvent::Up { .. }) | (_, PointerEvent::Cancel) => {
                self.state = EditorState::Idle;
                None
            }
            _ => None,
        }
    }

    /// Abandon any scrub or drag without touching the store
    pub fn cancel(&mut self) {
        self.state = EditorState::Idle;
    }

    /// Delete the selected note, if it still exists
    pub fn delete_selected(&mut self, state: &AppState) -> Option<Edit> {
        let id = self.selected.take()?;
        state
            .synth
            .contains(id)
            .then_some(Edit::DeleteNote { id })
    }

    /// Effect dropped onto a track header
    ///
    /// A kind already on the track is rejected; the caller shows the error.
    pub fn drop_effect(
        &self,
        track: TrackId,
        kind: EffectKind,
        state: &AppState,
    ) -> Result<Edit, ValidationError> {
        if !track.is_valid() {
            return Err(ValidationError::UnknownTrack(track));
        }
        if state.effects.contains_kind(track, kind) {
            return Err(ValidationError::DuplicateEffect { track, kind });
        }
        Ok(Edit::add_effect(track, kind))
    }

    fn pointer_down(
        &mut self,
        target: PointerTarget,
        x: f32,
        duplicate: bool,
        state: &AppState,
    ) -> Option<EditorAction> {
        match target {
            PointerTarget::Ruler => {
                self.state = EditorState::Scrubbing;
                Some(EditorAction::Seek(self.layout.ruler_position(x)))
            }
            PointerTarget::DrumLane(track) => {
                let step = self.layout.step_at(x)?;
                Some(EditorAction::Commit(Edit::ToggleStep { track, step }))
            }
            PointerTarget::SynthLane => {
                let Some(hit) = self.layout.hit_test(x, &state.synth) else {
                    self.selected = None;
                    return None;
                };
                self.selected = Some(hit.id);
                let kind = match hit.zone {
                    NoteZone::Edge => DragKind::Resize,
                    NoteZone::Body => DragKind::Move,
                };
                self.state = EditorState::DraggingNote(NoteDrag {
                    kind,
                    note: hit.id,
                    origin_step: hit.step,
                    origin_duration: hit.duration_steps,
                    pointer_origin_x: x,
                    duplicate: duplicate && kind == DragKind::Move,
                    preview_step: hit.step,
                    preview_duration: hit.duration_steps,
                });
                None
            }
        }
    }

    fn update_preview(&self, drag: &mut NoteDrag, x: f32) {
        let delta = self.layout.step_delta(x - drag.pointer_origin_x);
        match drag.kind {
            DragKind::Move => {
                let step = drag.origin_step as i32 + delta;
                drag.preview_step = step.clamp(0, STEPS as i32 - 1) as usize;
            }
            DragKind::Resize => {
                let duration = drag.origin_duration as i32 + delta;
                drag.preview_duration =
                    duration.clamp(MIN_NOTE_DURATION as i32, MAX_NOTE_DURATION as i32) as u8;
            }
        }
    }

    fn finish_drag(drag: &NoteDrag) -> Option<Edit> {
        match drag.kind {
            DragKind::Move if drag.duplicate => {
                Some(Edit::duplicate_note(drag.note, drag.preview_step))
            }
            DragKind::Move => (drag.preview_step != drag.origin_step).then_some(Edit::MoveNote {
                id: drag.note,
                to_step: drag.preview_step,
            }),
            DragKind::Resize => (drag.preview_duration != drag.origin_duration).then_some(
                Edit::ResizeNote {
                    id: drag.note,
                    duration_steps: drag.preview_duration,
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{EffectConfig, SynthNote};

    fn state_with_note(step: usize, duration: u8) -> (AppState, NoteId) {
        let mut state = AppState::new();
        let note = SynthNote::new("A3".parse().unwrap(), duration);
        let id = note.id;
        state.synth = state.synth.with_note(step, note);
        (state, id)
    }

    fn down(target: PointerTarget, x: f32) -> PointerEvent {
        PointerEvent::Down {
            target,
            x,
            duplicate: false,
        }
    }

    #[test]
    fn test_scrub_seeks_and_returns_to_idle() {
        let state = AppState::new();
        let mut editor = TimelineEditor::new();

        let action = editor.handle(down(PointerTarget::Ruler, 240.0), &state);
        assert_eq!(action, Some(EditorAction::Seek(4.0)));
        assert!(editor.is_scrubbing());

        let action = editor.handle(PointerEvent::Move { x: 270.0 }, &state);
        assert_eq!(action, Some(EditorAction::Seek(4.5)));

        assert_eq!(editor.handle(PointerEvent::Up { x: 270.0 }, &state), None);
        assert_eq!(*editor.state(), EditorState::Idle);
    }

    #[test]
    fn test_move_commits_on_release_only() {
        let (state, id) = state_with_note(3, 1);
        let mut editor = TimelineEditor::new();

        assert_eq!(editor.handle(down(PointerTarget::SynthLane, 190.0), &state), None);
        assert_eq!(editor.selected(), Some(id));
        assert_eq!(editor.handle(PointerEvent::Move { x: 310.0 }, &state), None);
        assert_eq!(editor.preview().map(|d| d.preview_step), Some(5));

        let action = editor.handle(PointerEvent::Up { x: 310.0 }, &state);
        assert_eq!(
            action,
            Some(EditorAction::Commit(Edit::MoveNote { id, to_step: 5 }))
        );
        assert!(editor.preview().is_none());
    }

    #[test]
    fn test_move_clamps_to_loop() {
        let (state, id) = state_with_note(14, 1);
        let mut editor = TimelineEditor::new();
        editor.handle(down(PointerTarget::SynthLane, 850.0), &state);
        let action = editor.handle(PointerEvent::Up { x: 2000.0 }, &state);
        assert_eq!(
            action,
            Some(EditorAction::Commit(Edit::MoveNote { id, to_step: 15 }))
        );
    }

    #[test]
    fn test_duplicate_drag_keeps_original() {
        let (state, id) = state_with_note(3, 2);
        let mut editor = TimelineEditor::new();
        editor.handle(
            PointerEvent::Down {
                target: PointerTarget::SynthLane,
                x: 200.0,
                duplicate: true,
            },
            &state,
        );
        match editor.handle(PointerEvent::Up { x: 440.0 }, &state) {
            Some(EditorAction::Commit(Edit::DuplicateNote {
                id: source,
                to_step,
                new_id,
            })) => {
                assert_eq!(source, id);
                assert_eq!(to_step, 7);
                assert_ne!(new_id, id);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_resize_from_trailing_edge() {
        let (state, id) = state_with_note(0, 2);
        let mut editor = TimelineEditor::new();
        // note spans [0, 118); edge zone starts past 108
        editor.handle(down(PointerTarget::SynthLane, 112.0), &state);
        assert_eq!(editor.preview().map(|d| d.kind), Some(DragKind::Resize));

        let action = editor.handle(PointerEvent::Up { x: 292.0 }, &state);
        assert_eq!(
            action,
            Some(EditorAction::Commit(Edit::ResizeNote {
                id,
                duration_steps: 5
            }))
        );

        editor.handle(down(PointerTarget::SynthLane, 112.0), &state);
        let action = editor.handle(PointerEvent::Up { x: -5000.0 }, &state);
        assert_eq!(
            action,
            Some(EditorAction::Commit(Edit::ResizeNote {
                id,
                duration_steps: 1
            }))
        );
    }

    #[test]
    fn test_cancel_leaves_store_untouched() {
        let (state, _) = state_with_note(3, 1);
        let mut editor = TimelineEditor::new();
        editor.handle(down(PointerTarget::SynthLane, 190.0), &state);
        editor.handle(PointerEvent::Move { x: 400.0 }, &state);
        assert_eq!(editor.handle(PointerEvent::Cancel, &state), None);
        assert_eq!(*editor.state(), EditorState::Idle);
        assert_eq!(editor.handle(PointerEvent::Up { x: 400.0 }, &state), None);
    }

    #[test]
    fn test_release_in_place_commits_nothing() {
        let (state, _) = state_with_note(3, 1);
        let mut editor = TimelineEditor::new();
        editor.handle(down(PointerTarget::SynthLane, 190.0), &state);
        assert_eq!(editor.handle(PointerEvent::Up { x: 200.0 }, &state), None);
    }

    #[test]
    fn test_drum_lane_toggles_cell() {
        let state = AppState::new();
        let mut editor = TimelineEditor::new();
        let action = editor.handle(down(PointerTarget::DrumLane(2), 125.0), &state);
        assert_eq!(
            action,
            Some(EditorAction::Commit(Edit::ToggleStep { track: 2, step: 2 }))
        );
        assert_eq!(*editor.state(), EditorState::Idle);
    }

    #[test]
    fn test_delete_selected() {
        let (state, id) = state_with_note(3, 1);
        let mut editor = TimelineEditor::new();
        assert_eq!(editor.delete_selected(&state), None);

        editor.select(Some(id));
        assert_eq!(editor.delete_selected(&state), Some(Edit::DeleteNote { id }));
        assert_eq!(editor.selected(), None);
    }

    #[test]
    fn test_click_on_empty_lane_clears_selection() {
        let (state, id) = state_with_note(3, 1);
        let mut editor = TimelineEditor::new();
        editor.select(Some(id));
        editor.handle(down(PointerTarget::SynthLane, 10.0), &state);
        assert_eq!(editor.selected(), None);
    }

    #[test]
    fn test_drop_effect_rejects_duplicate_kind() {
        let mut state = AppState::new();
        let editor = TimelineEditor::new();
        let track = TrackId::Drum(1);

        assert!(editor.drop_effect(track, EffectKind::Reverb, &state).is_ok());
        state.effects = state
            .effects
            .with_chain(track, vec![EffectConfig::new(EffectKind::Reverb)]);
        assert_eq!(
            editor.drop_effect(track, EffectKind::Reverb, &state),
            Err(ValidationError::DuplicateEffect {
                track,
                kind: EffectKind::Reverb
            })
        );
        assert!(editor.drop_effect(TrackId::Drum(10), EffectKind::Delay, &state).is_err());
    }
}
