// Timeline editor gestures applied to a pattern store

use loopstation::command::{Edit, PatternStore};
use loopstation::editor::{EditorAction, EditorState, PointerEvent, PointerTarget, TimelineEditor};
use loopstation::pattern::{AppState, EffectKind, NoteId, SynthNote, TrackId};

fn store_with_note(step: usize, duration: u8) -> (PatternStore, NoteId) {
    let note = SynthNote::new("G3".parse().unwrap(), duration);
    let id = note.id;
    let mut store = PatternStore::new(AppState::new());
    store.commit(&Edit::AddNote { step, note }).unwrap();
    (store, id)
}

/// Press, drag to `to_x` and release on the synth lane; commits any resulting edit
fn drag(
    editor: &mut TimelineEditor,
    store: &mut PatternStore,
    from_x: f32,
    to_x: f32,
    duplicate: bool,
) -> Option<Edit> {
    let state = store.snapshot();
    let down = PointerEvent::Down {
        target: PointerTarget::SynthLane,
        x: from_x,
        duplicate,
    };
    assert_eq!(editor.handle(down, &state), None);
    assert_eq!(editor.handle(PointerEvent::Move { x: to_x }, &state), None);
    // nothing lands in the store before release
    assert!(std::sync::Arc::ptr_eq(&state, &store.snapshot()));

    match editor.handle(PointerEvent::Up { x: to_x }, &state) {
        Some(EditorAction::Commit(edit)) => {
            store.commit(&edit).unwrap();
            Some(edit)
        }
        Some(other) => panic!("unexpected action {:?}", other),
        None => None,
    }
}

#[test]
fn test_duplicate_drag_creates_an_independent_copy() {
    let (mut store, id) = store_with_note(3, 2);
    let mut editor = TimelineEditor::new();

    drag(&mut editor, &mut store, 200.0, 440.0, true).unwrap();

    let state = store.current();
    assert_eq!(state.synth.note_count(), 2);
    let (step, original) = state.synth.locate(id).unwrap();
    assert_eq!(step, 3);
    let copy = &state.synth.slot(7)[0];
    assert_ne!(copy.id, original.id);
    assert_eq!(copy.pitch, original.pitch);
    assert_eq!(copy.duration_steps, original.duration_steps);
}

#[test]
fn test_resize_from_trailing_edge() {
    let (mut store, id) = store_with_note(3, 2);
    let mut editor = TimelineEditor::new();

    // block spans 180..298, the last 10 px resize
    drag(&mut editor, &mut store, 295.0, 475.0, false).unwrap();
    assert_eq!(store.current().synth.locate(id).unwrap().1.duration_steps, 5);

    // resizing back is the same pattern as before
    drag(&mut editor, &mut store, 475.0, 295.0, false).unwrap();
    assert_eq!(store.current().synth.locate(id).unwrap().1.duration_steps, 2);
}

#[test]
fn test_resize_clamps_to_loop_length() {
    let (mut store, id) = store_with_note(0, 1);
    let mut editor = TimelineEditor::new();
    drag(&mut editor, &mut store, 55.0, 5000.0, false).unwrap();
    assert_eq!(store.current().synth.locate(id).unwrap().1.duration_steps, 16);
}

#[test]
fn test_zoom_and_scroll_change_the_grid() {
    let (mut store, id) = store_with_note(3, 2);
    let mut editor = TimelineEditor::new();
    editor.set_zoom(2.0);

    // 120 px per step: two steps right
    drag(&mut editor, &mut store, 400.0, 640.0, false).unwrap();
    assert_eq!(store.current().synth.locate(id).unwrap().0, 5);

    editor.set_zoom(1.0);
    editor.set_scroll_x(120.0);
    // step 5 starts at content 300, viewport 180
    drag(&mut editor, &mut store, 190.0, 130.0, false).unwrap();
    assert_eq!(store.current().synth.locate(id).unwrap().0, 4);
}

#[test]
fn test_small_drag_commits_nothing() {
    let (mut store, _) = store_with_note(3, 2);
    let mut editor = TimelineEditor::new();
    let undo_before = store.undo_count();

    assert_eq!(drag(&mut editor, &mut store, 200.0, 220.0, false), None);
    assert_eq!(store.undo_count(), undo_before);
}

#[test]
fn test_cancel_leaves_store_untouched() {
    let (store, id) = store_with_note(3, 2);
    let mut editor = TimelineEditor::new();
    let state = store.snapshot();

    let down = PointerEvent::Down {
        target: PointerTarget::SynthLane,
        x: 200.0,
        duplicate: false,
    };
    editor.handle(down, &state);
    editor.handle(PointerEvent::Move { x: 600.0 }, &state);
    assert_eq!(editor.preview().map(|d| d.preview_step), Some(10));

    assert_eq!(editor.handle(PointerEvent::Cancel, &state), None);
    assert_eq!(*editor.state(), EditorState::Idle);
    assert_eq!(store.current().synth.locate(id).unwrap().0, 3);
}

#[test]
fn test_delete_selected_note() {
    let (mut store, id) = store_with_note(3, 2);
    let mut editor = TimelineEditor::new();

    drag(&mut editor, &mut store, 200.0, 200.0, false);
    assert_eq!(editor.selected(), Some(id));

    let edit = editor.delete_selected(store.current()).unwrap();
    store.commit(&edit).unwrap();
    assert!(store.current().synth.is_empty());
    assert_eq!(editor.selected(), None);
    assert!(editor.delete_selected(store.current()).is_none());
}

#[test]
fn test_drum_cell_click_toggles() {
    let mut store = PatternStore::new(AppState::new());
    let mut editor = TimelineEditor::new();

    let down = PointerEvent::Down {
        target: PointerTarget::DrumLane(2),
        x: 130.0,
        duplicate: false,
    };
    let Some(EditorAction::Commit(edit)) = editor.handle(down, store.current()) else {
        panic!("drum click should commit");
    };
    store.commit(&edit).unwrap();
    assert!(store.current().drum_track(2).unwrap().is_active(2));
    assert_eq!(*editor.state(), EditorState::Idle);
}

#[test]
fn test_dropping_the_same_effect_twice_keeps_one() {
    let mut store = PatternStore::new(AppState::new());
    let editor = TimelineEditor::new();
    let track = TrackId::Drum(1);

    let edit = editor.drop_effect(track, EffectKind::Reverb, store.current()).unwrap();
    store.commit(&edit).unwrap();
    assert!(editor.drop_effect(track, EffectKind::Reverb, store.current()).is_err());

    let kinds: Vec<EffectKind> = store.current().effect_chain(track).iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EffectKind::Reverb]);
}
