// Undo/redo laws over randomized edit sequences

use loopstation::command::{Edit, PatternStore};
use loopstation::pattern::{AppState, DrumKind, EffectKind, Pitch, STEPS, SynthNote, TrackId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn random_edit(rng: &mut StdRng, state: &AppState) -> Edit {
    let note_ids: Vec<_> = state.synth.notes().map(|(_, n)| n.id).collect();
    let track = rng.gen_range(0..DrumKind::ALL.len());

    match rng.gen_range(0..10) {
        0 | 1 => Edit::ToggleStep {
            track,
            step: rng.gen_range(0..STEPS),
        },
        2 => {
            let kind = DrumKind::ALL[track];
            match kind.variants().choose(rng) {
                Some(&variant) => Edit::SetDrumVariant { track, variant },
                None => Edit::ClearDrums,
            }
        }
        3 => Edit::SetTrackGain {
            track,
            gain_db: rng.gen_range(-60.0..=0.0),
        },
        4 => Edit::SetTempo {
            bpm: rng.gen_range(60.0..=180.0_f64).round(),
        },
        5 => {
            let kind = *EffectKind::ALL.choose(rng).unwrap_or(&EffectKind::Reverb);
            let lane = if rng.gen_bool(0.5) {
                TrackId::Synth
            } else {
                TrackId::Drum(track)
            };
            Edit::add_effect(lane, kind)
        }
        _ => match note_ids.choose(rng) {
            Some(&id) if rng.gen_bool(0.6) => match rng.gen_range(0..4) {
                0 => Edit::MoveNote {
                    id,
                    to_step: rng.gen_range(0..STEPS),
                },
                1 => Edit::ResizeNote {
                    id,
                    duration_steps: rng.gen_range(1..=16),
                },
                2 => Edit::duplicate_note(id, rng.gen_range(0..STEPS)),
                _ => Edit::DeleteNote { id },
            },
            _ => Edit::AddNote {
                step: rng.gen_range(0..STEPS),
                note: SynthNote::new(Pitch::new(rng.gen_range(0..12), rng.gen_range(1..6)), 2),
            },
        },
    }
}

/// Commit `count` random edits; returns every state reached, initial first
fn run(store: &mut PatternStore, rng: &mut StdRng, count: usize) -> Vec<Arc<AppState>> {
    let mut states = vec![store.snapshot()];
    for _ in 0..count {
        let edit = random_edit(rng, store.current());
        if store.commit(&edit).is_ok() {
            states.push(store.snapshot());
        } else {
            // rejected edits never move the store
            assert!(Arc::ptr_eq(states.last().unwrap(), &store.snapshot()));
        }
    }
    states
}

#[test]
fn test_every_reachable_state_is_valid() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut store = PatternStore::new(AppState::new());
    for state in run(&mut store, &mut rng, 300) {
        assert!(state.check_invariants().is_ok());
        assert!(state.effects.kinds_are_unique());
    }
}

#[test]
fn test_undo_walks_back_through_every_state() {
    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = PatternStore::with_capacity(AppState::new(), 1000);
        let states = run(&mut store, &mut rng, 60);

        for expected in states.iter().rev().skip(1) {
            assert!(store.undo().is_some());
            assert_eq!(store.current(), expected.as_ref());
        }
        assert!(store.undo().is_none());
        assert_eq!(store.current(), &AppState::new());

        for expected in states.iter().skip(1) {
            assert!(store.redo().is_some());
            assert_eq!(store.current(), expected.as_ref());
        }
        assert!(store.redo().is_none());
    }
}

#[test]
fn test_undo_then_redo_is_identity() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut store = PatternStore::new(AppState::new());
    run(&mut store, &mut rng, 40);

    let before = store.snapshot();
    let undo_label = store.undo_description().map(str::to_string);
    store.undo();
    assert_eq!(store.redo_description().map(str::to_string), undo_label);
    store.redo();
    assert_eq!(store.current(), before.as_ref());
}

#[test]
fn test_inverse_move_restores_pattern() {
    let mut store = PatternStore::new(AppState::new());
    let note = SynthNote::new("E3".parse().unwrap(), 2);
    let id = note.id;
    store.commit(&Edit::AddNote { step: 3, note }).unwrap();
    let before = store.snapshot();

    store.commit(&Edit::MoveNote { id, to_step: 9 }).unwrap();
    store.commit(&Edit::MoveNote { id, to_step: 3 }).unwrap();
    assert_eq!(store.current(), before.as_ref());

    store.commit(&Edit::ResizeNote { id, duration_steps: 7 }).unwrap();
    store.commit(&Edit::ResizeNote { id, duration_steps: 2 }).unwrap();
    assert_eq!(store.current(), before.as_ref());
}

#[test]
fn test_history_is_bounded() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut store = PatternStore::with_capacity(AppState::new(), 10);
    run(&mut store, &mut rng, 100);
    assert!(store.undo_count() <= 10);

    let mut undone = 0;
    while store.undo().is_some() {
        undone += 1;
    }
    assert!(undone <= 10);
}
