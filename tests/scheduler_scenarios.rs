// Transport + scheduler scenarios, end to end without audio

use loopstation::command::{Edit, PatternStore};
use loopstation::pattern::{AppState, Pitch, SynthNote, TrackId};
use loopstation::sequencer::{
    Clock, SchedulingMiss, StepScheduler, Tick, Transport, Trigger, TriggerSink,
};

fn kick_on(steps: &[usize]) -> PatternStore {
    let mut store = PatternStore::new(AppState::new());
    for &step in steps {
        store.commit(&Edit::ToggleStep { track: 0, step }).unwrap();
    }
    store
}

/// Drive `seconds` of playback; returns every trigger delivered
fn play(
    transport: &mut Transport,
    scheduler: &mut StepScheduler,
    state: &AppState,
    seconds: f64,
) -> Vec<Trigger> {
    let mut sink = Vec::new();
    for tick in transport.advance(seconds) {
        scheduler.on_tick(tick, state, &mut sink);
    }
    sink
}

#[test]
fn test_four_on_the_floor_at_120_bpm() {
    let store = kick_on(&[0, 4, 8, 12]);
    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    transport.start();
    scheduler.start();

    let triggers = play(&mut transport, &mut scheduler, store.current(), 2.0);
    let times: Vec<f64> = triggers.iter().map(|t| t.time).collect();
    assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
    assert!(triggers.iter().all(|t| t.track == TrackId::Drum(0)));
    assert!(triggers.iter().all(|t| t.voice.frequency.is_some()));
    assert_eq!(triggers[0].voice.duration, 0.25);
}

#[test]
fn test_synth_note_timing() {
    let mut state = AppState::new();
    let note = SynthNote::new(Pitch::new(9, 4), 4);
    state.synth = state.synth.with_note(2, note);

    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    transport.start();
    scheduler.start();

    let triggers = play(&mut transport, &mut scheduler, &state, 2.0);
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].time, 0.25);
    assert_eq!(triggers[0].voice.duration, 0.5);
    assert_eq!(triggers[0].voice.frequency, Some(440.0));
}

#[test]
fn test_loop_wraps_and_steps_stay_in_range() {
    let store = kick_on(&[0]);
    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    transport.start();
    scheduler.start();

    let mut sink = Vec::new();
    for tick in transport.advance(6.0) {
        scheduler.on_tick(tick, store.current(), &mut sink);
        assert!(scheduler.current_step().is_some_and(|s| s < 16));
    }
    let times: Vec<f64> = sink.iter().map(|t| t.time).collect();
    assert_eq!(times, vec![0.0, 2.0, 4.0]);
    assert_eq!(scheduler.stats().ticks, 48);
}

#[test]
fn test_edit_between_ticks_is_heard_on_next_tick() {
    let mut store = kick_on(&[]);
    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    transport.start();
    scheduler.start();

    // steps 0 and 1
    assert!(play(&mut transport, &mut scheduler, &store.snapshot(), 0.25).is_empty());

    store.commit(&Edit::ToggleStep { track: 1, step: 2 }).unwrap();
    let triggers = play(&mut transport, &mut scheduler, &store.snapshot(), 0.125);
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].track, TrackId::Drum(1));
    assert_eq!(triggers[0].time, 0.25);
}

#[test]
fn test_scrub_while_playing_jumps_the_playhead() {
    let store = kick_on(&[8]);
    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    transport.start();
    scheduler.start();

    play(&mut transport, &mut scheduler, store.current(), 0.25);
    transport.set_position_in_steps(8.0);
    let triggers = play(&mut transport, &mut scheduler, store.current(), 0.125);
    assert_eq!(triggers.len(), 1);
    assert_eq!(scheduler.current_step(), Some(8));
}

#[test]
fn test_muted_lane_is_silent() {
    let mut store = kick_on(&[0, 4]);
    store.commit(&Edit::SetTrackMute { track: 0, muted: true }).unwrap();

    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    transport.start();
    scheduler.start();
    assert!(play(&mut transport, &mut scheduler, store.current(), 2.0).is_empty());
}

#[test]
fn test_stop_deregisters_and_repeated_tick_is_ignored() {
    let store = kick_on(&[0]);
    let mut scheduler = StepScheduler::new();
    let mut sink: Vec<Trigger> = Vec::new();

    let tick = Tick { position: 0, time: 0.0 };
    assert_eq!(scheduler.on_tick(tick, store.current(), &mut sink), 0);

    scheduler.start();
    assert_eq!(scheduler.on_tick(tick, store.current(), &mut sink), 1);
    assert_eq!(scheduler.on_tick(tick, store.current(), &mut sink), 0);

    scheduler.stop();
    assert_eq!(scheduler.current_step(), None);
    assert_eq!(scheduler.on_tick(Tick { position: 16, time: 2.0 }, store.current(), &mut sink), 0);
    assert_eq!(sink.len(), 1);
}

/// Sink whose first drum lane has no instrument
struct MissingKick(Vec<Trigger>);

impl TriggerSink for MissingKick {
    fn fire(&mut self, trigger: &Trigger) -> Result<(), SchedulingMiss> {
        if trigger.track == TrackId::Drum(0) {
            return Err(SchedulingMiss {
                track: trigger.track,
                instrument: trigger.instrument.to_string(),
                reason: "instrument not built".into(),
            });
        }
        self.0.push(trigger.clone());
        Ok(())
    }
}

#[test]
fn test_missing_instrument_drops_only_its_trigger() {
    let mut store = kick_on(&[0, 8]);
    store.commit(&Edit::ToggleStep { track: 1, step: 0 }).unwrap();
    store.commit(&Edit::ToggleStep { track: 1, step: 8 }).unwrap();

    let mut transport = Transport::new(120.0);
    let mut scheduler = StepScheduler::new();
    let mut sink = MissingKick(Vec::new());
    transport.start();
    scheduler.start();
    for tick in transport.advance(2.0) {
        scheduler.on_tick(tick, store.current(), &mut sink);
    }

    assert_eq!(sink.0.len(), 2);
    let stats = scheduler.stats();
    assert_eq!(stats.fired, 2);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.ticks, 16);
}
