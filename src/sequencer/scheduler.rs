// Step Scheduler - Turns clock ticks into instrument triggers
//
// One tick per sixteenth step. Each tick reads a single AppState snapshot and
// schedules every voice that starts on that step at the tick's own timestamp.

use super::transport::Tick;
use crate::audio::instrument::{InstrumentSpec, drum_voicing};
use crate::pattern::{AppState, STEPS, TrackId};
use crate::synth::VoiceTrigger;

/// A voice to start on a track's instrument
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub track: TrackId,
    pub instrument: InstrumentSpec,
    pub voice: VoiceTrigger,
    /// Absolute time in seconds
    pub time: f64,
}

/// A trigger that could not be delivered
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("dropped trigger on {track} ({instrument}): {reason}")]
pub struct SchedulingMiss {
    pub track: TrackId,
    pub instrument: String,
    pub reason: String,
}

/// Receiver of scheduled triggers
pub trait TriggerSink {
    fn fire(&mut self, trigger: &Trigger) -> Result<(), SchedulingMiss>;
}

/// Collects triggers, mostly for offline planning and tests
impl TriggerSink for Vec<Trigger> {
    fn fire(&mut self, trigger: &Trigger) -> Result<(), SchedulingMiss> {
        self.push(trigger.clone());
        Ok(())
    }
}

/// Loop step for an absolute clock position
#[inline]
pub fn step_for_position(position: u64) -> usize {
    (position % STEPS as u64) as usize
}

/// Every trigger starting on `step`, stamped with `time`
pub fn triggers_for_step(state: &AppState, step: usize, time: f64) -> Vec<Trigger> {
    let step_duration = state.step_duration();
    let mut triggers = Vec::new();

    for (index, track) in state.drums.tracks().enumerate() {
        if !track.fires_on(step) {
            continue;
        }
        let voicing = drum_voicing(track.kind, track.variant);
        triggers.push(Trigger {
            track: TrackId::Drum(index),
            instrument: InstrumentSpec::drum(track.kind, track.variant),
            voice: VoiceTrigger::new(
                voicing.pitch.map(|p| p.frequency()),
                (voicing.duration_steps as f64 * step_duration) as f32,
                1.0,
            ),
            time,
        });
    }

    for note in state.synth.slot(step) {
        triggers.push(Trigger {
            track: TrackId::Synth,
            instrument: InstrumentSpec::synth(note.instrument_id()),
            voice: VoiceTrigger::new(
                Some(note.pitch.frequency()),
                (note.duration_steps as f64 * step_duration) as f32,
                note.gain(),
            ),
            time,
        });
    }

    triggers
}

/// One full loop pass starting at time 0 (offline rendering)
pub fn plan_loop(state: &AppState) -> Vec<Trigger> {
    let step_duration = state.step_duration();
    (0..STEPS)
        .flat_map(|step| triggers_for_step(state, step, step as f64 * step_duration))
        .collect()
}

/// Tick and trigger counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub fired: u64,
    pub dropped: u64,
}

/// Tick-driven trigger scheduling
///
/// # Example
/// ```
/// use loopstation::pattern::AppState;
/// use loopstation::sequencer::scheduler::{StepScheduler, Trigger};
/// use loopstation::sequencer::transport::Tick;
///
/// let mut scheduler = StepScheduler::new();
/// scheduler.start();
/// let mut sink: Vec<Trigger> = Vec::new();
/// scheduler.on_tick(Tick { position: 17, time: 2.125 }, &AppState::new(), &mut sink);
/// assert_eq!(scheduler.current_step(), Some(1));
/// ```
#[derive(Debug, Default)]
pub struct StepScheduler {
    active: bool,
    current_step: Option<usize>,
    last_position: Option<u64>,
    stats: SchedulerStats,
}

impl StepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for ticks; the displayed step is cleared
    pub fn start(&mut self) {
        self.active = true;
        self.current_step = None;
        self.last_position = None;
    }

    /// Deregister; later ticks are ignored until `start()`
    pub fn stop(&mut self) {
        self.active = false;
        self.current_step = None;
        self.last_position = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Step of the last processed tick
    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Process one tick. Returns the number of triggers delivered.
    ///
    /// A tick for the position that was just processed is ignored. Misses are
    /// counted and never stop later triggers.
    pub fn on_tick<S>(&mut self, tick: Tick, state: &AppState, sink: &mut S) -> usize
    where
        S: TriggerSink + ?Sized,
    {
        if !self.active || self.last_position == Some(tick.position) {
            return 0;
        }

        let step = step_for_position(tick.position);
        self.last_position = Some(tick.position);
        self.current_step = Some(step);
        self.stats.ticks += 1;

        let mut fired = 0;
        for trigger in triggers_for_step(state, step, tick.time) {
            match sink.fire(&trigger) {
                Ok(()) => fired += 1,
                Err(miss) => {
                    self.stats.dropped += 1;
                    log::trace!("{}", miss);
                }
            }
        }
        self.stats.fired += fired as u64;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{DrumKind, DrumTrack, Pitch, StepMask, SynthNote};

    fn state_with_kick(steps: &[usize]) -> AppState {
        let mut state = AppState::new();
        let mut kick = DrumTrack::new(DrumKind::Kick);
        kick.steps = StepMask::from_steps(steps);
        state.drums = state.drums.with_track(0, kick);
        state
    }

    struct Refusing;

    impl TriggerSink for Refusing {
        fn fire(&mut self, trigger: &Trigger) -> Result<(), SchedulingMiss> {
            Err(SchedulingMiss {
                track: trigger.track,
                instrument: trigger.instrument.to_string(),
                reason: "not built".into(),
            })
        }
    }

    #[test]
    fn test_step_wraps_position() {
        assert_eq!(step_for_position(0), 0);
        assert_eq!(step_for_position(15), 15);
        assert_eq!(step_for_position(16), 0);
        assert_eq!(step_for_position(16 * 1000 + 7), 7);
    }

    #[test]
    fn test_kick_triggers_on_quarter_notes() {
        let state = state_with_kick(&[0, 4, 8, 12]);
        let plan = plan_loop(&state);
        let times: Vec<f64> = plan.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);

        let first = &plan[0];
        assert_eq!(first.track, TrackId::Drum(0));
        assert_eq!(first.voice.frequency, Some(Pitch::new(0, 1).frequency()));
        assert!((first.voice.duration - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_muted_track_is_silent() {
        let mut state = state_with_kick(&[0, 4]);
        let mut kick = state.drums.track(0).cloned().unwrap();
        kick.muted = true;
        state.drums = state.drums.with_track(0, kick);
        assert!(plan_loop(&state).is_empty());
    }

    #[test]
    fn test_synth_note_duration_follows_tempo() {
        let mut state = AppState::new();
        let note = SynthNote::new("E4".parse().unwrap(), 4).with_velocity(0.5);
        state.synth = state.synth.with_note(2, note);

        let triggers = triggers_for_step(&state, 2, 0.25);
        assert_eq!(triggers.len(), 1);
        let trigger = &triggers[0];
        assert_eq!(trigger.track, TrackId::Synth);
        assert_eq!(trigger.instrument, InstrumentSpec::synth("basic"));
        assert_eq!(trigger.time, 0.25);
        assert!((trigger.voice.duration - 0.5).abs() < 1e-6);
        assert_eq!(trigger.voice.velocity, 0.5);
    }

    #[test]
    fn test_repeated_position_is_ignored() {
        let state = state_with_kick(&[3]);
        let mut scheduler = StepScheduler::new();
        let mut sink = Vec::new();
        scheduler.start();

        let tick = Tick { position: 3, time: 0.375 };
        assert_eq!(scheduler.on_tick(tick, &state, &mut sink), 1);
        assert_eq!(scheduler.on_tick(tick, &state, &mut sink), 0);
        assert_eq!(sink.len(), 1);
        assert_eq!(scheduler.stats().ticks, 1);
    }

    #[test]
    fn test_stop_deregisters_and_clears_step() {
        let state = state_with_kick(&[0]);
        let mut scheduler = StepScheduler::new();
        let mut sink = Vec::new();

        assert_eq!(scheduler.on_tick(Tick { position: 0, time: 0.0 }, &state, &mut sink), 0);
        scheduler.start();
        scheduler.on_tick(Tick { position: 16, time: 2.0 }, &state, &mut sink);
        assert_eq!(scheduler.current_step(), Some(0));

        scheduler.stop();
        assert_eq!(scheduler.current_step(), None);
        scheduler.on_tick(Tick { position: 32, time: 4.0 }, &state, &mut sink);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_misses_are_counted_not_fatal() {
        let state = state_with_kick(&[0, 1]);
        let mut scheduler = StepScheduler::new();
        scheduler.start();

        scheduler.on_tick(Tick { position: 0, time: 0.0 }, &state, &mut Refusing);
        scheduler.on_tick(Tick { position: 1, time: 0.125 }, &state, &mut Refusing);
        let stats = scheduler.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.fired, 0);
    }
}
