// Transport - Musical clock in sixteenth-note steps
//
// The `Clock` trait is what the session consumes; `Transport` is the default
// implementation. It is driven by host time: `advance()` moves the playhead
// and returns one `Tick` per step boundary crossed, stamped with the exact
// host time of that boundary.

use crate::pattern::state::{MAX_BPM, MIN_BPM};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Musical clock
pub trait Clock {
    /// Playhead in sixteenth steps since the loop start (fractional)
    fn position_in_steps(&self) -> f64;

    fn start(&mut self);

    /// Stop advancing, keep the position
    fn pause(&mut self);

    /// Stop advancing and rewind to 0
    fn stop(&mut self);

    /// Move the playhead; allowed while playing
    fn set_position_in_steps(&mut self, steps: f64);

    fn set_tempo(&mut self, bpm: f64);

    fn state(&self) -> TransportState;

    fn tempo(&self) -> f64;

    /// Host time in seconds; runs whether or not the transport is playing
    fn now(&self) -> f64;

    /// Advance host time by `seconds`; returns the ticks in [old, new) position
    fn advance(&mut self, seconds: f64) -> Vec<Tick>;
}

/// A step boundary crossed while playing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Absolute step count (not wrapped to the loop length)
    pub position: u64,
    /// Host time of the boundary, in seconds
    pub time: f64,
}

/// Default clock implementation
///
/// # Example
/// ```
/// use loopstation::sequencer::transport::{Clock, Transport};
///
/// let mut transport = Transport::new(120.0);
/// transport.start();
/// // 120 BPM: one step every 0.125 s
/// let ticks = transport.advance(0.5);
/// assert_eq!(ticks.len(), 4);
/// assert_eq!(ticks[1].time, 0.125);
/// ```
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    bpm: f64,
    position: f64,
    /// Host time in seconds
    now: f64,
}

impl Transport {
    pub fn new(bpm: f64) -> Self {
        Self {
            state: TransportState::Stopped,
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
            position: 0.0,
            now: 0.0,
        }
    }

    /// Steps per second at the current tempo
    pub fn steps_per_second(&self) -> f64 {
        self.bpm / 60.0 * 4.0
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(crate::pattern::state::DEFAULT_BPM)
    }
}

impl Clock for Transport {
    fn position_in_steps(&self) -> f64 {
        self.position
    }

    fn start(&mut self) {
        self.state = TransportState::Playing;
    }

    fn pause(&mut self) {
        if self.state.is_playing() {
            self.state = TransportState::Paused;
        }
    }

    fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
    }

    fn set_position_in_steps(&mut self, steps: f64) {
        self.position = steps.max(0.0);
    }

    fn set_tempo(&mut self, bpm: f64) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn tempo(&self) -> f64 {
        self.bpm
    }

    fn now(&self) -> f64 {
        self.now
    }

    fn advance(&mut self, seconds: f64) -> Vec<Tick> {
        let seconds = seconds.max(0.0);
        let start_time = self.now;
        self.now += seconds;

        if !self.state.is_playing() {
            return Vec::new();
        }

        let rate = self.steps_per_second();
        let from = self.position;
        let to = from + seconds * rate;

        let first = from.ceil() as u64;
        let ticks = (first..)
            .take_while(|k| (*k as f64) < to)
            .map(|k| Tick {
                position: k,
                time: start_time + (k as f64 - from) / rate,
            })
            .collect();

        self.position = to;
        ticks
    }
}
