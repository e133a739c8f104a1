// Render engine - In-process audio backend
//
// Owns instrument, effect and gain nodes in an arena, routes them through a
// `RoutingGraph` and renders stereo blocks. Triggers are queued with their
// absolute time and start on the exact frame; a block is split wherever an
// event falls inside it.
//
// The master stage flushes denormals and soft-clips, the same output
// protection a live callback would apply.

use super::backend::{AudioBackend, BackendError, NodeHandle, VoiceTrigger};
use super::dsp_utils::{Frame, OnePoleSmoother, SILENCE, db_to_gain, flush_denormals_to_zero, soft_clip};
use super::instrument::InstrumentSpec;
use super::routing::RoutingGraph;
use crate::pattern::{EffectKind, EffectParams};
use crate::synth::effect::{Effect, build_effect};
use crate::synth::instrument::Instrument;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Default cap on live nodes (master excluded)
pub const DEFAULT_MAX_NODES: usize = 512;

/// Gain-stage smoothing time, also the rebuild fade-in length
const GAIN_SMOOTHING_MS: f32 = 5.0;

enum EngineNode {
    Instrument(Instrument),
    Effect(Box<dyn Effect>),
    Gain {
        target: f32,
        smoother: OnePoleSmoother,
    },
    Master,
}

impl EngineNode {
    /// Transform `buffer` (which holds the summed input) in place
    fn process(&mut self, buffer: &mut [Frame]) {
        match self {
            EngineNode::Instrument(instrument) => {
                // instruments have no input; their voices replace it
                instrument.render(buffer);
            }
            EngineNode::Effect(effect) => {
                for frame in buffer.iter_mut() {
                    *frame = effect.process(*frame);
                }
            }
            EngineNode::Gain { target, smoother } => {
                for frame in buffer.iter_mut() {
                    let gain = smoother.process(*target);
                    *frame = (frame.0 * gain, frame.1 * gain);
                }
            }
            EngineNode::Master => {
                for frame in buffer.iter_mut() {
                    *frame = (
                        soft_clip(flush_denormals_to_zero(frame.0)),
                        soft_clip(flush_denormals_to_zero(frame.1)),
                    );
                }
            }
        }
    }
}

enum EventAction {
    Start(VoiceTrigger),
    /// Release held voices of this pitch
    Release(Option<f32>),
}

/// Voice start or release waiting for its frame
struct ScheduledEvent {
    frame: u64,
    /// Insertion order, breaks ties between events on the same frame
    seq: u64,
    node: NodeHandle,
    action: EventAction,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.frame, self.seq).cmp(&(other.frame, other.seq))
    }
}

/// Offline / pull-model audio backend
///
/// # Example
/// ```
/// use loopstation::audio::backend::{AudioBackend, VoiceTrigger};
/// use loopstation::audio::engine::RenderEngine;
/// use loopstation::audio::instrument::InstrumentSpec;
///
/// let mut engine = RenderEngine::new(44100.0);
/// let synth = engine.create_instrument(&InstrumentSpec::synth("basic")).unwrap();
/// let master = engine.master();
/// engine.connect(synth, master).unwrap();
/// engine.trigger(synth, &VoiceTrigger::new(Some(440.0), 0.1, 1.0), 0.0).unwrap();
///
/// let mut block = vec![(0.0, 0.0); 512];
/// engine.render(&mut block);
/// assert!(block.iter().any(|(l, _)| *l != 0.0));
/// ```
pub struct RenderEngine {
    sample_rate: f32,
    nodes: HashMap<NodeHandle, EngineNode>,
    graph: RoutingGraph,
    /// Per-node scratch buffers, reused across blocks
    buffers: HashMap<NodeHandle, Vec<Frame>>,
    master: NodeHandle,
    next_id: u64,
    max_nodes: usize,
    events: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
    /// Frames rendered so far; the engine clock
    frame: u64,
}

impl RenderEngine {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_max_nodes(sample_rate, DEFAULT_MAX_NODES)
    }

    pub fn with_max_nodes(sample_rate: f32, max_nodes: usize) -> Self {
        let master = NodeHandle(0);
        let mut graph = RoutingGraph::new();
        graph.add_node(master);
        let mut nodes = HashMap::new();
        nodes.insert(master, EngineNode::Master);

        Self {
            sample_rate,
            nodes,
            graph,
            buffers: HashMap::new(),
            master,
            next_id: 1,
            max_nodes,
            events: BinaryHeap::new(),
            next_seq: 0,
            frame: 0,
        }
    }

    /// Engine time in seconds (frames rendered / sample rate)
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Live nodes, master excluded
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn connection_count(&self) -> usize {
        self.graph.connection_count()
    }

    pub fn is_connected(&self, from: NodeHandle, to: NodeHandle) -> bool {
        self.graph.is_connected(from, to)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn insert(&mut self, node: EngineNode) -> Result<NodeHandle, BackendError> {
        if self.node_count() >= self.max_nodes {
            return Err(BackendError::ResourceExhausted(self.max_nodes));
        }
        let handle = NodeHandle(self.next_id);
        self.next_id += 1;
        self.nodes.insert(handle, node);
        self.graph.add_node(handle);
        Ok(handle)
    }

    fn ensure_exists(&self, node: NodeHandle) -> Result<(), BackendError> {
        if self.nodes.contains_key(&node) {
            Ok(())
        } else {
            Err(BackendError::UnknownNode(node))
        }
    }

    fn schedule(
        &mut self,
        node: NodeHandle,
        action: EventAction,
        at_seconds: f64,
    ) -> Result<(), BackendError> {
        match self.nodes.get(&node) {
            Some(EngineNode::Instrument(_)) => {}
            Some(_) => {
                return Err(BackendError::Unsupported(format!(
                    "node {node} is not an instrument"
                )));
            }
            None => return Err(BackendError::UnknownNode(node)),
        }

        // late events land on the next rendered frame
        let frame = (at_seconds.max(0.0) * self.sample_rate as f64).round() as u64;
        let event = ScheduledEvent {
            frame: frame.max(self.frame),
            seq: self.next_seq,
            node,
            action,
        };
        self.next_seq += 1;
        self.events.push(Reverse(event));
        Ok(())
    }

    /// Render the next `out.len()` frames, overwriting `out`
    pub fn render(&mut self, out: &mut [Frame]) {
        let mut pos = 0;
        while pos < out.len() {
            self.dispatch_due_events();

            let remaining = (out.len() - pos) as u64;
            let until_next = self
                .events
                .peek()
                .map(|Reverse(e)| e.frame - self.frame)
                .unwrap_or(remaining);
            let len = until_next.clamp(1, remaining) as usize;

            self.process_chunk(&mut out[pos..pos + len]);
            pos += len;
            self.frame += len as u64;
        }
    }

    /// Render `frames` frames into a new buffer
    pub fn render_frames(&mut self, frames: usize) -> Vec<Frame> {
        let mut out = vec![SILENCE; frames];
        self.render(&mut out);
        out
    }

    fn dispatch_due_events(&mut self) {
        while self
            .events
            .peek()
            .is_some_and(|Reverse(e)| e.frame <= self.frame)
        {
            let Some(Reverse(event)) = self.events.pop() else {
                break;
            };
            if let Some(EngineNode::Instrument(instrument)) = self.nodes.get_mut(&event.node) {
                match event.action {
                    EventAction::Start(trigger) => instrument.trigger(&trigger),
                    EventAction::Release(frequency) => instrument.release(frequency),
                }
            }
        }
    }

    fn process_chunk(&mut self, out: &mut [Frame]) {
        let len = out.len();
        let Self {
            nodes,
            graph,
            buffers,
            master,
            ..
        } = self;

        graph.refresh_order();
        for &handle in graph.processing_order() {
            let mut buffer = buffers.remove(&handle).unwrap_or_default();
            buffer.clear();
            buffer.resize(len, SILENCE);

            for input in graph.inputs_of(handle) {
                if let Some(source) = buffers.get(&input) {
                    for (acc, frame) in buffer.iter_mut().zip(source) {
                        acc.0 += frame.0;
                        acc.1 += frame.1;
                    }
                }
            }

            if let Some(node) = nodes.get_mut(&handle) {
                node.process(&mut buffer);
            }
            buffers.insert(handle, buffer);
        }

        match buffers.get(master) {
            Some(master_out) => out.copy_from_slice(&master_out[..len]),
            None => out.fill(SILENCE),
        }
    }
}

impl AudioBackend for RenderEngine {
    fn create_instrument(&mut self, spec: &InstrumentSpec) -> Result<NodeHandle, BackendError> {
        let (model, volume_db, polyphony) = spec
            .resolve()
            .ok_or_else(|| BackendError::Unsupported(format!("unknown instrument {spec}")))?;
        let instrument = Instrument::new(model, volume_db, polyphony, self.sample_rate);
        self.insert(EngineNode::Instrument(instrument))
    }

    fn create_effect(
        &mut self,
        kind: EffectKind,
        params: &EffectParams,
    ) -> Result<NodeHandle, BackendError> {
        let effect = build_effect(kind, params, self.sample_rate);
        self.insert(EngineNode::Effect(effect))
    }

    fn create_gain(&mut self, gain_db: f32, muted: bool) -> Result<NodeHandle, BackendError> {
        let target = gain_target(gain_db, muted);
        self.insert(EngineNode::Gain {
            target,
            smoother: OnePoleSmoother::new(target, GAIN_SMOOTHING_MS, self.sample_rate),
        })
    }

    fn master(&self) -> NodeHandle {
        self.master
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn connect(&mut self, from: NodeHandle, to: NodeHandle) -> Result<(), BackendError> {
        self.ensure_exists(from)?;
        self.ensure_exists(to)?;
        if self.graph.connect(from, to) {
            Ok(())
        } else {
            Err(BackendError::Cycle { from, to })
        }
    }

    fn disconnect(&mut self, from: NodeHandle, to: NodeHandle) -> Result<(), BackendError> {
        self.ensure_exists(from)?;
        self.ensure_exists(to)?;
        self.graph.disconnect(from, to);
        Ok(())
    }

    fn dispose(&mut self, node: NodeHandle) -> Result<(), BackendError> {
        if node == self.master {
            return Err(BackendError::Unsupported("the master node cannot be disposed".into()));
        }
        self.ensure_exists(node)?;

        let dangling = self.graph.remove_node(node);
        if !dangling.is_empty() {
            log::warn!(
                "Disposed node {} with {} live connection(s)",
                node,
                dangling.len()
            );
        }
        self.nodes.remove(&node);
        self.buffers.remove(&node);
        self.events.retain(|Reverse(e)| e.node != node);
        Ok(())
    }

    fn set_gain(&mut self, node: NodeHandle, gain_db: f32, muted: bool) -> Result<(), BackendError> {
        match self.nodes.get_mut(&node) {
            Some(EngineNode::Gain { target, .. }) => {
                *target = gain_target(gain_db, muted);
                Ok(())
            }
            Some(_) => Err(BackendError::Unsupported(format!("node {node} is not a gain stage"))),
            None => Err(BackendError::UnknownNode(node)),
        }
    }

    fn trigger(
        &mut self,
        node: NodeHandle,
        trigger: &VoiceTrigger,
        at_seconds: f64,
    ) -> Result<(), BackendError> {
        self.schedule(node, EventAction::Start(*trigger), at_seconds)
    }

    fn release(
        &mut self,
        node: NodeHandle,
        frequency: Option<f32>,
        at_seconds: f64,
    ) -> Result<(), BackendError> {
        self.schedule(node, EventAction::Release(frequency), at_seconds)
    }

    fn render(&mut self, out: &mut [Frame]) {
        RenderEngine::render(self, out);
    }

    fn ramp_in(&mut self, node: NodeHandle) -> Result<(), BackendError> {
        match self.nodes.get_mut(&node) {
            Some(EngineNode::Gain { smoother, .. }) => {
                smoother.reset(0.0);
                Ok(())
            }
            Some(_) => Err(BackendError::Unsupported(format!("node {node} is not a gain stage"))),
            None => Err(BackendError::UnknownNode(node)),
        }
    }
}

fn gain_target(gain_db: f32, muted: bool) -> f32 {
    if muted { 0.0 } else { db_to_gain(gain_db) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{DrumKind, DrumVariant};

    const SR: f32 = 48000.0;

    fn kick_to_master(engine: &mut RenderEngine) -> NodeHandle {
        let kick = engine
            .create_instrument(&InstrumentSpec::drum(DrumKind::Kick, DrumVariant::Modern))
            .unwrap();
        let master = engine.master();
        engine.connect(kick, master).unwrap();
        kick
    }

    fn first_sound(block: &[Frame]) -> Option<usize> {
        block.iter().position(|(l, r)| *l != 0.0 || *r != 0.0)
    }

    #[test]
    fn test_trigger_starts_on_exact_frame() {
        let mut engine = RenderEngine::new(SR);
        let kick = kick_to_master(&mut engine);

        // 0.01 s = frame 480
        engine
            .trigger(kick, &VoiceTrigger::new(Some(32.7), 0.25, 1.0), 0.01)
            .unwrap();
        let block = engine.render_frames(1024);
        let onset = first_sound(&block).unwrap();
        assert!((480..=482).contains(&onset), "onset at {onset}");
        assert!(block[..480].iter().all(|f| *f == SILENCE));
    }

    #[test]
    fn test_late_trigger_plays_now() {
        let mut engine = RenderEngine::new(SR);
        let kick = kick_to_master(&mut engine);
        engine.render_frames(4800);

        engine
            .trigger(kick, &VoiceTrigger::new(Some(32.7), 0.25, 1.0), 0.0)
            .unwrap();
        let block = engine.render_frames(256);
        assert!(first_sound(&block).is_some_and(|i| i < 4));
    }

    #[test]
    fn test_scheduled_release_ends_held_note() {
        let mut engine = RenderEngine::new(SR);
        let synth = engine.create_instrument(&InstrumentSpec::synth("basic")).unwrap();
        let master = engine.master();
        engine.connect(synth, master).unwrap();

        engine.trigger(synth, &VoiceTrigger::held(440.0, 1.0), 0.0).unwrap();
        engine.release(synth, Some(440.0), 0.5).unwrap();
        assert_eq!(engine.pending_events(), 2);

        let held = engine.render_frames((0.5 * SR) as usize);
        assert!(held[(0.4 * SR) as usize..].iter().any(|f| f.0 != 0.0));
        assert_eq!(engine.pending_events(), 1);

        // release tail of the basic preset is well under 3 s
        engine.render_frames((3.0 * SR) as usize);
        assert_eq!(engine.pending_events(), 0);
        let after = engine.render_frames(512);
        assert!(after.iter().all(|f| *f == SILENCE));
    }

    #[test]
    fn test_node_cap() {
        let mut engine = RenderEngine::with_max_nodes(SR, 2);
        engine.create_gain(0.0, false).unwrap();
        engine.create_gain(0.0, false).unwrap();
        assert_eq!(
            engine.create_gain(0.0, false),
            Err(BackendError::ResourceExhausted(2))
        );
        assert_eq!(engine.node_count(), 2);
    }

    #[test]
    fn test_dispose_cleans_up() {
        let mut engine = RenderEngine::new(SR);
        let kick = kick_to_master(&mut engine);
        engine
            .trigger(kick, &VoiceTrigger::new(None, 0.1, 1.0), 1.0)
            .unwrap();
        assert_eq!(engine.pending_events(), 1);

        engine.dispose(kick).unwrap();
        assert_eq!(engine.node_count(), 0);
        assert_eq!(engine.connection_count(), 0);
        assert_eq!(engine.pending_events(), 0);
        assert_eq!(engine.dispose(kick), Err(BackendError::UnknownNode(kick)));

        let master = engine.master();
        assert!(engine.dispose(master).is_err());
    }

    #[test]
    fn test_muted_gain_silences_chain() {
        let mut engine = RenderEngine::new(SR);
        let synth = engine.create_instrument(&InstrumentSpec::synth("basic")).unwrap();
        let gain = engine.create_gain(-10.0, true).unwrap();
        let master = engine.master();
        engine.connect(synth, gain).unwrap();
        engine.connect(gain, master).unwrap();

        engine
            .trigger(synth, &VoiceTrigger::new(Some(440.0), 0.5, 1.0), 0.0)
            .unwrap();
        let block = engine.render_frames(2048);
        assert!(block.iter().all(|f| *f == SILENCE));
    }

    #[test]
    fn test_ramp_in_starts_from_silence() {
        let mut engine = RenderEngine::new(SR);
        let synth = engine.create_instrument(&InstrumentSpec::synth("square-lead")).unwrap();
        let gain = engine.create_gain(0.0, false).unwrap();
        let master = engine.master();
        engine.connect(synth, gain).unwrap();
        engine.connect(gain, master).unwrap();
        engine
            .trigger(synth, &VoiceTrigger::new(Some(220.0), 1.0, 1.0), 0.0)
            .unwrap();
        engine.render_frames(4800);

        engine.ramp_in(gain).unwrap();
        let block = engine.render_frames(4);
        let steady = engine.render_frames(4800);
        let peak_start = block.iter().map(|f| f.0.abs()).fold(0.0, f32::max);
        let peak_later = steady.iter().map(|f| f.0.abs()).fold(0.0, f32::max);
        assert!(peak_start < peak_later * 0.1);
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let mut engine = RenderEngine::new(SR);
        assert!(matches!(
            engine.create_instrument(&InstrumentSpec::synth("missing")),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn test_trigger_on_non_instrument_fails() {
        let mut engine = RenderEngine::new(SR);
        let gain = engine.create_gain(0.0, false).unwrap();
        assert!(engine
            .trigger(gain, &VoiceTrigger::new(None, 0.1, 1.0), 0.0)
            .is_err());
    }
}
