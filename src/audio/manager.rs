// Audio graph manager - Per-track signal chains over an AudioBackend
//
// Each track owns `instrument(s) -> output gain -> effects... -> master`.
// Rebuilds are transactional: new nodes are built first, and only when every
// one of them exists is the old part of the chain disconnected, disposed and
// replaced. A failed build disposes what it created and leaves the previous
// chain playing.

use super::backend::{AudioBackend, BackendError, NodeHandle};
use super::instrument::InstrumentSpec;
use crate::pattern::drum::DEFAULT_TRACK_GAIN_DB;
use crate::pattern::{AppState, EffectConfig, EffectKind, TrackId};
use crate::sequencer::scheduler::{SchedulingMiss, Trigger, TriggerSink};
use std::collections::{BTreeMap, BTreeSet};

/// Instrument key of a drum lane's single instrument
const DRUM_INSTRUMENT_KEY: &str = "drum";

/// Audio graph errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioGraphError {
    #[error("failed to build {what} on {track}: {source}")]
    Instantiation {
        track: TrackId,
        what: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to rewire {track}: {source}")]
    Routing {
        track: TrackId,
        #[source]
        source: BackendError,
    },
}

impl AudioGraphError {
    pub fn track(&self) -> TrackId {
        match self {
            AudioGraphError::Instantiation { track, .. } | AudioGraphError::Routing { track, .. } => {
                *track
            }
        }
    }
}

/// Nodes owned by one track
#[derive(Debug)]
struct TrackChain {
    output: NodeHandle,
    instruments: BTreeMap<String, (InstrumentSpec, NodeHandle)>,
    effects: Vec<(EffectKind, NodeHandle)>,
    /// Effect configs the current chain was built from
    applied: Vec<EffectConfig>,
    gain_db: f32,
    muted: bool,
}

impl TrackChain {
    fn node_count(&self) -> usize {
        1 + self.instruments.len() + self.effects.len()
    }
}

/// Builds, rewires and tears down the per-track chains
pub struct AudioGraphManager<B: AudioBackend> {
    backend: B,
    tracks: BTreeMap<TrackId, TrackChain>,
}

impl<B: AudioBackend> AudioGraphManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tracks: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Build every track from `state`, best-effort per track
    pub fn sync_all(&mut self, state: &AppState) -> Vec<AudioGraphError> {
        let mut errors = Vec::new();

        for (index, track) in state.drums.tracks().enumerate() {
            let id = TrackId::Drum(index);
            let spec = InstrumentSpec::drum(track.kind, track.variant);
            errors.extend(self.set_instrument(id, spec).err());
            errors.extend(self.set_volume(id, track.gain_db, track.muted).err());
            errors.extend(self.set_effects(id, state.effects.chain(id)).err());
        }

        errors.extend(
            self.sync_synth_instruments(&state.synth_lane_instruments())
                .err(),
        );
        errors.extend(
            self.set_effects(TrackId::Synth, state.effects.chain(TrackId::Synth))
                .err(),
        );

        for error in &errors {
            log::warn!("Audio graph sync: {}", error);
        }
        errors
    }

    /// Create the chain skeleton (gain stage into master) on first use
    fn ensure_track(&mut self, track: TrackId) -> Result<(), AudioGraphError> {
        if self.tracks.contains_key(&track) {
            return Ok(());
        }

        let gain_db = match track {
            TrackId::Drum(_) => DEFAULT_TRACK_GAIN_DB,
            TrackId::Synth => 0.0,
        };
        let output = self
            .backend
            .create_gain(gain_db, false)
            .map_err(|source| AudioGraphError::Instantiation {
                track,
                what: "output stage".into(),
                source,
            })?;
        let master = self.backend.master();
        if let Err(source) = self.backend.connect(output, master) {
            let _ = self.backend.dispose(output);
            return Err(AudioGraphError::Routing { track, source });
        }

        self.tracks.insert(
            track,
            TrackChain {
                output,
                instruments: BTreeMap::new(),
                effects: Vec::new(),
                applied: Vec::new(),
                gain_db,
                muted: false,
            },
        );
        Ok(())
    }

    /// Replace the instrument of a drum lane, or (re)build one synth preset.
    ///
    /// The output stage, and with it volume and mute, is kept.
    pub fn set_instrument(
        &mut self,
        track: TrackId,
        spec: InstrumentSpec,
    ) -> Result<(), AudioGraphError> {
        self.ensure_track(track)?;
        let key = match &spec {
            InstrumentSpec::Drum { .. } => DRUM_INSTRUMENT_KEY.to_string(),
            InstrumentSpec::Synth { preset } => preset.clone(),
        };

        let Self { backend, tracks } = self;
        let Some(chain) = tracks.get_mut(&track) else {
            return Ok(());
        };
        if chain.instruments.get(&key).is_some_and(|(s, _)| *s == spec) {
            return Ok(());
        }

        let new = backend
            .create_instrument(&spec)
            .map_err(|source| AudioGraphError::Instantiation {
                track,
                what: spec.to_string(),
                source,
            })?;

        let routing = |source| AudioGraphError::Routing { track, source };
        if let Some((old_spec, old)) = chain.instruments.remove(&key) {
            log::debug!("{}: replacing {} with {}", track, old_spec, spec);
            backend.disconnect(old, chain.output).map_err(routing)?;
            backend.dispose(old).map_err(routing)?;
        }
        backend.connect(new, chain.output).map_err(routing)?;
        chain.instruments.insert(key, (spec, new));
        backend.ramp_in(chain.output).map_err(routing)
    }

    /// Keep exactly one synth-lane instrument per preset in `presets`
    pub fn sync_synth_instruments(
        &mut self,
        presets: &BTreeSet<String>,
    ) -> Result<(), AudioGraphError> {
        let track = TrackId::Synth;
        self.ensure_track(track)?;
        let Self { backend, tracks } = self;
        let Some(chain) = tracks.get_mut(&track) else {
            return Ok(());
        };
        let routing = |source| AudioGraphError::Routing { track, source };

        let stale: Vec<String> = chain
            .instruments
            .keys()
            .filter(|k| !presets.contains(*k))
            .cloned()
            .collect();
        for key in stale {
            if let Some((_, node)) = chain.instruments.remove(&key) {
                backend.disconnect(node, chain.output).map_err(routing)?;
                backend.dispose(node).map_err(routing)?;
            }
        }

        let mut first_error = None;
        for preset in presets {
            if chain.instruments.contains_key(preset) {
                continue;
            }
            let spec = InstrumentSpec::synth(preset.clone());
            match backend.create_instrument(&spec) {
                Ok(node) => {
                    backend.connect(node, chain.output).map_err(routing)?;
                    chain.instruments.insert(preset.clone(), (spec, node));
                }
                Err(source) => {
                    let error = AudioGraphError::Instantiation {
                        track,
                        what: spec.to_string(),
                        source,
                    };
                    log::warn!("{}", error);
                    first_error.get_or_insert(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Rebuild the effect chain of `track` from an ordered config list.
    ///
    /// Disabled configs are skipped, as are repeated kinds (with a warning).
    pub fn set_effects(
        &mut self,
        track: TrackId,
        configs: &[EffectConfig],
    ) -> Result<(), AudioGraphError> {
        self.ensure_track(track)?;
        let Self { backend, tracks } = self;
        let Some(chain) = tracks.get_mut(&track) else {
            return Ok(());
        };

        let mut seen = BTreeSet::new();
        let mut wanted = Vec::new();
        for config in configs.iter().filter(|c| c.enabled) {
            if seen.insert(config.kind) {
                wanted.push(config.clone());
            } else {
                log::warn!("{}: skipping repeated {} effect", track, config.kind);
            }
        }
        if wanted == chain.applied {
            return Ok(());
        }

        let mut built = Vec::with_capacity(wanted.len());
        for config in &wanted {
            match backend.create_effect(config.kind, &config.params) {
                Ok(node) => built.push((config.kind, node)),
                Err(source) => {
                    for (_, node) in built {
                        let _ = backend.dispose(node);
                    }
                    return Err(AudioGraphError::Instantiation {
                        track,
                        what: format!("{} effect", config.kind),
                        source,
                    });
                }
            }
        }

        let master = backend.master();
        let old_nodes: Vec<NodeHandle> = chain.effects.iter().map(|(_, n)| *n).collect();
        let new_nodes: Vec<NodeHandle> = built.iter().map(|(_, n)| *n).collect();

        // detach the old chain; on failure it is put back as it was
        if let Err(source) = unlink(backend, &serial_path(chain.output, &old_nodes, master)) {
            if let Err(e) = link(backend, &serial_path(chain.output, &old_nodes, master)) {
                log::warn!("{}: could not restore the previous effect chain: {}", track, e);
            }
            release(backend, track, &new_nodes);
            return Err(AudioGraphError::Routing { track, source });
        }
        release(backend, track, &old_nodes);
        chain.effects.clear();
        chain.applied.clear();

        // attach the new one; on failure the track plays dry
        if let Err(source) = link(backend, &serial_path(chain.output, &new_nodes, master)) {
            let _ = unlink(backend, &serial_path(chain.output, &new_nodes, master));
            release(backend, track, &new_nodes);
            if let Err(e) = backend.connect(chain.output, master) {
                log::warn!("{}: could not reconnect the dry signal: {}", track, e);
            }
            return Err(AudioGraphError::Routing { track, source });
        }

        log::debug!(
            "{}: effect chain rebuilt with {} node(s)",
            track,
            built.len()
        );
        chain.effects = built;
        chain.applied = wanted;
        backend
            .ramp_in(chain.output)
            .map_err(|source| AudioGraphError::Routing { track, source })
    }

    pub fn set_volume(
        &mut self,
        track: TrackId,
        gain_db: f32,
        muted: bool,
    ) -> Result<(), AudioGraphError> {
        self.ensure_track(track)?;
        let Self { backend, tracks } = self;
        let Some(chain) = tracks.get_mut(&track) else {
            return Ok(());
        };
        if chain.gain_db == gain_db && chain.muted == muted {
            return Ok(());
        }
        backend
            .set_gain(chain.output, gain_db, muted)
            .map_err(|source| AudioGraphError::Routing { track, source })?;
        chain.gain_db = gain_db;
        chain.muted = muted;
        Ok(())
    }

    /// Disconnect and dispose every node of every track
    pub fn teardown(&mut self) {
        let master = self.backend.master();
        for (track, chain) in std::mem::take(&mut self.tracks) {
            let mut report = |result: Result<(), BackendError>| {
                if let Err(e) = result {
                    log::warn!("Teardown of {}: {}", track, e);
                }
            };

            for (_, node) in chain.instruments.values() {
                report(self.backend.disconnect(*node, chain.output));
                report(self.backend.dispose(*node));
            }
            let mut previous = chain.output;
            for (_, node) in &chain.effects {
                report(self.backend.disconnect(previous, *node));
                previous = *node;
            }
            report(self.backend.disconnect(previous, master));
            for (_, node) in &chain.effects {
                report(self.backend.dispose(*node));
            }
            report(self.backend.dispose(chain.output));
        }
    }

    pub fn has_track(&self, track: TrackId) -> bool {
        self.tracks.contains_key(&track)
    }

    /// Nodes owned by `track` (output stage, instruments, effects)
    pub fn track_node_count(&self, track: TrackId) -> usize {
        self.tracks.get(&track).map_or(0, TrackChain::node_count)
    }

    /// Nodes owned by all tracks
    pub fn node_count(&self) -> usize {
        self.tracks.values().map(TrackChain::node_count).sum()
    }

    /// Effect kinds of the built chain, in signal order
    pub fn effect_kinds(&self, track: TrackId) -> Vec<EffectKind> {
        self.tracks
            .get(&track)
            .map(|c| c.effects.iter().map(|(k, _)| *k).collect())
            .unwrap_or_default()
    }

    /// Instruments currently built on `track`
    pub fn instruments(&self, track: TrackId) -> Vec<InstrumentSpec> {
        self.tracks
            .get(&track)
            .map(|c| c.instruments.values().map(|(s, _)| s.clone()).collect())
            .unwrap_or_default()
    }
}

/// `output -> nodes... -> master`
fn serial_path(output: NodeHandle, nodes: &[NodeHandle], master: NodeHandle) -> Vec<NodeHandle> {
    let mut path = Vec::with_capacity(nodes.len() + 2);
    path.push(output);
    path.extend_from_slice(nodes);
    path.push(master);
    path
}

fn link<B: AudioBackend>(backend: &mut B, path: &[NodeHandle]) -> Result<(), BackendError> {
    path.windows(2)
        .try_for_each(|pair| backend.connect(pair[0], pair[1]))
}

/// Dispose detached nodes; failures are logged
fn release<B: AudioBackend>(backend: &mut B, track: TrackId, nodes: &[NodeHandle]) {
    for node in nodes {
        if let Err(e) = backend.dispose(*node) {
            log::warn!("{}: releasing effect {}: {}", track, node, e);
        }
    }
}

/// Removes every edge of `path`, reporting the first failure
fn unlink<B: AudioBackend>(backend: &mut B, path: &[NodeHandle]) -> Result<(), BackendError> {
    let mut first_error = None;
    for pair in path.windows(2) {
        if let Err(e) = backend.disconnect(pair[0], pair[1]) {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

impl<B: AudioBackend> AudioGraphManager<B> {
    /// Instrument node a trigger for `spec` on `track` lands on
    fn instrument_node(&self, track: TrackId, spec: &InstrumentSpec) -> Result<NodeHandle, String> {
        let chain = self
            .tracks
            .get(&track)
            .ok_or_else(|| "track has no audio chain".to_string())?;
        match spec {
            InstrumentSpec::Drum { .. } => chain.instruments.get(DRUM_INSTRUMENT_KEY),
            InstrumentSpec::Synth { preset } => chain.instruments.get(preset),
        }
        .map(|(_, node)| *node)
        .ok_or_else(|| "instrument not built".to_string())
    }

    /// Release held notes at `frequency` on every synth-lane instrument
    ///
    /// # Returns
    /// How many instruments accepted the release
    pub fn release_note(&mut self, frequency: f32, at_seconds: f64) -> usize {
        let Self { backend, tracks } = self;
        let Some(chain) = tracks.get(&TrackId::Synth) else {
            return 0;
        };
        chain
            .instruments
            .values()
            .filter(|(_, node)| match backend.release(*node, Some(frequency), at_seconds) {
                Ok(()) => true,
                Err(e) => {
                    log::trace!("Release on {}: {}", node, e);
                    false
                }
            })
            .count()
    }
}

impl<B: AudioBackend> TriggerSink for AudioGraphManager<B> {
    fn fire(&mut self, trigger: &Trigger) -> Result<(), SchedulingMiss> {
        let miss = |reason: String| SchedulingMiss {
            track: trigger.track,
            instrument: trigger.instrument.to_string(),
            reason,
        };

        let node = self
            .instrument_node(trigger.track, &trigger.instrument)
            .map_err(miss)?;
        self.backend
            .trigger(node, &trigger.voice, trigger.time)
            .map_err(|e| miss(e.to_string()))
    }
}
