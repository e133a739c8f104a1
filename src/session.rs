// Session - Wires store, audio graph, scheduler, editor, clock and storage
//
// The session is the single owner of the pattern store. Every change goes
// through `commit`/`undo`/`redo`, after which the audio graph is brought in
// line with the new state (only the tracks that changed are rebuilt) and the
// state is saved. Failures never abort the session: they are logged and
// posted as notices for the host to display.

use crate::audio::{
    AudioBackend, AudioGraphError, AudioGraphManager, Encoder, ExportError, ExportFormat,
    InstrumentSpec, OfflineRenderer, RenderEngine,
};
use crate::audio::backend::VoiceTrigger;
use crate::audio::dsp_utils::Frame;
use crate::audio::export::export_to_file;
use crate::command::{DEFAULT_MAX_HISTORY, Edit, PatternStore, ValidationError};
use crate::editor::{EditorAction, PointerEvent, TimelineEditor};
use crate::messaging::channels::post;
use crate::messaging::{
    Notification, NotificationCategory, NotificationConsumer, NotificationProducer,
    create_notification_channel,
};
use crate::pattern::{AppState, EffectKind, Pitch, TrackId};
use crate::project::{
    FileFormat, FilePersistence, Persistence, PersistenceError, PresetLibrary,
    default_session_path,
};
use crate::sequencer::{
    Clock, SchedulerStats, StepScheduler, Transport, TransportState, Trigger, TriggerSink,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the user preset library, next to the session file
pub const PRESET_LIBRARY_FILE: &str = "presets.json";

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Session configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Sample rate of the built-in render engine
    pub sample_rate: u32,
    /// Undo history entries kept
    pub history_limit: usize,
    /// Session file; `None` uses the platform data directory
    pub session_path: Option<PathBuf>,
    pub format: FileFormat,
    /// Pending notices kept before new ones are dropped
    pub notification_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            history_limit: DEFAULT_MAX_HISTORY,
            session_path: None,
            format: FileFormat::Json,
            notification_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Configured session file, falling back to the data directory
    pub fn resolved_session_path(&self) -> Option<PathBuf> {
        self.session_path.clone().or_else(default_session_path)
    }
}

/// One running loop-sequencer session
pub struct Session<C: Clock, B: AudioBackend, P: Persistence> {
    store: PatternStore,
    graph: AudioGraphManager<B>,
    scheduler: StepScheduler,
    editor: TimelineEditor,
    clock: C,
    persistence: P,
    presets: PresetLibrary,
    notices: NotificationProducer,
}

impl Session<Transport, RenderEngine, FilePersistence> {
    /// Session on the built-in transport, render engine and file storage
    ///
    /// The preset library lives next to the session file. A library that
    /// cannot be read is replaced by an empty in-memory one, with a notice.
    pub fn open_default(
        config: &SessionConfig,
    ) -> Result<(Self, NotificationConsumer), SessionError> {
        let path = config
            .resolved_session_path()
            .ok_or(PersistenceError::NoDataDir)?;
        let persistence = FilePersistence::with_format(&path, config.format);
        let library_path = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(PRESET_LIBRARY_FILE);

        let (library, library_error) = match PresetLibrary::open(library_path) {
            Ok(library) => (library, None),
            Err(e) => (PresetLibrary::in_memory(), Some(e)),
        };

        let (mut session, rx) = Session::open(
            config,
            Transport::default(),
            RenderEngine::new(config.sample_rate as f32),
            persistence,
        );
        session.presets = library;
        if let Some(e) = library_error {
            session.report_persistence("Could not read user presets", &e);
        }
        Ok((session, rx))
    }
}

impl<C: Clock, B: AudioBackend, P: Persistence> Session<C, B, P> {
    /// Start a session from the stored state (or defaults) and build its audio
    ///
    /// # Returns
    /// The session and the receiving end of its notice queue
    pub fn open(
        config: &SessionConfig,
        mut clock: C,
        backend: B,
        mut persistence: P,
    ) -> (Self, NotificationConsumer) {
        let (tx, rx) = create_notification_channel(config.notification_capacity.max(1));

        let (initial, load_error) = match persistence.load() {
            Ok(Some(state)) => (state, None),
            Ok(None) => (AppState::new(), None),
            Err(e) => (AppState::new(), Some(e)),
        };
        clock.set_tempo(initial.bpm);

        let mut session = Self {
            store: PatternStore::with_capacity(initial, config.history_limit),
            graph: AudioGraphManager::new(backend),
            scheduler: StepScheduler::new(),
            editor: TimelineEditor::new(),
            clock,
            persistence,
            presets: PresetLibrary::in_memory(),
            notices: tx,
        };

        if let Some(e) = load_error {
            session.report_persistence("Could not load the saved session, starting empty", &e);
        }
        let errors = session.graph.sync_all(session.store.current());
        session.report_audio(errors);

        log::info!("Session opened at {:.0} BPM", session.clock.tempo());
        (session, rx)
    }

    /// Replace the preset library
    pub fn with_presets(mut self, presets: PresetLibrary) -> Self {
        self.presets = presets;
        self
    }

    pub fn state(&self) -> &AppState {
        self.store.current()
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn graph(&self) -> &AudioGraphManager<B> {
        &self.graph
    }

    pub fn editor(&self) -> &TimelineEditor {
        &self.editor
    }

    /// Editor view settings (zoom, scroll, selection)
    pub fn editor_mut(&mut self) -> &mut TimelineEditor {
        &mut self.editor
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Step shown by the playhead, `None` before the first tick
    pub fn current_step(&self) -> Option<usize> {
        self.scheduler.current_step()
    }

    pub fn transport_state(&self) -> TransportState {
        self.clock.state()
    }

    /// Validate and apply an edit
    ///
    /// A rejected edit leaves everything unchanged and posts a notice.
    pub fn commit(&mut self, edit: Edit) -> Result<(), ValidationError> {
        let previous = self.store.snapshot();
        if let Err(e) = self.store.commit(&edit) {
            log::debug!("Rejected '{}': {}", edit.description(), e);
            self.notify(Notification::warning(NotificationCategory::Pattern, e.to_string()));
            return Err(e);
        }
        log::debug!("Committed '{}'", edit.description());
        self.after_transition(&previous);
        Ok(())
    }

    /// Undo the last change; returns its label
    pub fn undo(&mut self) -> Option<String> {
        let previous = self.store.snapshot();
        let label = self.store.undo()?;
        self.after_transition(&previous);
        Some(label)
    }

    /// Redo the last undone change; returns its label
    pub fn redo(&mut self) -> Option<String> {
        let previous = self.store.snapshot();
        let label = self.store.redo()?;
        self.after_transition(&previous);
        Some(label)
    }

    pub fn play(&mut self) {
        self.clock.start();
        self.scheduler.start();
    }

    /// Halt playback and keep the position
    pub fn pause(&mut self) {
        self.clock.pause();
        self.scheduler.stop();
    }

    /// Halt playback and rewind to the loop start
    pub fn stop(&mut self) {
        self.clock.stop();
        self.scheduler.stop();
    }

    /// Pull the next block of audio
    ///
    /// Moves the clock by the block's length, schedules every step it crosses
    /// and renders the backend over that same interval, so tick times and
    /// rendered frames share one time base. A host pulling audio this way
    /// does not call `advance` as well.
    ///
    /// # Returns
    /// The number of triggers scheduled inside the block
    pub fn render(&mut self, out: &mut [Frame]) -> usize {
        let sample_rate = self.graph.backend().sample_rate().max(1.0) as f64;
        let fired = self.advance(out.len() as f64 / sample_rate);
        self.graph.backend_mut().render(out);
        fired
    }

    /// Move host time forward and schedule every step boundary crossed
    ///
    /// For backends that keep their own output running; see `render`.
    ///
    /// # Returns
    /// The number of triggers delivered to the audio graph
    pub fn advance(&mut self, seconds: f64) -> usize {
        let ticks = self.clock.advance(seconds);
        if ticks.is_empty() {
            return 0;
        }
        let state = self.store.snapshot();
        ticks
            .into_iter()
            .map(|tick| self.scheduler.on_tick(tick, &state, &mut self.graph))
            .sum()
    }

    /// Sound `pitch` on a synth preset now, held until `note_off`
    ///
    /// Plays on the synth lane's instrument for `instrument`, which exists for
    /// the selected preset and every preset the pattern uses. Anything else is
    /// dropped like a missed trigger.
    ///
    /// # Returns
    /// Whether an instrument took the note
    pub fn note_on(&mut self, pitch: Pitch, instrument: &str) -> bool {
        let trigger = Trigger {
            track: TrackId::Synth,
            instrument: InstrumentSpec::synth(instrument),
            voice: VoiceTrigger::held(pitch.frequency(), 1.0),
            time: self.clock.now(),
        };
        match self.graph.fire(&trigger) {
            Ok(()) => true,
            Err(miss) => {
                log::trace!("{}", miss);
                false
            }
        }
    }

    /// Release `pitch` on every synth-lane instrument holding it
    pub fn note_off(&mut self, pitch: Pitch) -> bool {
        self.graph.release_note(pitch.frequency(), self.clock.now()) > 0
    }

    /// Feed a pointer event to the timeline editor
    ///
    /// Seeks go straight to the clock, edits through `commit`.
    pub fn pointer(&mut self, event: PointerEvent) -> Result<(), ValidationError> {
        let state = self.store.snapshot();
        match self.editor.handle(event, &state) {
            Some(EditorAction::Seek(position)) => {
                self.clock.set_position_in_steps(position);
                Ok(())
            }
            Some(EditorAction::Commit(edit)) => self.commit(edit),
            None => Ok(()),
        }
    }

    /// Drop an effect onto a track header
    pub fn drop_effect(&mut self, track: TrackId, kind: EffectKind) -> Result<(), ValidationError> {
        match self.editor.drop_effect(track, kind, self.store.current()) {
            Ok(edit) => self.commit(edit),
            Err(e) => {
                self.notify(Notification::warning(NotificationCategory::Pattern, e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete the selected note; returns whether a note was removed
    pub fn delete_selected(&mut self) -> bool {
        let state = self.store.snapshot();
        match self.editor.delete_selected(&state) {
            Some(edit) => self.commit(edit).is_ok(),
            None => false,
        }
    }

    /// Replace the pattern with a built-in or user preset (undoable)
    pub fn load_preset(&mut self, name: &str) -> Result<(), SessionError> {
        let preset = self
            .presets
            .find(name)
            .ok_or_else(|| SessionError::UnknownPreset(name.to_string()))?;
        self.editor.select(None);
        self.commit(Edit::LoadPreset {
            name: preset.name,
            state: Box::new(preset.state),
        })?;
        self.notify(Notification::info(
            NotificationCategory::Pattern,
            format!("Loaded preset {}", name),
        ));
        Ok(())
    }

    /// Store the current pattern as a user preset
    pub fn save_preset(&mut self, name: &str) -> Result<(), SessionError> {
        let state = self.store.snapshot();
        if let Err(e) = self.presets.save_preset(name, &state) {
            self.report_persistence("Could not save preset", &e);
            return Err(e.into());
        }
        self.notify(Notification::info(
            NotificationCategory::Persistence,
            format!("Saved preset {}", name.trim()),
        ));
        Ok(())
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<bool, SessionError> {
        self.presets.delete_preset(name).map_err(|e| {
            self.report_persistence("Could not delete preset", &e);
            SessionError::from(e)
        })
    }

    /// Render the current pattern offline and write it to `path`
    ///
    /// # Returns
    /// The number of bytes written
    pub fn export(
        &mut self,
        renderer: &mut dyn OfflineRenderer,
        encoder: &dyn Encoder,
        format: ExportFormat,
        path: &Path,
    ) -> Result<usize, SessionError> {
        let state = self.store.snapshot();
        match export_to_file(renderer, encoder, &state, format, path) {
            Ok(bytes) => {
                self.notify(Notification::info(
                    NotificationCategory::Export,
                    format!("Exported {}", path.display()),
                ));
                Ok(bytes)
            }
            Err(e) => {
                log::warn!("Export to {} failed: {}", path.display(), e);
                self.notify(Notification::error(
                    NotificationCategory::Export,
                    format!("Export failed: {}", e),
                ));
                Err(e.into())
            }
        }
    }

    /// Save now
    pub fn save(&mut self) -> Result<(), SessionError> {
        self.persistence
            .save(self.store.current())
            .map_err(SessionError::from)
    }

    /// Stop playback, save and release every audio node
    pub fn close(mut self) -> Result<P, SessionError> {
        self.stop();
        self.editor.cancel();
        let saved = self.save();
        self.graph.teardown();
        log::info!("Session closed");
        saved.map(|()| self.persistence)
    }

    fn after_transition(&mut self, previous: &AppState) {
        let current = self.store.snapshot();
        if current.bpm != previous.bpm {
            self.clock.set_tempo(current.bpm);
        }
        if let Some(id) = self.editor.selected() {
            if !current.synth.contains(id) {
                self.editor.select(None);
            }
        }

        let errors = self.sync_audio(previous, &current);
        self.report_audio(errors);

        if let Err(e) = self.persistence.save(&current) {
            self.report_persistence("Could not save the session", &e);
        }
    }

    /// Rebuild only what differs between two states
    fn sync_audio(&mut self, previous: &AppState, current: &AppState) -> Vec<AudioGraphError> {
        let mut errors = Vec::new();

        for (index, track) in current.drums.tracks().enumerate() {
            let id = TrackId::Drum(index);
            let (Some(old), Some(new)) = (
                previous.drums.track_handle(index),
                current.drums.track_handle(index),
            ) else {
                continue;
            };
            if Arc::ptr_eq(old, new) {
                continue;
            }
            if old.variant != track.variant || old.kind != track.kind {
                let spec = InstrumentSpec::drum(track.kind, track.variant);
                errors.extend(self.graph.set_instrument(id, spec).err());
            }
            if old.gain_db != track.gain_db || old.muted != track.muted {
                errors.extend(self.graph.set_volume(id, track.gain_db, track.muted).err());
            }
        }

        let instruments = current.synth_lane_instruments();
        if instruments != previous.synth_lane_instruments() {
            errors.extend(self.graph.sync_synth_instruments(&instruments).err());
        }

        for track in TrackId::all() {
            let chain = current.effects.chain(track);
            if chain != previous.effects.chain(track) {
                errors.extend(self.graph.set_effects(track, chain).err());
            }
        }
        errors
    }

    fn report_audio(&mut self, errors: Vec<AudioGraphError>) {
        for error in errors {
            log::warn!("Audio graph: {}", error);
            self.notify(Notification::warning(NotificationCategory::Audio, error.to_string()));
        }
    }

    fn report_persistence(&mut self, context: &str, error: &PersistenceError) {
        log::warn!("{}: {}", context, error);
        self.notify(Notification::warning(
            NotificationCategory::Persistence,
            format!("{}: {}", context, error),
        ));
    }

    fn notify(&mut self, notification: Notification) {
        post(&mut self.notices, notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::drain;
    use crate::pattern::DrumVariant;
    use crate::project::MemoryPersistence;

    type TestSession = Session<Transport, RenderEngine, MemoryPersistence>;

    fn open(persistence: MemoryPersistence) -> (TestSession, NotificationConsumer) {
        Session::open(
            &SessionConfig::default(),
            Transport::default(),
            RenderEngine::new(8000.0),
            persistence,
        )
    }

    #[test]
    fn test_open_builds_every_track() {
        let (session, mut rx) = open(MemoryPersistence::new());
        for index in 0..10 {
            assert!(session.graph().has_track(TrackId::Drum(index)));
        }
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_failed_load_starts_empty_with_notice() {
        let (session, mut rx) = open(MemoryPersistence::failing());
        assert_eq!(session.state(), &AppState::new());

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].category, NotificationCategory::Persistence);
    }

    #[test]
    fn test_commit_saves_and_rejection_notifies() {
        let (mut session, mut rx) = open(MemoryPersistence::new());
        session.commit(Edit::ToggleStep { track: 0, step: 4 }).unwrap();
        assert_eq!(session.persistence().save_count(), 1);

        assert!(session.commit(Edit::ToggleStep { track: 0, step: 16 }).is_err());
        assert_eq!(session.persistence().save_count(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_tempo_edit_and_undo_follow_the_clock() {
        let (mut session, _rx) = open(MemoryPersistence::new());
        session.commit(Edit::SetTempo { bpm: 90.0 }).unwrap();
        assert_eq!(session.clock().tempo(), 90.0);

        assert_eq!(session.undo().as_deref(), Some("Set tempo to 90 BPM"));
        assert_eq!(session.clock().tempo(), 120.0);

        session.redo();
        assert_eq!(session.clock().tempo(), 90.0);
    }

    #[test]
    fn test_variant_change_rebuilds_one_instrument() {
        let (mut session, _rx) = open(MemoryPersistence::new());
        let before = session.graph().instruments(TrackId::Drum(1));
        session
            .commit(Edit::SetDrumVariant { track: 0, variant: DrumVariant::Eight08 })
            .unwrap();
        assert_eq!(
            session.graph().instruments(TrackId::Drum(0)),
            vec![InstrumentSpec::drum(crate::pattern::DrumKind::Kick, DrumVariant::Eight08)]
        );
        assert_eq!(session.graph().instruments(TrackId::Drum(1)), before);
    }

    #[test]
    fn test_duplicate_effect_drop_is_rejected_with_notice() {
        let (mut session, mut rx) = open(MemoryPersistence::new());
        session.drop_effect(TrackId::Synth, EffectKind::Reverb).unwrap();
        assert!(session.drop_effect(TrackId::Synth, EffectKind::Reverb).is_err());

        assert_eq!(session.state().effects.chain(TrackId::Synth).len(), 1);
        assert_eq!(session.graph().effect_kinds(TrackId::Synth), vec![EffectKind::Reverb]);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_playback_fires_kick_triggers() {
        let (mut session, _rx) = open(MemoryPersistence::new());
        for step in [0, 4, 8, 12] {
            session.commit(Edit::ToggleStep { track: 0, step }).unwrap();
        }
        session.play();
        assert_eq!(session.advance(2.0), 4);
        assert_eq!(session.current_step(), Some(15));

        session.stop();
        assert_eq!(session.advance(1.0), 0);
        assert_eq!(session.current_step(), None);
    }

    #[test]
    fn test_unknown_preset() {
        let (mut session, _rx) = open(MemoryPersistence::new());
        assert!(matches!(
            session.load_preset("Polka"),
            Err(SessionError::UnknownPreset(_))
        ));
        session.load_preset("Techno").unwrap();
        assert_eq!(session.state().bpm, 130.0);
        assert_eq!(session.clock().tempo(), 130.0);
    }

    #[test]
    fn test_close_saves_and_releases_nodes() {
        let (mut session, _rx) = open(MemoryPersistence::new());
        session.commit(Edit::ToggleStep { track: 2, step: 1 }).unwrap();
        let persistence = session.close().unwrap();
        assert_eq!(persistence.save_count(), 2);
        assert!(persistence.stored().unwrap().drums.track(2).unwrap().is_active(1));
    }
}
