// Loopstation - Interactive loop-sequencer core

pub mod audio;
pub mod command;
pub mod editor;
pub mod messaging;
pub mod pattern;
pub mod project;
pub mod sequencer;
pub mod session;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::{AudioBackend, AudioGraphManager, EngineRenderer, RenderEngine, WavEncoder};
pub use command::{Edit, PatternStore, ValidationError};
pub use editor::{PointerEvent, PointerTarget, TimelineEditor};
pub use messaging::{Notification, NotificationCategory, NotificationLevel};
pub use pattern::{AppState, DrumKind, DrumVariant, EffectKind, Pitch, SynthNote, TrackId};
pub use project::{FilePersistence, MemoryPersistence, Persistence, PresetLibrary};
pub use sequencer::{Clock, StepScheduler, Transport, TransportState};
pub use session::{Session, SessionConfig, SessionError};
