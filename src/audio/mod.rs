// Module audio - Node graph, render engine and per-track chain management

pub mod backend;
pub mod dsp_utils;
pub mod engine;
pub mod export;
pub mod instrument;
pub mod manager;
pub mod routing;

pub use backend::{AudioBackend, BackendError, NodeHandle};
pub use engine::RenderEngine;
pub use export::{
    Encoder, EngineRenderer, ExportError, ExportFormat, OfflineRenderer, RawAudioBuffer, WavEncoder,
};
pub use instrument::{InstrumentSpec, SynthPreset, synth_preset, synth_presets};
pub use manager::{AudioGraphError, AudioGraphManager};
