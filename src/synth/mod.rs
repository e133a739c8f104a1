// Synthesis - Voices, instruments and effect processors

pub mod delay;
pub mod dynamics;
pub mod effect;
pub mod envelope;
pub mod filter;
pub mod instrument;
pub mod modulation;
pub mod oscillator;
pub mod reverb;
pub mod shaping;
pub mod tone;
pub mod voice;

pub use effect::{Effect, build_effect};
pub use instrument::Instrument;
pub use voice::{VoiceModel, VoiceTrigger};
