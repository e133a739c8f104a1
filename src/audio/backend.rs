// Audio backend - Node factory and connection interface
//
// The graph manager only talks to audio through this trait. `RenderEngine`
// is the in-process implementation; hosts can plug in their own.

use super::dsp_utils::{Frame, SILENCE};
use super::instrument::InstrumentSpec;
use crate::pattern::{EffectKind, EffectParams};
use std::fmt;

pub use crate::synth::voice::VoiceTrigger;

/// Opaque handle to a node owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backend failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("unknown node {0}")]
    UnknownNode(NodeHandle),

    #[error("node limit of {0} reached")]
    ResourceExhausted(usize),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("connecting {from} to {to} would create a cycle")]
    Cycle { from: NodeHandle, to: NodeHandle },
}

/// Node factory plus routing and scheduling primitives.
///
/// Connections are directed edges; a node's input is the sum of everything
/// connected into it. `master()` is the final output and is never disposed.
pub trait AudioBackend {
    fn create_instrument(&mut self, spec: &InstrumentSpec) -> Result<NodeHandle, BackendError>;

    fn create_effect(
        &mut self,
        kind: EffectKind,
        params: &EffectParams,
    ) -> Result<NodeHandle, BackendError>;

    /// Gain stage at `gain_db`, silent while `muted`
    fn create_gain(&mut self, gain_db: f32, muted: bool) -> Result<NodeHandle, BackendError>;

    fn master(&self) -> NodeHandle;

    /// Frames per second of the output
    fn sample_rate(&self) -> f32;

    fn connect(&mut self, from: NodeHandle, to: NodeHandle) -> Result<(), BackendError>;

    /// Removing an edge that does not exist is not an error
    fn disconnect(&mut self, from: NodeHandle, to: NodeHandle) -> Result<(), BackendError>;

    /// Release a node. Callers disconnect it first.
    fn dispose(&mut self, node: NodeHandle) -> Result<(), BackendError>;

    fn set_gain(&mut self, node: NodeHandle, gain_db: f32, muted: bool)
    -> Result<(), BackendError>;

    /// Start a voice on an instrument node at an absolute time in seconds
    fn trigger(
        &mut self,
        node: NodeHandle,
        trigger: &VoiceTrigger,
        at_seconds: f64,
    ) -> Result<(), BackendError>;

    /// Release the voices of an instrument node still holding `frequency`
    fn release(
        &mut self,
        node: NodeHandle,
        frequency: Option<f32>,
        at_seconds: f64,
    ) -> Result<(), BackendError> {
        let _ = (node, frequency, at_seconds);
        Err(BackendError::Unsupported("held notes".into()))
    }

    /// Pull the next `out.len()` frames of master output.
    ///
    /// Backends that play through their own device leave the block silent.
    fn render(&mut self, out: &mut [Frame]) {
        out.fill(SILENCE);
    }

    /// Fade a gain stage in from silence after its chain was rebuilt
    fn ramp_in(&mut self, node: NodeHandle) -> Result<(), BackendError> {
        let _ = node;
        Ok(())
    }
}
