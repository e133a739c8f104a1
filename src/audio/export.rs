// Audio Export - Offline rendering and encoding
//
// Renders one loop pass plus a release tail through a private render engine,
// as fast as possible, then encodes the result. Unlike live playback there
// is no clock: every trigger of the loop is planned up front.

use crate::audio::dsp_utils::{Frame, SILENCE};
use crate::audio::engine::RenderEngine;
use crate::audio::manager::AudioGraphManager;
use crate::pattern::{AppState, STEPS};
use crate::sequencer::scheduler::{TriggerSink, plan_loop};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;

/// Silence rendered after the last step so releases ring out
pub const RELEASE_TAIL_SECONDS: f64 = 1.0;

/// Length of an export: one loop plus the release tail
pub fn export_duration(state: &AppState) -> f64 {
    STEPS as f64 * state.step_duration() + RELEASE_TAIL_SECONDS
}

/// Audio export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// WAV format (uncompressed PCM)
    Wav,
    /// MP3, encoded outside this crate
    Mp3,
}

impl ExportFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Export error types
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0} encoding is not available")]
    UnsupportedFormat(ExportFormat),

    #[error("unsupported bit depth {0}")]
    UnsupportedBitDepth(u16),

    #[error("invalid duration {0}s: must be > 0")]
    InvalidDuration(f64),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendered stereo frames at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudioBuffer {
    sample_rate: u32,
    frames: Vec<Frame>,
}

impl RawAudioBuffer {
    pub fn new(sample_rate: u32, frames: Vec<Frame>) -> Self {
        Self {
            sample_rate,
            frames,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample on either channel
    pub fn peak(&self) -> f32 {
        self.frames
            .iter()
            .fold(0.0_f32, |peak, (l, r)| peak.max(l.abs()).max(r.abs()))
    }
}

/// Renders a pattern without a live clock
pub trait OfflineRenderer {
    fn render_offline(
        &mut self,
        state: &AppState,
        seconds: f64,
    ) -> Result<RawAudioBuffer, ExportError>;
}

/// Turns rendered audio into file bytes
pub trait Encoder {
    fn encode(&self, buffer: &RawAudioBuffer, format: ExportFormat)
    -> Result<Vec<u8>, ExportError>;
}

/// Progress callback for export (reports 0.0 to 1.0)
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// Offline renderer backed by a fresh `RenderEngine` per export
pub struct EngineRenderer {
    sample_rate: u32,
    block_size: usize,
    progress: Option<ProgressCallback>,
}

impl EngineRenderer {
    /// Frames rendered per block
    pub const DEFAULT_BLOCK_SIZE: usize = 512;

    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl OfflineRenderer for EngineRenderer {
    fn render_offline(
        &mut self,
        state: &AppState,
        seconds: f64,
    ) -> Result<RawAudioBuffer, ExportError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ExportError::InvalidDuration(seconds));
        }

        let mut graph = AudioGraphManager::new(RenderEngine::new(self.sample_rate as f32));
        // failures are logged by the manager; the export renders what could be built
        let _ = graph.sync_all(state);

        let plan = plan_loop(state);
        let mut dropped = 0;
        for trigger in &plan {
            if let Err(miss) = graph.fire(trigger) {
                dropped += 1;
                log::trace!("{}", miss);
            }
        }
        log::debug!(
            "Rendering {:.2}s offline: {} triggers, {} dropped",
            seconds,
            plan.len(),
            dropped
        );

        let total = (seconds * self.sample_rate as f64).round() as usize;
        let mut frames = vec![SILENCE; total];
        let mut rendered = 0;
        for block in frames.chunks_mut(self.block_size.max(1)) {
            graph.backend_mut().render(block);
            rendered += block.len();
            if let Some(progress) = self.progress.as_mut() {
                progress(rendered as f32 / total as f32);
            }
        }

        graph.teardown();
        Ok(RawAudioBuffer::new(self.sample_rate, frames))
    }
}

/// WAV encoder: 16 or 24 bit integer PCM, or 32 bit float
#[derive(Debug, Clone, Copy)]
pub struct WavEncoder {
    bits_per_sample: u16,
}

impl Default for WavEncoder {
    fn default() -> Self {
        Self { bits_per_sample: 16 }
    }
}

impl WavEncoder {
    pub fn new(bits_per_sample: u16) -> Result<Self, ExportError> {
        match bits_per_sample {
            16 | 24 | 32 => Ok(Self { bits_per_sample }),
            other => Err(ExportError::UnsupportedBitDepth(other)),
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }
}

impl Encoder for WavEncoder {
    fn encode(
        &self,
        buffer: &RawAudioBuffer,
        format: ExportFormat,
    ) -> Result<Vec<u8>, ExportError> {
        if format != ExportFormat::Wav {
            return Err(ExportError::UnsupportedFormat(format));
        }

        let float = self.bits_per_sample == 32;
        let spec = WavSpec {
            channels: 2,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: self.bits_per_sample,
            sample_format: if float { SampleFormat::Float } else { SampleFormat::Int },
        };
        let scale = ((1_i64 << (self.bits_per_sample - 1)) - 1) as f32;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &(left, right) in buffer.frames() {
                for sample in [left, right] {
                    let sample = sample.clamp(-1.0, 1.0);
                    if float {
                        writer.write_sample(sample)?;
                    } else {
                        writer.write_sample((sample * scale) as i32)?;
                    }
                }
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

/// Render one loop of `state`, encode it and write it to `path`
///
/// # Returns
/// The number of bytes written
pub fn export_to_file(
    renderer: &mut dyn OfflineRenderer,
    encoder: &dyn Encoder,
    state: &AppState,
    format: ExportFormat,
    path: &Path,
) -> Result<usize, ExportError> {
    let buffer = renderer.render_offline(state, export_duration(state))?;
    let bytes = encoder.encode(&buffer, format)?;
    std::fs::write(path, &bytes)?;
    log::info!(
        "Exported {:.2}s to {} ({} bytes)",
        buffer.duration_seconds(),
        path.display(),
        bytes.len()
    );
    Ok(bytes.len())
}
