// Instrument - Fixed pool of voices sharing one synthesis model

use super::voice::{Voice, VoiceModel, VoiceTrigger};
use crate::audio::dsp_utils::{Frame, db_to_gain};

/// Default polyphony per instrument
pub const MAX_VOICES: usize = 16;

/// Polyphonic instrument. Triggers beyond the pool size steal a voice.
pub struct Instrument {
    model: VoiceModel,
    voices: Vec<Voice>,
    /// Incremented on each trigger for voice stealing priority
    age_counter: u64,
    level: f32,
}

impl Instrument {
    /// # Arguments
    /// * `model` - Synthesis model for every voice
    /// * `volume_db` - Output level of the whole instrument
    /// * `polyphony` - Voice pool size (at least 1)
    pub fn new(model: VoiceModel, volume_db: f32, polyphony: usize, sample_rate: f32) -> Self {
        let voices = (0..polyphony.max(1))
            .map(|i| Voice::new(model, sample_rate, i as u64 + 1))
            .collect();
        Self {
            model,
            voices,
            age_counter: 0,
            level: db_to_gain(volume_db),
        }
    }

    pub fn model(&self) -> &VoiceModel {
        &self.model
    }

    pub fn trigger(&mut self, trigger: &VoiceTrigger) {
        self.age_counter = self.age_counter.wrapping_add(1);
        let index = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .unwrap_or_else(|| self.find_voice_to_steal());
        self.voices[index].trigger(trigger, self.age_counter);
    }

    /// Releasing voices first, then the oldest
    fn find_voice_to_steal(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| (!v.is_releasing(), v.age()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Release the voices still holding `frequency`
    pub fn release(&mut self, frequency: Option<f32>) {
        self.voices
            .iter_mut()
            .filter(|v| v.is_holding(frequency))
            .for_each(Voice::release);
    }

    /// Release every sounding voice
    pub fn release_all(&mut self) {
        self.voices.iter_mut().for_each(Voice::release);
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.voices.iter_mut().map(Voice::next_sample).sum::<f32>() * self.level
    }

    /// Overwrite `out` with the instrument's output (mono on both channels)
    pub fn render(&mut self, out: &mut [Frame]) {
        for frame in out.iter_mut() {
            let s = self.next_sample();
            *frame = (s, s);
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }
}
