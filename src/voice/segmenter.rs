//! Energy-based speech segmentation
//!
//! Cuts the microphone stream into utterance-sized chunks so each one can be
//! sent to speech-to-text on its own. A segment ends after enough speech
//! followed by a short silence.

/// Minimum RMS energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum segment length (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Trailing silence that closes a segment (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Splits a sample stream into speech segments
#[derive(Debug, Default)]
pub struct SpeechSegmenter {
    speaking: bool,
    buffer: Vec<f32>,
    silence: usize,
}

impl SpeechSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of samples
    ///
    /// Returns the completed segment once speech has been followed by enough
    /// silence; the segmenter is then ready for the next one.
    pub fn process(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        if samples.is_empty() {
            return None;
        }

        let energy = rms(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        if !self.speaking {
            if is_speech {
                self.speaking = true;
                self.buffer.clear();
                self.buffer.extend_from_slice(samples);
                self.silence = 0;
                tracing::trace!(energy, "speech started");
            }
            return None;
        }

        self.buffer.extend_from_slice(samples);
        if is_speech {
            self.silence = 0;
        } else {
            self.silence += samples.len();
        }

        if self.silence > SILENCE_SAMPLES && self.buffer.len() > MIN_SPEECH_SAMPLES {
            tracing::debug!(samples = self.buffer.len(), "speech segment complete");
            self.speaking = false;
            self.silence = 0;
            return Some(std::mem::take(&mut self.buffer));
        }

        // Too much silence without enough speech: a click or a cough
        if self.silence > SILENCE_SAMPLES * 2 {
            tracing::trace!("segment too short, discarding");
            self.reset();
        }

        None
    }

    /// Whether a segment is being accumulated
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn reset(&mut self) {
        self.speaking = false;
        self.buffer.clear();
        self.silence = 0;
    }
}

/// RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
