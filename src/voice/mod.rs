//! Voice I/O
//!
//! Defines the two ports the dialogue loop drives, [`SpeechInput`] and
//! [`SpeechOutput`], plus the adapters behind them: microphone capture with
//! cloud speech-to-text, cloud text-to-speech with speaker playback, and a
//! console pair for running without audio hardware.

mod capture;
mod console;
mod microphone;
mod playback;
mod segmenter;
mod stt;
mod synthesized;
mod tts;

use std::fmt;

use tokio::sync::watch;

use crate::Result;

pub use capture::{AudioCapture, CaptureTap, SAMPLE_RATE, samples_to_wav};
pub use console::{ConsoleInput, ConsoleOutput, TranscriptFeed};
pub use microphone::MicrophoneInput;
pub use playback::AudioPlayback;
pub use segmenter::{SpeechSegmenter, rms};
pub use stt::SpeechToText;
pub use synthesized::SynthesizedOutput;
pub use tts::TextToSpeech;

/// Observable state of a speech input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTranscript {
    /// Everything recognized since the last buffer clear
    pub text: String,

    /// Whether recognition is running
    pub listening: bool,
}

impl LiveTranscript {
    /// Append a recognized fragment, separated by a space
    pub fn append(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    /// Drop all but the last `keep` bytes, never splitting a character
    ///
    /// Returns whether anything was removed.
    pub fn keep_tail(&mut self, keep: usize) -> bool {
        if self.text.len() <= keep {
            return false;
        }
        let mut start = self.text.len() - keep;
        while !self.text.is_char_boundary(start) {
            start += 1;
        }
        let tail = self.text[start..].trim_start();
        self.text = tail.to_string();
        true
    }
}

/// Continuous speech-to-text source
///
/// Updates are published through the [`watch`] receiver returned by
/// [`transcript`](Self::transcript).
pub trait SpeechInput {
    /// Start recognition; `continuous` keeps it running across pauses
    ///
    /// # Errors
    ///
    /// Returns error if the underlying device cannot be started
    fn start(&mut self, continuous: bool) -> Result<()>;

    /// Stop recognition; results of audio heard before this call are dropped
    fn stop(&mut self);

    /// Reset the live transcript to empty
    fn clear_buffer(&mut self);

    /// Shorten the live transcript to its last `keep` bytes
    ///
    /// Audio still being recognized is left alone.
    fn trim_buffer(&mut self, keep: usize);

    /// Subscribe to transcript updates
    fn transcript(&self) -> watch::Receiver<LiveTranscript>;
}

/// Text-to-speech sink
pub trait SpeechOutput {
    /// Speak `text`, firing `on_complete` when done
    ///
    /// Failures are logged and still complete, so the caller always regains
    /// the turn.
    fn speak(&mut self, text: &str, on_complete: SpeechCompletion);

    /// Stop the active utterance; its completion has fired when this returns
    fn cancel(&mut self);

    fn is_speaking(&self) -> bool;
}

/// One-shot completion callback for [`SpeechOutput::speak`]
///
/// Fires at most once: either through [`complete`](Self::complete) or, if
/// the owner drops it first, on drop.
pub struct SpeechCompletion(Option<Box<dyn FnOnce() + Send>>);

impl SpeechCompletion {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(callback)))
    }

    pub fn complete(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(callback) = self.0.take() {
            callback();
        }
    }
}

impl Drop for SpeechCompletion {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for SpeechCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechCompletion")
            .field("pending", &self.0.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting() -> (SpeechCompletion, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let completion = SpeechCompletion::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (completion, count)
    }

    #[test]
    fn test_completion_fires_once() {
        let (completion, count) = counting();
        completion.complete();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_completion_still_fires() {
        let (completion, count) = counting();
        drop(completion);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transcript_append() {
        let mut live = LiveTranscript::default();
        live.append("I'd like ");
        live.append("   ");
        live.append("a latte");
        assert_eq!(live.text, "I'd like a latte");
    }

    #[test]
    fn test_keep_tail() {
        let mut live = LiveTranscript {
            text: "one two three".to_string(),
            listening: true,
        };
        assert!(!live.keep_tail(20));
        assert_eq!(live.text, "one two three");

        assert!(live.keep_tail(6));
        assert_eq!(live.text, "three");
        assert!(live.listening);
    }

    #[test]
    fn test_keep_tail_respects_char_boundaries() {
        let mut live = LiveTranscript {
            text: "crème brûlée".to_string(),
            listening: true,
        };
        assert!(live.keep_tail(5));
        assert_eq!(live.text, "lée");
    }
}
