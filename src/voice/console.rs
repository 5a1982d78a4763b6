//! Console speech adapters
//!
//! Text typed on stdin stands in for recognized speech and replies are
//! printed instead of spoken. Used with `--console` and when voice is
//! disabled in the config.

use std::sync::Arc;

use tokio::sync::watch;

use super::{LiveTranscript, SpeechCompletion, SpeechInput, SpeechOutput};
use crate::Result;

/// [`SpeechInput`] fed through a [`TranscriptFeed`]
#[derive(Debug)]
pub struct ConsoleInput {
    transcript: Arc<watch::Sender<LiveTranscript>>,
}

/// Writer half of a [`ConsoleInput`]
#[derive(Debug, Clone)]
pub struct TranscriptFeed {
    transcript: Arc<watch::Sender<LiveTranscript>>,
}

impl ConsoleInput {
    #[must_use]
    pub fn new() -> (Self, TranscriptFeed) {
        let (tx, _) = watch::channel(LiveTranscript::default());
        let transcript = Arc::new(tx);
        (
            Self {
                transcript: Arc::clone(&transcript),
            },
            TranscriptFeed { transcript },
        )
    }
}

impl TranscriptFeed {
    /// Append a line as if it had just been recognized
    ///
    /// Returns `false` (and drops the line) while input is stopped.
    pub fn push(&self, line: &str) -> bool {
        let mut accepted = false;
        self.transcript.send_if_modified(|t| {
            if !t.listening {
                return false;
            }
            accepted = true;
            let before = t.text.len();
            t.append(line);
            t.text.len() != before
        });
        accepted
    }
}

impl SpeechInput for ConsoleInput {
    fn start(&mut self, _continuous: bool) -> Result<()> {
        self.transcript.send_if_modified(|t| !std::mem::replace(&mut t.listening, true));
        Ok(())
    }

    fn stop(&mut self) {
        self.transcript.send_if_modified(|t| std::mem::replace(&mut t.listening, false));
    }

    fn clear_buffer(&mut self) {
        self.transcript.send_if_modified(|t| {
            let had_text = !t.text.is_empty();
            t.text.clear();
            had_text
        });
    }

    fn trim_buffer(&mut self, keep: usize) {
        self.transcript.send_if_modified(|t| t.keep_tail(keep));
    }

    fn transcript(&self) -> watch::Receiver<LiveTranscript> {
        self.transcript.subscribe()
    }
}

/// [`SpeechOutput`] that prints replies and completes immediately
#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl SpeechOutput for ConsoleOutput {
    fn speak(&mut self, text: &str, on_complete: SpeechCompletion) {
        println!("brewbot> {text}");
        on_complete.complete();
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}
