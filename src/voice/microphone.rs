//! Microphone-backed speech input
//!
//! Capture runs on the cpal callback thread; a worker task drains the
//! capture buffer, cuts it into speech segments, transcribes each segment
//! and appends the text to the live transcript.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{
    AudioCapture, CaptureTap, LiveTranscript, SAMPLE_RATE, SpeechInput, SpeechSegmenter,
    SpeechToText, samples_to_wav,
};
use crate::Result;

/// How often the worker drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// [`SpeechInput`] over the default microphone and a cloud STT provider
pub struct MicrophoneInput {
    capture: AudioCapture,
    stt: Arc<SpeechToText>,
    transcript: Arc<watch::Sender<LiveTranscript>>,
    /// Bumped on every stop; transcriptions from an older epoch are dropped
    epoch: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl MicrophoneInput {
    #[must_use]
    pub fn new(capture: AudioCapture, stt: SpeechToText) -> Self {
        let (transcript, _) = watch::channel(LiveTranscript::default());
        Self {
            capture,
            stt: Arc::new(stt),
            transcript: Arc::new(transcript),
            epoch: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }
}

impl SpeechInput for MicrophoneInput {
    fn start(&mut self, continuous: bool) -> Result<()> {
        if self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }

        self.capture.start()?;

        let worker = Worker {
            tap: self.capture.tap(),
            stt: Arc::clone(&self.stt),
            transcript: Arc::clone(&self.transcript),
            epoch: Arc::clone(&self.epoch),
            started_at: self.epoch.load(Ordering::Acquire),
            continuous,
        };
        self.worker = Some(tokio::spawn(worker.run()));

        self.transcript.send_modify(|t| t.listening = true);
        tracing::debug!(continuous, "microphone input started");
        Ok(())
    }

    fn stop(&mut self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.capture.stop();
        self.transcript.send_if_modified(|t| std::mem::replace(&mut t.listening, false));
        tracing::debug!("microphone input stopped");
    }

    fn clear_buffer(&mut self) {
        self.capture.tap().clear();
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

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drains capture, segments and transcribes until aborted
struct Worker {
    tap: CaptureTap,
    stt: Arc<SpeechToText>,
    transcript: Arc<watch::Sender<LiveTranscript>>,
    epoch: Arc<AtomicU64>,
    started_at: u64,
    continuous: bool,
}

impl Worker {
    async fn run(self) {
        let mut segmenter = SpeechSegmenter::new();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            ticker.tick().await;

            let Some(segment) = segmenter.process(&self.tap.take()) else {
                continue;
            };

            let text = match self.transcribe(&segment).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "transcription failed, dropping segment");
                    continue;
                }
            };

            if self.epoch.load(Ordering::Acquire) != self.started_at {
                tracing::debug!("dropping transcription from before stop");
                return;
            }

            self.transcript.send_modify(|t| t.append(&text));

            if !self.continuous {
                self.transcript.send_modify(|t| t.listening = false);
                return;
            }
        }
    }

    async fn transcribe(&self, segment: &[f32]) -> Result<String> {
        let wav = samples_to_wav(segment, SAMPLE_RATE)?;
        self.stt.transcribe(&wav).await
    }
}
