//! Cloud TTS plus speaker playback as a [`SpeechOutput`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use super::{AudioPlayback, SpeechCompletion, SpeechOutput, TextToSpeech};

/// Completion slot shared between the speaking task and `cancel`
///
/// Whoever takes the completion out fires it, so it fires exactly once.
type CompletionSlot = Arc<Mutex<Option<SpeechCompletion>>>;

fn fire(slot: &CompletionSlot) {
    let completion = slot.lock().ok().and_then(|mut c| c.take());
    if let Some(completion) = completion {
        completion.complete();
    }
}

struct ActiveSpeech {
    task: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    completion: CompletionSlot,
}

/// Speaks by synthesizing MP3 audio and playing it on the default device
pub struct SynthesizedOutput {
    tts: Arc<TextToSpeech>,
    playback: AudioPlayback,
    active: Option<ActiveSpeech>,
}

impl SynthesizedOutput {
    #[must_use]
    pub fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self {
            tts: Arc::new(tts),
            playback,
            active: None,
        }
    }
}

impl SpeechOutput for SynthesizedOutput {
    fn speak(&mut self, text: &str, on_complete: SpeechCompletion) {
        self.cancel();

        let cancel = Arc::new(AtomicBool::new(false));
        let completion: CompletionSlot = Arc::new(Mutex::new(Some(on_complete)));

        let task = {
            let tts = Arc::clone(&self.tts);
            let playback = self.playback.clone();
            let cancel = Arc::clone(&cancel);
            let completion = Arc::clone(&completion);
            let text = text.to_string();

            tokio::spawn(async move {
                match tts.synthesize(&text).await {
                    Ok(audio) => {
                        let played = tokio::task::spawn_blocking(move || {
                            playback.play_mp3_blocking(&audio, &cancel)
                        })
                        .await;
                        match played {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::warn!(error = %e, "playback failed"),
                            Err(e) => tracing::warn!(error = %e, "playback task panicked"),
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "speech synthesis failed"),
                }
                fire(&completion);
            })
        };

        self.active = Some(ActiveSpeech {
            task,
            cancel,
            completion,
        });
    }

    fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.store(true, Ordering::Release);
            active.task.abort();
            fire(&active.completion);
            tracing::debug!("speech cancelled");
        }
    }

    fn is_speaking(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }
}

impl Drop for SynthesizedOutput {
    fn drop(&mut self) {
        self.cancel();
    }
}
