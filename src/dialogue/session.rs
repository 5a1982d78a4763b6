//! Async driver for the dialogue state machine
//!
//! [`DialogueSession`] owns the speech ports, the debouncer and the event
//! queue. It feeds transcript updates, timer fires, backend results and
//! speech completions into the controller one at a time and performs the
//! effects it returns.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::Instrument;
use uuid::Uuid;

use super::{DialogueController, DialogueEvent, DialogueStatus, Effect, TranscriptDebouncer};
use crate::Result;
use crate::backend::{BackendClient, ChatRequest};
use crate::config::DialogueConfig;
use crate::voice::{SpeechCompletion, SpeechInput, SpeechOutput};

/// Cloneable control surface for a running session
#[derive(Debug, Clone)]
pub struct DialogueHandle {
    events: mpsc::UnboundedSender<DialogueEvent>,
    status: watch::Receiver<DialogueStatus>,
}

impl DialogueHandle {
    /// Flip the mute flag
    ///
    /// Returns `false` if the session has shut down.
    pub fn toggle_mute(&self) -> bool {
        self.events.send(DialogueEvent::MuteToggled).is_ok()
    }

    /// Send the assistant back to wake-phrase listening
    ///
    /// Returns `false` if the session has shut down.
    pub fn deactivate(&self) -> bool {
        self.events.send(DialogueEvent::Deactivate).is_ok()
    }

    /// Whether the session is still consuming events
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }

    /// Latest published status
    #[must_use]
    pub fn status(&self) -> DialogueStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified after every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DialogueStatus> {
        self.status.clone()
    }
}

/// Runs one conversation loop against a pair of speech ports and a backend
pub struct DialogueSession {
    controller: DialogueController,
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    backend: Arc<dyn BackendClient>,
    debouncer: TranscriptDebouncer,
    events_tx: mpsc::UnboundedSender<DialogueEvent>,
    events_rx: mpsc::UnboundedReceiver<DialogueEvent>,
    status: watch::Sender<DialogueStatus>,
    /// Transcript text last forwarded to the controller
    seen: String,
}

impl DialogueSession {
    #[must_use]
    pub fn new(
        config: DialogueConfig,
        input: Box<dyn SpeechInput>,
        output: Box<dyn SpeechOutput>,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let debouncer = TranscriptDebouncer::new(config.debounce, events_tx.clone());
        let controller = DialogueController::new(config);
        let (status, _) = watch::channel(controller.status());

        Self {
            controller,
            input,
            output,
            backend,
            debouncer,
            events_tx,
            events_rx,
            status,
            seen: String::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> DialogueHandle {
        DialogueHandle {
            events: self.events_tx.clone(),
            status: self.status.subscribe(),
        }
    }

    /// Run until `shutdown` fires (or its sender is dropped)
    ///
    /// Speech ports are usually tied to the thread that created them, so
    /// this future is not `Send`; drive it from the main task or a
    /// `LocalSet`.
    ///
    /// # Errors
    ///
    /// Returns error if speech input cannot be started
    #[allow(clippy::future_not_send)]
    pub async fn run(self, shutdown: mpsc::Receiver<()>) -> Result<()> {
        let span = tracing::info_span!("dialogue", session = %Uuid::new_v4());
        self.run_inner(shutdown).instrument(span).await
    }

    #[allow(clippy::future_not_send)]
    async fn run_inner(mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        let mut transcript = self.input.transcript();

        for effect in self.controller.start() {
            match effect {
                Effect::StartListening => self.input.start(true)?,
                other => self.apply(other),
            }
        }
        self.publish();

        tracing::info!(status = ?self.controller.status(), "dialogue session started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("dialogue session shutting down");
                    break;
                }
                changed = transcript.changed() => {
                    if changed.is_err() {
                        tracing::warn!("speech input closed");
                        break;
                    }
                    let text = transcript.borrow_and_update().text.clone();
                    if text != self.seen {
                        self.seen.clone_from(&text);
                        self.process(DialogueEvent::TranscriptUpdated(text));
                    }
                }
                Some(event) = self.events_rx.recv() => self.process(event),
            }
        }

        self.debouncer.cancel();
        if self.output.is_speaking() {
            tracing::debug!("cutting off speech for shutdown");
            self.output.cancel();
        }
        self.input.stop();
        Ok(())
    }

    fn process(&mut self, event: DialogueEvent) {
        tracing::trace!(?event, "dialogue event");

        if let DialogueEvent::UtteranceFinalized { settle, .. } = &event {
            if !self.debouncer.accept(*settle) {
                return;
            }
        }

        for effect in self.controller.handle(event) {
            self.apply(effect);
        }
        self.publish();
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::StartListening => {
                if let Err(e) = self.input.start(true) {
                    tracing::error!(error = %e, "failed to resume speech input");
                }
            }
            Effect::StopListening => self.input.stop(),
            Effect::ClearTranscript => {
                self.input.clear_buffer();
                self.seen.clear();
            }
            Effect::TrimTranscript(keep) => self.input.trim_buffer(keep),
            Effect::ArmFinalize(text) => {
                self.debouncer.on_update(text);
            }
            Effect::CancelFinalize => self.debouncer.cancel(),
            Effect::Dispatch { turn, request } => self.dispatch(turn, request),
            Effect::Speak { speech, text } => {
                let events = self.events_tx.clone();
                let completion = SpeechCompletion::new(move || {
                    let _ = events.send(DialogueEvent::SpeechCompleted { speech });
                });
                self.output.speak(&text, completion);
            }
            Effect::CancelSpeech => self.output.cancel(),
        }
    }

    fn dispatch(&self, turn: u64, request: ChatRequest) {
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();

        tokio::spawn(
            async move {
                let event = match backend.send(&request).await {
                    Ok(reply) => DialogueEvent::BackendReplied { turn, reply },
                    Err(e) => {
                        tracing::warn!(
                            turn,
                            error = %e,
                            connectivity = e.is_connectivity(),
                            "chat dispatch failed"
                        );
                        DialogueEvent::BackendFailed {
                            turn,
                            error: e.to_string(),
                        }
                    }
                };
                let _ = events.send(event);
            }
            .in_current_span(),
        );
    }

    fn publish(&self) {
        let status = self.controller.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
