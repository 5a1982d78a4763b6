//! Dialogue state machine
//!
//! [`DialogueController`] is a pure reducer: it consumes one
//! [`DialogueEvent`] at a time, updates the conversation state it owns and
//! returns the [`Effect`]s the session must perform. It never touches a
//! port, a timer or the network itself, which keeps every transition
//! deterministic and testable without audio hardware.

use serde::Serialize;

use super::memory::memory_window;
use super::{DialogueState, Utterance};
use crate::backend::{ChatReply, ChatRequest};
use crate::config::DialogueConfig;

/// Idle chatter past this many bytes gets cut back to its tail
const IDLE_TRANSCRIPT_LIMIT: usize = 256;

/// Bytes of idle chatter kept after a trim, enough to finish a split wake phrase
const IDLE_TRANSCRIPT_TAIL: usize = 64;

/// Inputs to the state machine
#[derive(Debug, Clone)]
pub enum DialogueEvent {
    /// Speech input published a new live transcript
    TranscriptUpdated(String),

    /// The transcript stayed quiet for the debounce interval
    UtteranceFinalized { settle: u64, text: String },

    /// The chat backend answered turn `turn`
    BackendReplied { turn: u64, reply: ChatReply },

    /// The chat backend could not answer turn `turn`
    BackendFailed { turn: u64, error: String },

    /// Speech output finished (or was cancelled) for `speech`
    SpeechCompleted { speech: u64 },

    /// The user flipped the mute switch
    MuteToggled,

    /// The user sent the assistant back to sleep
    Deactivate,
}

/// Side effects requested by a transition, to be applied in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start continuous speech recognition
    StartListening,
    /// Stop speech recognition
    StopListening,
    /// Reset the live transcript buffer
    ClearTranscript,
    /// Cut the live transcript back to its last `n` bytes
    TrimTranscript(usize),
    /// (Re)start the finalize timer for this candidate text
    ArmFinalize(String),
    /// Drop any pending finalize timer
    CancelFinalize,
    /// Send a chat request; the answer comes back tagged with `turn`
    Dispatch { turn: u64, request: ChatRequest },
    /// Synthesize `text`; completion comes back tagged with `speech`
    Speak { speech: u64, text: String },
    /// Abort the active synthesis
    CancelSpeech,
}

/// Observable snapshot of the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueStatus {
    pub state: DialogueState,
    pub muted: bool,
    pub listening: bool,
    pub speaking: bool,
    pub last_reply: Option<String>,
    pub product_context: String,
    pub history_len: usize,
}

/// Owner of the conversation log, product context, mute flag and state
#[derive(Debug)]
pub struct DialogueController {
    config: DialogueConfig,
    state: DialogueState,
    log: Vec<Utterance>,
    product_context: String,
    muted: bool,
    listening: bool,
    /// Token of the synthesis whose completion resumes input
    speaking: Option<u64>,
    /// Token of the dispatch whose answer is still wanted
    in_flight: Option<u64>,
    next_token: u64,
    last_reply: Option<String>,
}

impl DialogueController {
    #[must_use]
    pub fn new(config: DialogueConfig) -> Self {
        let muted = config.start_muted;
        Self {
            config,
            state: DialogueState::Idle,
            log: Vec::new(),
            product_context: String::new(),
            muted,
            listening: false,
            speaking: None,
            in_flight: None,
            next_token: 0,
            last_reply: None,
        }
    }

    /// Effects that bring the session up: listen for the wake phrase
    pub fn start(&mut self) -> Vec<Effect> {
        self.listening = true;
        vec![Effect::StartListening]
    }

    /// Apply one event and return the effects it requires
    pub fn handle(&mut self, event: DialogueEvent) -> Vec<Effect> {
        let before = self.state;
        let mut fx = Vec::new();

        match event {
            DialogueEvent::TranscriptUpdated(text) => self.on_transcript(&text, &mut fx),
            DialogueEvent::UtteranceFinalized { text, .. } => self.on_finalized(&text, &mut fx),
            DialogueEvent::BackendReplied { turn, reply } => self.on_reply(turn, reply, &mut fx),
            DialogueEvent::BackendFailed { turn, error } => self.on_failure(turn, &error, &mut fx),
            DialogueEvent::SpeechCompleted { speech } => self.on_speech_completed(speech, &mut fx),
            DialogueEvent::MuteToggled => self.on_mute_toggled(&mut fx),
            DialogueEvent::Deactivate => self.on_deactivate(&mut fx),
        }

        if before != self.state {
            tracing::debug!(from = %before, to = %self.state, "dialogue transition");
        }
        debug_assert!(
            !(self.listening && self.speaking.is_some()),
            "speech input and output active together"
        );

        fx
    }

    fn on_transcript(&mut self, text: &str, fx: &mut Vec<Effect>) {
        let cleaned = text.trim().to_lowercase();
        if cleaned.is_empty() {
            return;
        }

        match self.state {
            DialogueState::Idle => {
                if cleaned.contains(&self.config.wake_phrase) {
                    tracing::info!(transcript = %text.trim(), "wake phrase detected");
                    self.activate(fx);
                } else if text.len() > IDLE_TRANSCRIPT_LIMIT {
                    let keep = IDLE_TRANSCRIPT_TAIL.max(self.config.wake_phrase.len());
                    tracing::trace!(len = text.len(), keep, "trimming idle transcript");
                    fx.push(Effect::TrimTranscript(keep));
                }
            }
            DialogueState::AwaitingUserInput | DialogueState::CapturingUtterance => {
                if cleaned == self.config.wake_phrase {
                    tracing::debug!("ignoring repeated wake phrase");
                    return;
                }
                fx.push(Effect::ArmFinalize(text.trim().to_string()));
                self.state = DialogueState::CapturingUtterance;
            }
            _ => {
                tracing::trace!(state = %self.state, "transcript while input stopped, ignoring");
            }
        }
    }

    fn activate(&mut self, fx: &mut Vec<Effect>) {
        self.stop_input(fx);
        fx.push(Effect::ClearTranscript);

        let greeting = self.config.greeting.clone();
        self.last_reply = Some(greeting.clone());

        if self.muted {
            self.resume_input(fx);
        } else {
            self.speak(greeting, fx);
            self.state = DialogueState::Activating;
        }
    }

    fn on_finalized(&mut self, text: &str, fx: &mut Vec<Effect>) {
        if self.state != DialogueState::CapturingUtterance {
            tracing::debug!(state = %self.state, "finalized utterance outside capture, ignoring");
            return;
        }

        let message = text.trim();
        if message.is_empty() {
            self.state = DialogueState::AwaitingUserInput;
            return;
        }

        tracing::info!(utterance = %message, "user utterance finalized");

        let memory = memory_window(&self.log, self.config.memory_window).to_vec();
        self.log.push(Utterance::user(message));

        self.stop_input(fx);
        fx.push(Effect::ClearTranscript);

        let turn = self.next_token();
        self.in_flight = Some(turn);
        fx.push(Effect::Dispatch {
            turn,
            request: ChatRequest {
                message: message.to_string(),
                memory,
                context_memory: self.product_context.clone(),
            },
        });
        self.state = DialogueState::Dispatching;
    }

    fn on_reply(&mut self, turn: u64, reply: ChatReply, fx: &mut Vec<Effect>) {
        if !self.claim_turn(turn) {
            return;
        }

        tracing::info!(
            turn,
            reply = %reply.text,
            product_context = reply.product_context.as_deref().unwrap_or_default(),
            "backend replied"
        );

        self.product_context = reply.product_context.unwrap_or_default();
        self.log.push(Utterance::bot(reply.text.clone()));
        self.last_reply = Some(reply.text.clone());
        self.respond(reply.text, fx);
    }

    fn on_failure(&mut self, turn: u64, error: &str, fx: &mut Vec<Effect>) {
        if !self.claim_turn(turn) {
            return;
        }

        tracing::warn!(turn, error, "dispatch failed, speaking fallback");

        let fallback = self.config.fallback_reply.clone();
        self.last_reply = Some(fallback.clone());
        self.respond(fallback, fx);
    }

    /// Accept the answer for `turn` only if it is the one in flight
    fn claim_turn(&mut self, turn: u64) -> bool {
        if self.state == DialogueState::Dispatching && self.in_flight == Some(turn) {
            self.in_flight = None;
            true
        } else {
            tracing::warn!(
                turn,
                in_flight = ?self.in_flight,
                state = %self.state,
                "discarding stale backend result"
            );
            false
        }
    }

    fn respond(&mut self, text: String, fx: &mut Vec<Effect>) {
        if self.muted {
            self.resume_input(fx);
        } else {
            self.speak(text, fx);
            self.state = DialogueState::SpeakingResponse;
        }
    }

    fn on_speech_completed(&mut self, speech: u64, fx: &mut Vec<Effect>) {
        if self.speaking != Some(speech) || !self.state.is_speaking() {
            tracing::debug!(speech, "ignoring completion of inactive speech");
            return;
        }

        self.speaking = None;
        self.resume_input(fx);
    }

    fn on_mute_toggled(&mut self, fx: &mut Vec<Effect>) {
        self.muted = !self.muted;
        tracing::info!(muted = self.muted, "mute toggled");

        if self.muted && self.speaking.is_some() {
            fx.push(Effect::CancelSpeech);
            self.speaking = None;
            self.resume_input(fx);
        }
    }

    fn on_deactivate(&mut self, fx: &mut Vec<Effect>) {
        if self.state == DialogueState::Idle {
            return;
        }

        tracing::info!(state = %self.state, "deactivating");

        if self.state == DialogueState::CapturingUtterance {
            fx.push(Effect::CancelFinalize);
        }
        if self.speaking.take().is_some() {
            fx.push(Effect::CancelSpeech);
        }
        self.in_flight = None;

        fx.push(Effect::ClearTranscript);
        if !self.listening {
            fx.push(Effect::StartListening);
            self.listening = true;
        }
        self.state = DialogueState::Idle;
    }

    fn stop_input(&mut self, fx: &mut Vec<Effect>) {
        fx.push(Effect::StopListening);
        self.listening = false;
    }

    fn resume_input(&mut self, fx: &mut Vec<Effect>) {
        fx.push(Effect::ClearTranscript);
        fx.push(Effect::StartListening);
        self.listening = true;
        self.state = DialogueState::AwaitingUserInput;
    }

    fn speak(&mut self, text: String, fx: &mut Vec<Effect>) {
        if self.listening {
            self.stop_input(fx);
        }
        let speech = self.next_token();
        self.speaking = Some(speech);
        fx.push(Effect::Speak { speech, text });
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    #[must_use]
    pub const fn state(&self) -> DialogueState {
        self.state
    }

    /// Full conversation history, oldest first
    #[must_use]
    pub fn log(&self) -> &[Utterance] {
        &self.log
    }

    #[must_use]
    pub fn product_context(&self) -> &str {
        &self.product_context
    }

    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    #[must_use]
    pub fn status(&self) -> DialogueStatus {
        DialogueStatus {
            state: self.state,
            muted: self.muted,
            listening: self.listening,
            speaking: self.speaking.is_some(),
            last_reply: self.last_reply.clone(),
            product_context: self.product_context.clone(),
            history_len: self.log.len(),
        }
    }
}
