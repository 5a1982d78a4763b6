//! Turn-taking dialogue core
//!
//! Coordinates speech input, utterance finalization, the chat backend and
//! speech output into a single-flight conversation loop:
//!
//! ```text
//!   Idle ──wake phrase──▶ Activating ──greeting done──▶ AwaitingUserInput
//!                                                          │      ▲
//!                                               transcript │      │ speech done
//!                                                          ▼      │
//!                  CapturingUtterance ──settled──▶ Dispatching ──▶ SpeakingResponse
//! ```
//!
//! Speech input is always stopped before dispatching or speaking and only
//! resumed after the matching completion, so the assistant never transcribes
//! its own voice.

pub mod controller;
pub mod debounce;
pub mod memory;
pub mod session;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use controller::{DialogueController, DialogueEvent, DialogueStatus, Effect};
pub use debounce::TranscriptDebouncer;
pub use memory::memory_window;
pub use session::{DialogueHandle, DialogueSession};

/// Phrase that activates the assistant from `Idle`
pub const WAKE_PHRASE: &str = "coffee";

/// Quiet period after the last transcript update before it is finalized
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(1500);

/// Number of recent utterances sent with each request
pub const MEMORY_WINDOW: usize = 6;

/// Spoken on activation
pub const GREETING: &str = "Hello! How can I help you today?";

/// Spoken when the chat backend cannot be reached
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I couldn't connect to the server. Please try again later.";

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// One attributed unit of conversation text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    pub text: String,
}

impl Utterance {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            text: text.into(),
        }
    }
}

/// Current phase of the conversation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    /// Listening for the wake phrase only
    Idle,
    /// Speaking the greeting
    Activating,
    /// Listening for the user's request
    AwaitingUserInput,
    /// Transcript is settling; a finalize timer is pending
    CapturingUtterance,
    /// Waiting for the chat backend
    Dispatching,
    /// Speaking the reply (or fallback)
    SpeakingResponse,
}

impl DialogueState {
    /// Whether speech output owns the audio channel in this state
    #[must_use]
    pub const fn is_speaking(self) -> bool {
        matches!(self, Self::Activating | Self::SpeakingResponse)
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Activating => "activating",
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::CapturingUtterance => "capturing_utterance",
            Self::Dispatching => "dispatching",
            Self::SpeakingResponse => "speaking_response",
        };
        f.write_str(name)
    }
}
