//! `BrewBot` - voice-activated front-end for a coffee ordering chat service
//!
//! This library provides:
//! - The turn-taking dialogue state machine and its async driver
//! - Speech input/output ports with microphone, speaker and console adapters
//! - A JSON-over-HTTP client for the chat backend
//! - A small HTTP control API (status, mute, deactivate)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  SpeechInput (mic + STT │ console)   Control API     │
//! └──────────┬───────────────────────────────┬───────────┘
//!            │ live transcript               │ mute / deactivate
//! ┌──────────▼───────────────────────────────▼───────────┐
//! │  DialogueSession                                     │
//! │    TranscriptDebouncer → DialogueController (reducer) │
//! └──────────┬───────────────────────────────┬───────────┘
//!            │ ChatRequest                   │ speak / cancel
//! ┌──────────▼───────────┐      ┌────────────▼───────────┐
//! │  BackendClient (HTTP) │      │ SpeechOutput (TTS │ tty)│
//! └──────────────────────┘      └────────────────────────┘
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod daemon;
pub mod dialogue;
pub mod error;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use dialogue::{DialogueController, DialogueHandle, DialogueSession, DialogueState};
pub use error::{Error, Result};
