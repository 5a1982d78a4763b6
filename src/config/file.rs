//! TOML configuration file loading
//!
//! Supports `~/.config/brewbot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct BrewbotConfigFile {
    /// Turn-taking behavior
    #[serde(default)]
    pub dialogue: DialogueFileConfig,

    /// Chat backend
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Control API server
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Dialogue configuration
#[derive(Debug, Default, Deserialize)]
pub struct DialogueFileConfig {
    /// Phrase that wakes the assistant (e.g. "coffee")
    pub wake_phrase: Option<String>,

    /// Spoken on activation
    pub greeting: Option<String>,

    /// Spoken when the backend cannot be reached
    pub fallback_reply: Option<String>,

    /// Quiet period before an utterance is finalized
    pub debounce_ms: Option<u64>,

    /// Number of recent utterances sent with each request
    pub memory_window: Option<usize>,

    /// Start with speech output muted
    pub start_muted: Option<bool>,
}

/// Chat backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Full URL of the chat endpoint
    pub chat_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Use microphone/speaker (false = console)
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Serve the control API
    pub enabled: Option<bool>,

    /// API server port
    pub port: Option<u16>,
}

/// Load the TOML config file from `BREWBOT_CONFIG` or the standard path
///
/// Returns `BrewbotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> BrewbotConfigFile {
    let path = std::env::var("BREWBOT_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    match path {
        Some(path) if path.exists() => load_from(&path),
        _ => BrewbotConfigFile::default(),
    }
}

/// Load a config file from an explicit path, falling back to defaults on error
pub fn load_from(path: &Path) -> BrewbotConfigFile {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                BrewbotConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            BrewbotConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/brewbot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("brewbot").join("config.toml"))
}
