//! Configuration management for `BrewBot`

pub mod file;

use std::time::Duration;

use crate::dialogue::{DEBOUNCE_INTERVAL, FALLBACK_REPLY, GREETING, MEMORY_WINDOW, WAKE_PHRASE};
use crate::{Error, Result};

use self::file::BrewbotConfigFile;

/// `BrewBot` configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Turn-taking behavior
    pub dialogue: DialogueConfig,

    /// Chat backend
    pub backend: BackendConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,
}

/// Dialogue (turn-taking) configuration
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// Wake phrase, lower-cased and trimmed
    pub wake_phrase: String,

    /// Spoken when the wake phrase is heard
    pub greeting: String,

    /// Spoken when a dispatch fails
    pub fallback_reply: String,

    /// Quiet period before the transcript is finalized
    pub debounce: Duration,

    /// Recent utterances sent with every request
    pub memory_window: usize,

    /// Start with speech output muted
    pub start_muted: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            wake_phrase: WAKE_PHRASE.to_string(),
            greeting: GREETING.to_string(),
            fallback_reply: FALLBACK_REPLY.to_string(),
            debounce: DEBOUNCE_INTERVAL,
            memory_window: MEMORY_WINDOW,
            start_muted: false,
        }
    }
}

/// Chat backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Chat endpoint URL
    pub chat_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

/// STT provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    #[default]
    Whisper,
    Deepgram,
}

/// TTS provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Use microphone and speakers; console adapters otherwise
    pub enabled: bool,

    /// STT provider
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS provider
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "`eleven_monolingual_v1`")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_provider: SttProvider::default(),
            stt_model: "whisper-1".to_string(),
            tts_provider: TtsProvider::default(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (for Whisper and TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Serve the control API
    pub enabled: bool,

    /// Port to listen on
    pub port: u16,
}

/// Default chat endpoint
const DEFAULT_CHAT_URL: &str = "http://localhost:8080/chat";

/// Default chat request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default API server port
const DEFAULT_API_PORT: u16 = 18790;

impl Config {
    /// Load configuration from the environment and the optional config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an env lookup (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_sources(
        fc: BrewbotConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = DialogueConfig::default();

        let dialogue = DialogueConfig {
            wake_phrase: env("BREWBOT_WAKE_PHRASE")
                .or(fc.dialogue.wake_phrase)
                .map_or(defaults.wake_phrase, |w| w.trim().to_lowercase()),
            greeting: fc.dialogue.greeting.unwrap_or(defaults.greeting),
            fallback_reply: fc.dialogue.fallback_reply.unwrap_or(defaults.fallback_reply),
            debounce: env("BREWBOT_DEBOUNCE_MS")
                .and_then(|s| s.parse().ok())
                .or(fc.dialogue.debounce_ms)
                .map_or(defaults.debounce, Duration::from_millis),
            memory_window: fc.dialogue.memory_window.unwrap_or(defaults.memory_window),
            start_muted: env("BREWBOT_MUTED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.dialogue.start_muted)
                .unwrap_or(defaults.start_muted),
        };

        let backend = BackendConfig {
            chat_url: env("BREWBOT_CHAT_URL")
                .or(fc.backend.chat_url)
                .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            timeout: Duration::from_secs(
                env("BREWBOT_CHAT_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .or(fc.backend.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(voice_defaults.enabled),
            stt_provider: parse_stt_provider(fc.voice.stt_provider.as_deref())?,
            stt_model: env("BREWBOT_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(voice_defaults.stt_model),
            tts_provider: parse_tts_provider(fc.voice.tts_provider.as_deref())?,
            tts_model: env("BREWBOT_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(voice_defaults.tts_model),
            tts_voice: fc.voice.tts_voice.unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(voice_defaults.tts_speed),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        let api_server = ApiServerConfig {
            enabled: fc.server.enabled.unwrap_or(true),
            port: env("BREWBOT_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_API_PORT),
        };

        let config = Self {
            dialogue,
            backend,
            voice,
            api_keys,
            api_server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the dialogue loop depends on
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.dialogue.wake_phrase.trim().is_empty() {
            return Err(Error::Config("wake phrase must not be empty".to_string()));
        }
        if self.dialogue.debounce.is_zero() {
            return Err(Error::Config("debounce interval must be positive".to_string()));
        }
        if self.dialogue.memory_window == 0 {
            return Err(Error::Config("memory window must hold at least one utterance".to_string()));
        }
        if self.backend.chat_url.trim().is_empty() {
            return Err(Error::Config("chat URL must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_stt_provider(value: Option<&str>) -> Result<SttProvider> {
    match value.map(str::to_lowercase).as_deref() {
        None | Some("whisper" | "openai") => Ok(SttProvider::Whisper),
        Some("deepgram") => Ok(SttProvider::Deepgram),
        Some(other) => Err(Error::Config(format!("unknown STT provider: {other}"))),
    }
}

fn parse_tts_provider(value: Option<&str>) -> Result<TtsProvider> {
    match value.map(str::to_lowercase).as_deref() {
        None | Some("openai") => Ok(TtsProvider::OpenAi),
        Some("elevenlabs") => Ok(TtsProvider::ElevenLabs),
        Some(other) => Err(Error::Config(format!("unknown TTS provider: {other}"))),
    }
}
