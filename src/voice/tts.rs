//! Text-to-speech (TTS) processing
//!
//! Replies are synthesized to MP3 by a cloud provider and handed to
//! [`AudioPlayback`](super::AudioPlayback).

use serde::Serialize;

use crate::config::{ApiKeys, TtsProvider, VoiceConfig};
use crate::{Error, Result};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_SPEECH_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// ElevenLabs model used when the configured one is an `OpenAI` name
const ELEVENLABS_DEFAULT_MODEL: &str = "eleven_monolingual_v1";

/// Speed range accepted by the `OpenAI` speech endpoint
const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;

#[derive(Serialize)]
struct OpenAiSpeech<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

#[derive(Serialize)]
struct ElevenLabsSpeech<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    provider: TtsProvider,
    api_key: String,
    model: String,
    voice: String,
    /// Only honored by `OpenAI`
    speed: f32,
}

impl TextToSpeech {
    /// Create a synthesizer for `provider`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or `speed` is outside 0.25..=4.0
    pub fn new(
        provider: TtsProvider,
        api_key: String,
        model: String,
        voice: String,
        speed: f32,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for speech output",
                provider_name(provider)
            )));
        }
        if !SPEED_RANGE.contains(&speed) {
            return Err(Error::Config(format!("TTS speed {speed} outside 0.25..=4.0")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
            voice,
            speed,
        })
    }

    /// Create the provider selected in the voice config
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing or the speed is
    /// out of range
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let (key, model) = match voice.tts_provider {
            TtsProvider::OpenAi => (&keys.openai, voice.tts_model.clone()),
            TtsProvider::ElevenLabs => (&keys.elevenlabs, elevenlabs_model(&voice.tts_model)),
        };
        Self::new(
            voice.tts_provider,
            key.clone().unwrap_or_default(),
            model,
            voice.tts_voice.clone(),
            voice.tts_speed,
        )
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects it
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let name = provider_name(self.provider);
        tracing::debug!(provider = name, chars = text.len(), "synthesizing speech");

        let request = match self.provider {
            TtsProvider::OpenAi => self
                .client
                .post(OPENAI_SPEECH_URL)
                .bearer_auth(&self.api_key)
                .json(&OpenAiSpeech {
                    model: &self.model,
                    input: text,
                    voice: &self.voice,
                    speed: self.speed,
                }),
            TtsProvider::ElevenLabs => self
                .client
                .post(format!("{ELEVENLABS_SPEECH_URL}/{}", self.voice))
                .header("xi-api-key", &self.api_key)
                .header("Accept", "audio/mpeg")
                .json(&ElevenLabsSpeech {
                    text,
                    model_id: &self.model,
                }),
        };

        let response = request.send().await.map_err(|e| {
            tracing::error!(provider = name, error = %e, "speech request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(provider = name, status = %status, body = %body, "TTS API error");
            return Err(Error::Tts(format!("{name} TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(provider = name, audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

const fn provider_name(provider: TtsProvider) -> &'static str {
    match provider {
        TtsProvider::OpenAi => "OpenAI",
        TtsProvider::ElevenLabs => "ElevenLabs",
    }
}

/// `OpenAI` model names mean nothing to ElevenLabs
fn elevenlabs_model(configured: &str) -> String {
    if configured.starts_with("tts-") {
        ELEVENLABS_DEFAULT_MODEL.to_string()
    } else {
        configured.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai(speed: f32) -> Result<TextToSpeech> {
        TextToSpeech::new(
            TtsProvider::OpenAi,
            "sk-test".to_string(),
            "tts-1".to_string(),
            "alloy".to_string(),
            speed,
        )
    }

    #[test]
    fn test_speed_range() {
        assert!(matches!(openai(9.0), Err(Error::Config(_))));
        assert!(matches!(openai(0.1), Err(Error::Config(_))));
        assert!(openai(0.25).is_ok());
        assert!(openai(4.0).is_ok());
    }

    #[test]
    fn test_from_config_requires_key() {
        let voice = VoiceConfig {
            tts_provider: TtsProvider::ElevenLabs,
            tts_voice: "rachel".to_string(),
            ..VoiceConfig::default()
        };
        let err = TextToSpeech::from_config(&voice, &ApiKeys::default()).err().unwrap();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("ElevenLabs")));
    }

    #[test]
    fn test_elevenlabs_model_mapping() {
        assert_eq!(elevenlabs_model("tts-1"), "eleven_monolingual_v1");
        assert_eq!(elevenlabs_model("eleven_turbo_v2"), "eleven_turbo_v2");
    }

    #[test]
    fn test_openai_request_body() {
        let body = serde_json::to_value(OpenAiSpeech {
            model: "tts-1",
            input: "Coming right up!",
            voice: "alloy",
            speed: 1.0,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "tts-1",
                "input": "Coming right up!",
                "voice": "alloy",
                "speed": 1.0
            })
        );
    }
}
