//! Speech-to-text (STT) processing
//!
//! Each completed speech segment is uploaded as a WAV file to the configured
//! cloud recognizer and comes back as a single final transcript.

use serde::Deserialize;

use crate::config::{ApiKeys, SttProvider, VoiceConfig};
use crate::{Error, Result};

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

/// Deepgram model used when the configured one is a Whisper name
const DEEPGRAM_DEFAULT_MODEL: &str = "nova-2";

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Transcribes recorded speech segments through a cloud provider
pub struct SpeechToText {
    client: reqwest::Client,
    provider: SttProvider,
    api_key: String,
    model: String,
}

impl SpeechToText {
    /// Create a recognizer for `provider`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(provider: SttProvider, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for speech recognition",
                provider_name(provider)
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
        })
    }

    /// Create the provider selected in the voice config
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let (key, model) = match voice.stt_provider {
            SttProvider::Whisper => (&keys.openai, voice.stt_model.clone()),
            SttProvider::Deepgram => (&keys.deepgram, deepgram_model(&voice.stt_model)),
        };
        Self::new(voice.stt_provider, key.clone().unwrap_or_default(), model)
    }

    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe one WAV-encoded segment
    ///
    /// Returns the trimmed transcript, which is empty when nothing
    /// intelligible was said.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects it
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        let name = provider_name(self.provider);
        tracing::debug!(provider = name, audio_bytes = wav.len(), "transcribing segment");

        let request = match self.provider {
            SttProvider::Whisper => self.whisper_request(wav)?,
            SttProvider::Deepgram => self.deepgram_request(wav),
        };

        let response = request.send().await.map_err(|e| {
            tracing::error!(provider = name, error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(provider = name, status = %status, body = %body, "STT API error");
            return Err(Error::Stt(format!("{name} API error {status}: {body}")));
        }

        let transcript = match self.provider {
            SttProvider::Whisper => parse_whisper(&body)?,
            SttProvider::Deepgram => parse_deepgram(&body)?,
        };

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    fn whisper_request(&self, wav: &[u8]) -> Result<reqwest::RequestBuilder> {
        let file = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        Ok(self
            .client
            .post(WHISPER_URL)
            .bearer_auth(&self.api_key)
            .multipart(form))
    }

    fn deepgram_request(&self, wav: &[u8]) -> reqwest::RequestBuilder {
        self.client
            .post(DEEPGRAM_URL)
            .query(&[("model", self.model.as_str()), ("punctuate", "true")])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(wav.to_vec())
    }
}

const fn provider_name(provider: SttProvider) -> &'static str {
    match provider {
        SttProvider::Whisper => "Whisper",
        SttProvider::Deepgram => "Deepgram",
    }
}

fn parse_whisper(body: &str) -> Result<String> {
    let parsed: WhisperResponse =
        serde_json::from_str(body).map_err(|e| Error::Stt(format!("bad Whisper payload: {e}")))?;
    Ok(parsed.text.trim().to_string())
}

/// First alternative of the first channel; no channels means silence
fn parse_deepgram(body: &str) -> Result<String> {
    let parsed: DeepgramResponse =
        serde_json::from_str(body).map_err(|e| Error::Stt(format!("bad Deepgram payload: {e}")))?;
    Ok(parsed
        .results
        .channels
        .first()
        .and_then(|c| c.alternatives.first())
        .map(|a| a.transcript.trim().to_string())
        .unwrap_or_default())
}

/// Deepgram rejects Whisper model names; fall back to its general model
fn deepgram_model(configured: &str) -> String {
    if configured.starts_with("whisper") {
        DEEPGRAM_DEFAULT_MODEL.to_string()
    } else {
        configured.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let err =
            SpeechToText::new(SttProvider::Whisper, String::new(), "whisper-1".to_string())
                .err()
                .unwrap();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("Whisper")));
    }

    #[test]
    fn test_from_config_picks_provider_key() {
        let voice = VoiceConfig {
            stt_provider: SttProvider::Deepgram,
            ..VoiceConfig::default()
        };
        let keys = ApiKeys {
            openai: Some("sk-openai".to_string()),
            ..ApiKeys::default()
        };
        assert!(SpeechToText::from_config(&voice, &keys).is_err());

        let keys = ApiKeys {
            deepgram: Some("dg-key".to_string()),
            ..ApiKeys::default()
        };
        let stt = SpeechToText::from_config(&voice, &keys).unwrap();
        assert_eq!(stt.provider(), SttProvider::Deepgram);
        assert_eq!(stt.model, DEEPGRAM_DEFAULT_MODEL);
    }

    #[test]
    fn test_deepgram_model_mapping() {
        assert_eq!(deepgram_model("whisper-1"), "nova-2");
        assert_eq!(deepgram_model("nova-2-general"), "nova-2-general");
    }

    #[test]
    fn test_parse_whisper_trims() {
        assert_eq!(parse_whisper(r#"{"text": " a latte please "}"#).unwrap(), "a latte please");
        assert!(matches!(parse_whisper("{}"), Err(Error::Stt(_))));
    }

    #[test]
    fn test_parse_deepgram() {
        let body = r#"{"results": {"channels": [{"alternatives": [
            {"transcript": "a latte please", "confidence": 0.98}
        ]}]}}"#;
        assert_eq!(parse_deepgram(body).unwrap(), "a latte please");

        let silent = r#"{"results": {"channels": []}}"#;
        assert_eq!(parse_deepgram(silent).unwrap(), "");
    }
}
