//! Error types for `BrewBot`

use thiserror::Error;

/// Result type alias for `BrewBot` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `BrewBot`
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Voice processing error
    #[error("voice error: {0}")]
    Voice(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat backend answered with a non-success status
    #[error("backend error: {0}")]
    Backend(String),

    /// Chat backend answered with a payload we cannot use
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the error means the remote service could not be reached at all
    ///
    /// Payload and status errors are not connectivity errors: the service
    /// answered, just not with something usable.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_errors_are_not_connectivity() {
        assert!(!Error::MalformedResponse("missing response".into()).is_connectivity());
        assert!(!Error::Backend("500".into()).is_connectivity());
        assert!(Error::Io(std::io::Error::other("reset")).is_connectivity());
    }

    #[test]
    fn test_error_display() {
        let err = Error::MalformedResponse("missing `response` field".into());
        assert_eq!(
            err.to_string(),
            "malformed backend response: missing `response` field"
        );
    }
}
