//! JSON-over-HTTP chat backend

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{BackendClient, ChatReply, ChatRequest};
use crate::config::BackendConfig;
use crate::{Error, Result};

/// Answer payload as sent by the chat service
#[derive(Deserialize)]
struct ChatResponse {
    response: Option<String>,
    #[serde(default)]
    product_context: Option<String>,
}

/// Chat backend reached over HTTP POST
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    /// Create a client for `url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Create a client from the backend section of the config
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(config.chat_url.clone(), config.timeout)
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply> {
        tracing::debug!(
            url = %self.url,
            utterance = %request.message,
            memory = request.memory.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                e
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "chat backend error");
            return Err(Error::Backend(format!("chat backend error {status}: {body}")));
        }

        parse_reply(&body)
    }
}

/// Decode a successful response body
fn parse_reply(body: &str) -> Result<ChatReply> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;

    let text = parsed
        .response
        .ok_or_else(|| Error::MalformedResponse("missing `response` field".to_string()))?;

    Ok(ChatReply {
        text,
        product_context: parsed.product_context,
    })
}
