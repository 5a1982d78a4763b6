//! Chat backend client
//!
//! The remote chat service is an external collaborator: it receives the
//! finalized user message, a window of recent history and the opaque product
//! context, and answers with the reply text and an optional replacement
//! context.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::dialogue::Utterance;

pub use http::HttpBackend;

/// Body of one chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The finalized user utterance
    pub message: String,

    /// Recent history, oldest first, excluding `message`
    pub memory: Vec<Utterance>,

    /// Product context from the previous reply
    pub context_memory: String,
}

/// Successful chat answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Text to speak and log
    pub text: String,

    /// Replacement product context; `None` resets it
    pub product_context: Option<String>,
}

/// Request/response chat exchange
///
/// Implementations distinguish connectivity failures
/// ([`Error::Http`](crate::Error::Http)) from payload failures
/// ([`Error::Backend`](crate::Error::Backend),
/// [`Error::MalformedResponse`](crate::Error::MalformedResponse)); the
/// dialogue loop treats both as a failed dispatch.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Send one chat request
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or its answer is unusable
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply>;
}
