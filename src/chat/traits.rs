use async_trait::async_trait;
use reqwest::Method;

use crate::error::PersonaError;

use super::completion::{ChatCompletionRequest, ChatCompletionResponse};

/// An open upstream stream of incremental completion text.
#[async_trait]
pub trait StreamSource: Send {
    /// Next text chunk; `Ok(None)` is the end-of-stream signal.
    async fn recv(&mut self) -> Result<Option<String>, PersonaError>;

    /// Releases the upstream connection. Further `recv` calls report the end
    /// of the stream.
    async fn close(&mut self) {}
}

/// The upstream completion service personas and the proxy talk to.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, PersonaError>;

    async fn create_chat_completion_stream(
        &self,
        _request: &ChatCompletionRequest,
    ) -> Result<Box<dyn StreamSource>, PersonaError> {
        Err(PersonaError::Generic(
            "Streaming not supported by this completion service".to_string(),
        ))
    }

    /// Sends an arbitrary JSON request to `path` (relative to the API base)
    /// and returns the decoded JSON reply.
    async fn forward(
        &self,
        _method: Method,
        _path: &str,
        _body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, PersonaError> {
        Err(PersonaError::Generic(
            "Raw forwarding not supported by this completion service".to_string(),
        ))
    }
}
