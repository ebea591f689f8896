use async_trait::async_trait;
use serde::Serialize;

use crate::chat::{ChatCompletionRequest, ChatCompletionResponse};
use crate::error::PersonaError;

/// Sees every exchange the proxy completed successfully.
///
/// Errors returned here are logged and dropped; the client has its reply
/// either way.
#[async_trait]
pub trait ProxyObserver: Send + Sync {
    async fn on_chat_completion(
        &self,
        _request: &ChatCompletionRequest,
        _response: &ChatCompletionResponse,
    ) -> Result<(), PersonaError> {
        Ok(())
    }

    /// Any other endpoint. `endpoint` is the path below `/v1/`.
    async fn on_exchange(
        &self,
        _endpoint: &str,
        _request: Option<&serde_json::Value>,
        _response: &serde_json::Value,
    ) -> Result<(), PersonaError> {
        Ok(())
    }
}

/// Pretty-prints exchanges at `info` level.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    enabled: bool,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// An observer that logs nothing.
    pub fn all_disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn print<T: Serialize + ?Sized>(&self, label: &str, value: &T) -> Result<(), PersonaError> {
        let pretty = serde_json::to_string_pretty(value)?;
        log::info!("{label}:\n{pretty}");
        Ok(())
    }
}

#[async_trait]
impl ProxyObserver for LoggingObserver {
    async fn on_chat_completion(
        &self,
        request: &ChatCompletionRequest,
        response: &ChatCompletionResponse,
    ) -> Result<(), PersonaError> {
        if !self.enabled {
            return Ok(());
        }
        self.print("chat/completions request", request)?;
        self.print("chat/completions response", response)
    }

    async fn on_exchange(
        &self,
        endpoint: &str,
        request: Option<&serde_json::Value>,
        response: &serde_json::Value,
    ) -> Result<(), PersonaError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(request) = request {
            self.print(&format!("{endpoint} request"), request)?;
        }
        self.print(&format!("{endpoint} response"), response)
    }
}
