//! OpenAI API client implementation
//!
//! Speaks the `/chat/completions` endpoint (plain and server-sent-event
//! streaming) and forwards any other JSON endpoint verbatim for the proxy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::chat::{
    create_sse_stream, event_data, BoxedStreamSource, ChatCompletionRequest,
    ChatCompletionResponse, CompletionService, StreamResponse, StreamSource,
};
use crate::config::ClientConfig;
use crate::error::PersonaError;

const STREAM_DONE: &str = "[DONE]";

/// Client for the OpenAI REST API
pub struct OpenAI {
    client: reqwest::Client,
    config: ClientConfig,
    base_url: reqwest::Url,
}

impl OpenAI {
    /// Creates a new OpenAI client with the specified configuration.
    pub fn new(config: ClientConfig) -> Result<Self, PersonaError> {
        if config.key().is_empty() {
            return Err(PersonaError::AuthError("Missing OpenAI API key".to_string()));
        }
        let base_url = parse_base_url(&config.base_url)?;
        let mut builder = reqwest::Client::builder();
        if config.disable_host_verify {
            log::warn!("TLS host verification disabled for {base_url}");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Lists the models visible to the configured key.
    pub async fn list_models(&self) -> Result<serde_json::Value, PersonaError> {
        self.forward(Method::GET, "models", None).await
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, PersonaError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| PersonaError::HttpError(e.to_string()))
    }

    fn apply_timeout(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.timeout_seconds {
            Some(timeout) => request.timeout(Duration::from_secs(timeout)),
            None => request,
        }
    }

    fn log_request_payload<T: Serialize>(&self, label: &str, body: &T) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        if let Ok(json) = serde_json::to_string(body) {
            log::trace!("{label}: {json}");
        }
    }

    async fn send<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
        label: &str,
    ) -> Result<reqwest::Response, PersonaError> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(self.config.key());
        if let Some(body) = body {
            self.log_request_payload(label, body);
            request = request.json(body);
        }
        request = self.apply_timeout(request);
        let response = request.send().await?;
        ensure_success_response(response, label).await
    }

    async fn send_and_parse<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        label: &str,
    ) -> Result<T, PersonaError> {
        let response = self.send(method, path, body, label).await?;
        let resp_text = response.text().await?;
        serde_json::from_str(&resp_text).map_err(|e| PersonaError::ResponseFormatError {
            message: format!("Failed to decode {label} response: {e}"),
            raw_response: resp_text,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAI {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, PersonaError> {
        self.send_and_parse(
            Method::POST,
            "chat/completions",
            Some(request),
            "OpenAI chat completion",
        )
        .await
    }

    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Box<dyn StreamSource>, PersonaError> {
        let mut request = request.clone();
        request.stream = true;
        let response = self
            .send(
                Method::POST,
                "chat/completions",
                Some(&request),
                "OpenAI chat completion stream",
            )
            .await?;
        let stream = create_sse_stream(response.bytes_stream(), parse_stream_event);
        Ok(Box::new(BoxedStreamSource::new(stream)))
    }

    async fn forward(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, PersonaError> {
        let label = format!("OpenAI {method} {path}");
        self.send_and_parse(method, path, body.as_ref(), &label).await
    }
}

fn parse_base_url(raw: &str) -> Result<reqwest::Url, PersonaError> {
    // Url::join drops the last path segment unless the base ends with '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    reqwest::Url::parse(&normalized)
        .map_err(|e| PersonaError::ConfigError(format!("invalid base url {raw}: {e}")))
}

async fn ensure_success_response(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, PersonaError> {
    log::debug!("{context} HTTP status: {}", response.status());
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await?;
    Err(PersonaError::ResponseFormatError {
        message: format!("{context} returned error status: {status}"),
        raw_response: error_text,
    })
}

/// Turns one SSE event into the text delta it carries, if any.
fn parse_stream_event(event: &str) -> Result<Option<String>, PersonaError> {
    let Some(data) = event_data(event) else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == STREAM_DONE {
        return Ok(None);
    }
    let chunk: StreamResponse =
        serde_json::from_str(data).map_err(|e| PersonaError::ResponseFormatError {
            message: format!("Failed to decode stream chunk: {e}"),
            raw_response: data.to_string(),
        })?;
    Ok(chunk.delta_text().map(str::to_string))
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
