//! In-memory completion service shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use crate::chat::{
    BoxedStreamSource, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice,
    CompletionService, StreamSource,
};
use crate::error::PersonaError;

/// Builds a response carrying one assistant choice per entry.
pub(crate) fn reply(contents: &[&str]) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "chatcmpl-test".into(),
        object: "chat.completion".into(),
        model: "gpt-3.5-turbo".into(),
        choices: contents
            .iter()
            .enumerate()
            .map(|(i, content)| Choice {
                index: i as u32,
                message: ChatMessage::assistant().content(*content).build(),
                finish_reason: Some("stop".into()),
            })
            .collect(),
        ..Default::default()
    }
}

/// Plays back queued replies in order. With nothing queued it echoes the
/// last message of the request.
#[derive(Default)]
pub(crate) struct ScriptedService {
    replies: Mutex<VecDeque<Result<ChatCompletionResponse, PersonaError>>>,
    streams: Mutex<VecDeque<Vec<Result<String, PersonaError>>>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    forwarded: Mutex<Vec<(Method, String, Option<serde_json::Value>)>>,
    delay: Option<Duration>,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn push_reply(&self, contents: &[&str]) {
        self.replies.lock().unwrap().push_back(Ok(reply(contents)));
    }

    pub(crate) fn push_error(&self, err: PersonaError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn push_stream(&self, chunks: &[&str]) {
        let chunks = chunks.iter().map(|c| Ok(c.to_string())).collect();
        self.streams.lock().unwrap().push_back(chunks);
    }

    pub(crate) fn push_failing_stream(&self, chunks: &[&str], err: PersonaError) {
        let mut items: Vec<_> = chunks.iter().map(|c| Ok(c.to_string())).collect();
        items.push(Err(err));
        self.streams.lock().unwrap().push_back(items);
    }

    pub(crate) fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn forwarded(&self) -> Vec<(Method, String, Option<serde_json::Value>)> {
        self.forwarded.lock().unwrap().clone()
    }

    fn record(&self, request: &ChatCompletionRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, PersonaError> {
        self.record(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.replies.lock().unwrap().pop_front();
        match queued {
            Some(scripted) => scripted,
            None => {
                let last = request
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                let echoed = format!("echo: {last}");
                Ok(reply(&[echoed.as_str()]))
            }
        }
    }

    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Box<dyn StreamSource>, PersonaError> {
        self.record(request);
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PersonaError::HttpError("no stream scripted".into()))?;
        Ok(Box::new(BoxedStreamSource::new(futures::stream::iter(
            chunks,
        ))))
    }

    async fn forward(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, PersonaError> {
        self.forwarded
            .lock()
            .unwrap()
            .push((method.clone(), path.to_string(), body.clone()));
        Ok(json!({
            "method": method.as_str(),
            "path": path,
            "body": body,
        }))
    }
}
