use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};

use crate::error::PersonaError;

use super::traits::StreamSource;

type TextStream = Pin<Box<dyn Stream<Item = Result<String, PersonaError>> + Send>>;

/// Adapts any stream of text deltas into a [`StreamSource`].
///
/// Closing drops the inner stream, which releases the HTTP connection
/// behind it.
pub struct BoxedStreamSource {
    inner: Option<TextStream>,
}

impl BoxedStreamSource {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, PersonaError>> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(stream)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

#[async_trait]
impl StreamSource for BoxedStreamSource {
    async fn recv(&mut self) -> Result<Option<String>, PersonaError> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await.transpose(),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.inner = None;
    }
}
