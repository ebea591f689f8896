use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::PersonaError;

/// Boxed stream of parsed server-sent events.
pub type SseStream<T> = Pin<Box<dyn Stream<Item = Result<T, PersonaError>> + Send>>;

pub(crate) fn create_sse_stream<S, E, T, F>(bytes: S, parser: F) -> SseStream<T>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display,
    T: Send + 'static,
    F: Fn(&str) -> Result<Option<T>, PersonaError> + Send + 'static,
{
    let stream = bytes
        .scan(EventSplitter::default(), move |splitter, chunk| {
            let items: Vec<Result<T, PersonaError>> = match chunk {
                Ok(bytes) => {
                    splitter.feed(&bytes);
                    std::iter::from_fn(|| splitter.next_event())
                        .filter_map(|event| parser(&event).transpose())
                        .collect()
                }
                Err(err) => vec![Err(PersonaError::HttpError(err.to_string()))],
            };
            async move { Some(items) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

/// Cuts a byte stream into complete events.
///
/// Bytes are held back until they decode as UTF-8. A trailing `\r` is also
/// held back, since the next chunk may start with the `\n` of its pair. Only
/// the decoded text has its line endings folded to `\n`, so events always end
/// in a blank line no matter where the network split them.
#[derive(Default)]
struct EventSplitter {
    raw: Vec<u8>,
    text: String,
}

impl EventSplitter {
    fn feed(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);

        let mut ready = match std::str::from_utf8(&self.raw) {
            Ok(_) => self.raw.len(),
            // an invalid sequence is passed through as U+FFFD
            Err(err) => err.valid_up_to() + err.error_len().unwrap_or(0),
        };
        if self.raw[..ready].ends_with(b"\r") {
            ready -= 1;
        }
        if ready == 0 {
            return;
        }

        let decoded = String::from_utf8_lossy(&self.raw[..ready]);
        self.text
            .push_str(&decoded.replace("\r\n", "\n").replace('\r', "\n"));
        self.raw.drain(..ready);
    }

    fn next_event(&mut self) -> Option<String> {
        let end = self.text.find("\n\n")? + 2;
        Some(self.text.drain(..end).collect())
    }
}

/// Concatenates the `data:` lines of one event, `None` when there are none.
pub(crate) fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
