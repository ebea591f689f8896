use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chat::StreamSource;
use crate::error::PersonaError;

use super::commit::ResponseCommitter;

/// One open streamed reply.
///
/// A handle is drained once, usually from its own task, and closed from
/// wherever the caller decides the reply is no longer wanted. Both methods
/// take `&self` so the handle can be shared through an `Arc`.
pub struct StreamHandle {
    session_id: Uuid,
    source: Mutex<Option<Box<dyn StreamSource>>>,
    committer: Arc<dyn ResponseCommitter>,
    started: AtomicBool,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl StreamHandle {
    pub fn new(
        session_id: Uuid,
        source: Box<dyn StreamSource>,
        committer: Arc<dyn ResponseCommitter>,
    ) -> Self {
        Self {
            session_id,
            source: Mutex::new(Some(source)),
            committer,
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the handle has been retired, by a completed drain or by
    /// [`StreamHandle::close`].
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Writes every chunk to `sink` as it arrives, then commits the whole
    /// text to the session.
    ///
    /// Returns `Ok(())` without writing anything if the handle was already
    /// closed. A receive or sink error is returned as is and nothing is
    /// committed, leaving the session pending.
    pub async fn drain<W>(&self, sink: &mut W) -> Result<(), PersonaError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        if self.cancel.is_cancelled() {
            log::debug!("[{}] drain on a closed stream", self.session_id);
            self.finished.cancel();
            return Ok(());
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PersonaError::invalid("stream has already been drained"));
        }
        // fires on every exit, including the drain future being dropped
        let _finished = self.finished.clone().drop_guard();
        let Some(mut source) = self.source.lock().await.take() else {
            return Ok(());
        };

        let result = self.relay(source.as_mut(), sink).await;
        source.close().await;
        result
    }

    async fn relay<W>(
        &self,
        source: &mut dyn StreamSource,
        sink: &mut W,
    ) -> Result<(), PersonaError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut buffer = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    log::debug!("[{}] stream cancelled after {} bytes", self.session_id, buffer.len());
                    return Ok(());
                }
                next = source.recv() => next?,
            };
            let Some(chunk) = next else {
                break;
            };
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            sink.write_all(chunk.as_bytes()).await?;
            buffer.push_str(&chunk);
        }
        sink.flush().await?;

        log::debug!("[{}] stream complete, {} bytes", self.session_id, buffer.len());
        self.committer.commit_response(buffer).await
    }

    /// Cancels the stream and waits until it is fully retired.
    ///
    /// A drain blocked on the upstream wakes up and returns without
    /// committing. When no drain has taken the source yet, the source is
    /// closed here. Calling `close` again, or after a completed drain,
    /// returns `Ok(())` immediately. The session is never committed by
    /// `close`; it stays pending until the caller settles it.
    pub async fn close(&self) -> Result<(), PersonaError> {
        self.cancel.cancel();
        if let Some(mut source) = self.source.lock().await.take() {
            log::debug!("[{}] closing undrained stream", self.session_id);
            source.close().await;
            self.finished.cancel();
        }
        self.finished.cancelled().await;
        Ok(())
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("session_id", &self.session_id)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.finished.is_cancelled())
            .finish()
    }
}
