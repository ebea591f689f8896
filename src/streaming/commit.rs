use async_trait::async_trait;

use crate::error::PersonaError;

/// The one thing a [`super::StreamHandle`] may do to its session: hand back
/// the full text of a finished stream.
#[async_trait]
pub trait ResponseCommitter: Send + Sync {
    async fn commit_response(&self, text: String) -> Result<(), PersonaError>;
}
