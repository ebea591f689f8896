use async_trait::async_trait;

use crate::chat::{ChatRole, Choice};
use crate::conversation::Conversation;
use crate::error::PersonaError;
use crate::streaming::StreamHandle;

/// How a persona turns a query into something the caller can use.
#[async_trait]
pub trait ResponseMode: Send + Sync {
    type Output: Send;

    async fn query(
        &self,
        conversation: &Conversation,
        content: &str,
    ) -> Result<Self::Output, PersonaError>;

    async fn edit(
        &self,
        conversation: &Conversation,
        index: usize,
        content: &str,
    ) -> Result<Self::Output, PersonaError>;
}

/// Single string replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMode;

impl TextMode {
    async fn settle(
        conversation: &Conversation,
        choices: Vec<Choice>,
    ) -> Result<String, PersonaError> {
        let several = choices.len() > 1;
        let first = choices.into_iter().next().ok_or(PersonaError::EmptyChoices)?;
        if several {
            log::debug!("settling on choice {} of a multi-choice reply", first.index);
            conversation.commit_response(first.index).await?;
        }
        Ok(first.message.content)
    }
}

#[async_trait]
impl ResponseMode for TextMode {
    type Output = String;

    async fn query(&self, conversation: &Conversation, content: &str) -> Result<String, PersonaError> {
        let choices = conversation.query(ChatRole::User, content).await?;
        Self::settle(conversation, choices).await
    }

    async fn edit(
        &self,
        conversation: &Conversation,
        index: usize,
        content: &str,
    ) -> Result<String, PersonaError> {
        let choices = conversation.edit_conversation(index, content).await?;
        Self::settle(conversation, choices).await
    }
}

/// Full choice lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChoicesMode;

#[async_trait]
impl ResponseMode for ChoicesMode {
    type Output = Vec<Choice>;

    async fn query(
        &self,
        conversation: &Conversation,
        content: &str,
    ) -> Result<Vec<Choice>, PersonaError> {
        conversation.query(ChatRole::User, content).await
    }

    async fn edit(
        &self,
        conversation: &Conversation,
        index: usize,
        content: &str,
    ) -> Result<Vec<Choice>, PersonaError> {
        conversation.edit_conversation(index, content).await
    }
}

/// Streamed replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamMode;

#[async_trait]
impl ResponseMode for StreamMode {
    type Output = StreamHandle;

    async fn query(
        &self,
        conversation: &Conversation,
        content: &str,
    ) -> Result<StreamHandle, PersonaError> {
        conversation.query_stream(content).await
    }

    async fn edit(
        &self,
        conversation: &Conversation,
        index: usize,
        content: &str,
    ) -> Result<StreamHandle, PersonaError> {
        conversation.edit_conversation_stream(index, content).await
    }
}
