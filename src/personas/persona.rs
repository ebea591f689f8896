use std::sync::Arc;

use crate::backends::openai::OpenAI;
use crate::chat::{ChatMessage, CompletionService};
use crate::config::ClientConfig;
use crate::conversation::{Conversation, Preset};
use crate::error::PersonaError;

use super::mode::ResponseMode;

/// A conversation paired with the way its replies are delivered.
pub struct Persona<M: ResponseMode> {
    conversation: Conversation,
    mode: M,
}

impl<M: ResponseMode + Default> Persona<M> {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self::from_conversation(Conversation::new(service))
    }

    /// Builds a persona talking to the OpenAI API.
    pub fn with_config(config: &ClientConfig) -> Result<Self, PersonaError> {
        let default_model = config.default_model.clone();
        let backend = OpenAI::new(config.clone())?;
        let conversation = Conversation::new(Arc::new(backend)).with_default_model(default_model);
        Ok(Self::from_conversation(conversation))
    }

    pub fn from_conversation(conversation: Conversation) -> Self {
        Self {
            conversation,
            mode: M::default(),
        }
    }
}

impl<M: ResponseMode> Persona<M> {
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn init(&self, preset: Preset, model: &str) -> Result<(), PersonaError> {
        self.conversation.init(preset, model).await
    }

    pub async fn init_with_provided(
        &self,
        model: &str,
        previous: &[ChatMessage],
    ) -> Result<(), PersonaError> {
        self.conversation.init_with_provided(model, previous).await
    }

    pub async fn get_conversation(&self) -> Result<Vec<ChatMessage>, PersonaError> {
        self.conversation.get_conversation().await
    }

    /// Sends a user message.
    pub async fn query(&self, content: &str) -> Result<M::Output, PersonaError> {
        self.mode.query(&self.conversation, content).await
    }

    pub async fn edit_conversation(
        &self,
        index: usize,
        content: &str,
    ) -> Result<M::Output, PersonaError> {
        self.mode.edit(&self.conversation, index, content).await
    }

    pub async fn add_directive(&self, text: &str) -> Result<(), PersonaError> {
        self.conversation.add_directive(text).await
    }

    pub async fn commit_response(&self, index: u32) -> Result<(), PersonaError> {
        self.conversation.commit_response(index).await
    }
}

impl<M: ResponseMode + Clone> Clone for Persona<M> {
    fn clone(&self) -> Self {
        Self {
            conversation: self.conversation.clone(),
            mode: self.mode.clone(),
        }
    }
}
