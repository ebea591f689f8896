use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, Choice,
    CompletionService,
};
use crate::config::DEFAULT_MODEL;
use crate::error::PersonaError;
use crate::streaming::{ResponseCommitter, StreamHandle};

use super::preset::Preset;
use super::state::SessionState;

/// A persona session bound to a completion service.
///
/// Every operation takes the session lock for its whole duration, upstream
/// call included, so two overlapping queries on the same session run one
/// after the other and the second one sees the first one's turn. Clones
/// share the same session.
#[derive(Clone)]
pub struct Conversation {
    id: Uuid,
    service: Arc<dyn CompletionService>,
    state: Arc<Mutex<SessionState>>,
    default_model: String,
}

impl Conversation {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service,
            state: Arc::new(Mutex::new(SessionState::new())),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Model used by `init` calls that pass an empty model name.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service(&self) -> &Arc<dyn CompletionService> {
        &self.service
    }

    pub async fn init(&self, preset: Preset, model: &str) -> Result<(), PersonaError> {
        log::debug!("[{}] init preset={preset} model={model:?}", self.id);
        let mut state = self.state.lock().await;
        state.init(preset, model, &self.default_model)
    }

    /// Resumes a conversation from a saved transcript.
    pub async fn init_with_provided(
        &self,
        model: &str,
        previous: &[ChatMessage],
    ) -> Result<(), PersonaError> {
        log::debug!(
            "[{}] init with {} provided messages",
            self.id,
            previous.len()
        );
        let mut state = self.state.lock().await;
        state.init_with_provided(model, previous, &self.default_model);
        Ok(())
    }

    /// Snapshot of the transcript.
    pub async fn get_conversation(&self) -> Result<Vec<ChatMessage>, PersonaError> {
        let state = self.state.lock().await;
        state.transcript().map(<[ChatMessage]>::to_vec)
    }

    pub async fn query(&self, role: ChatRole, content: &str) -> Result<Vec<Choice>, PersonaError> {
        log::debug!("[{}] query as {role}", self.id);
        let mut state = self.state.lock().await;
        let request = state.prepare_query(role, content)?;
        self.complete(&mut state, request).await
    }

    /// Like [`Conversation::query`] with the role given by name, as it
    /// arrives from a text protocol.
    pub async fn query_as(&self, role: &str, content: &str) -> Result<Vec<Choice>, PersonaError> {
        let role: ChatRole = role.parse()?;
        self.query(role, content).await
    }

    /// Rewrites the message at `index` and asks again.
    pub async fn edit_conversation(
        &self,
        index: usize,
        content: &str,
    ) -> Result<Vec<Choice>, PersonaError> {
        log::debug!("[{}] edit message {index}", self.id);
        let mut state = self.state.lock().await;
        let request = state.prepare_edit(index, content)?;
        self.complete(&mut state, request).await
    }

    pub async fn add_directive(&self, text: &str) -> Result<(), PersonaError> {
        log::debug!("[{}] add directive", self.id);
        let mut state = self.state.lock().await;
        state.add_directive(text)
    }

    /// Picks one of the pending choices by its index.
    pub async fn commit_response(&self, index: u32) -> Result<(), PersonaError> {
        log::debug!("[{}] commit choice {index}", self.id);
        let mut state = self.state.lock().await;
        state.commit_choice(index)
    }

    /// Commits free text as the assistant reply. Stream handles do this on
    /// their own; callers only need it to settle a stream that failed.
    pub async fn commit_response_text(&self, text: String) -> Result<(), PersonaError> {
        commit_text(&self.state, self.id, text).await
    }

    /// Opens a streamed reply to a new user message.
    pub async fn query_stream(&self, content: &str) -> Result<StreamHandle, PersonaError> {
        log::debug!("[{}] stream query", self.id);
        let mut state = self.state.lock().await;
        let request = state.prepare_query(ChatRole::User, content)?;
        self.open_stream(&mut state, request).await
    }

    /// Streaming counterpart of [`Conversation::edit_conversation`].
    pub async fn edit_conversation_stream(
        &self,
        index: usize,
        content: &str,
    ) -> Result<StreamHandle, PersonaError> {
        log::debug!("[{}] stream edit of message {index}", self.id);
        let mut state = self.state.lock().await;
        let request = state.prepare_edit_stream(index, content)?;
        self.open_stream(&mut state, request).await
    }

    pub async fn is_committed(&self) -> bool {
        self.state.lock().await.is_committed()
    }

    pub async fn model(&self) -> String {
        self.state.lock().await.model().to_string()
    }

    pub async fn preset(&self) -> Preset {
        self.state.lock().await.preset().clone()
    }

    pub async fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.state.lock().await.last_request().cloned()
    }

    pub async fn last_response(&self) -> Option<ChatCompletionResponse> {
        self.state.lock().await.last_response().cloned()
    }

    async fn complete(
        &self,
        state: &mut SessionState,
        request: ChatCompletionRequest,
    ) -> Result<Vec<Choice>, PersonaError> {
        log::trace!("[{}] sending {:?}", self.id, request.messages);
        let response = self
            .service
            .create_chat_completion(&request)
            .await
            .inspect_err(|e| log::warn!("[{}] completion failed: {e}", self.id))?;
        let choices = state.apply_response(request, response)?;
        log::info!(
            "[{}] received {} choice(s), committed={}",
            self.id,
            choices.len(),
            state.is_committed()
        );
        Ok(choices)
    }

    async fn open_stream(
        &self,
        state: &mut SessionState,
        request: ChatCompletionRequest,
    ) -> Result<StreamHandle, PersonaError> {
        let request = request.streaming();
        log::trace!("[{}] streaming {:?}", self.id, request.messages);
        let source = self
            .service
            .create_chat_completion_stream(&request)
            .await
            .inspect_err(|e| log::warn!("[{}] stream failed to open: {e}", self.id))?;
        state.begin_stream(request);
        log::info!("[{}] stream opened", self.id);

        let committer = Arc::new(SessionCommitter {
            id: self.id,
            state: self.state.clone(),
        });
        Ok(StreamHandle::new(self.id, source, committer))
    }
}

async fn commit_text(
    state: &Mutex<SessionState>,
    id: Uuid,
    text: String,
) -> Result<(), PersonaError> {
    log::debug!("[{id}] commit {} bytes of text", text.len());
    let mut state = state.lock().await;
    state.commit_text(text)
}

/// Commit capability handed to a stream: it can settle the session, nothing
/// more.
pub(crate) struct SessionCommitter {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
}

#[async_trait]
impl ResponseCommitter for SessionCommitter {
    async fn commit_response(&self, text: String) -> Result<(), PersonaError> {
        commit_text(&self.state, self.id, text).await
    }
}
