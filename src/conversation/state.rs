use crate::chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, Choice};
use crate::error::PersonaError;

use super::preset::Preset;

/// What a session is waiting for while its last reply is unreconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    /// Several choices came back; `commit_response(index)` picks one
    Choices,
    /// A stream is open; its drain commits the accumulated text
    Stream,
}

/// Transcript and commit bookkeeping of one persona session.
///
/// Every validation happens before any field is touched, so a rejected call
/// leaves the state exactly as it was. Upstream calls never run from here:
/// the manager asks for a request, performs the call, then hands the result
/// back through [`SessionState::apply_response`] or
/// [`SessionState::begin_stream`].
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    model: String,
    preset: Preset,
    transcript: Option<Vec<ChatMessage>>,
    committed: bool,
    pending: Option<Pending>,
    last_request: Option<ChatCompletionRequest>,
    last_response: Option<ChatCompletionResponse>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(
        &mut self,
        preset: Preset,
        model: &str,
        default_model: &str,
    ) -> Result<(), PersonaError> {
        if self.committed {
            log::debug!("init has already been called");
            return Err(PersonaError::AlreadyInitialized);
        }
        self.model = pick_model(model, default_model);
        let transcript = match preset.system_prompt() {
            Some(prompt) => vec![ChatMessage::system().content(prompt).build()],
            None => Vec::new(),
        };
        self.transcript = Some(transcript);
        self.preset = preset;
        self.committed = true;
        self.pending = None;
        Ok(())
    }

    /// Replaces the transcript with a copy of `previous`, e.g. to resume a
    /// saved conversation.
    pub fn init_with_provided(&mut self, model: &str, previous: &[ChatMessage], default_model: &str) {
        self.model = pick_model(model, default_model);
        // the prompt, if any, is already part of `previous`
        self.preset = Preset::Default;
        self.transcript = Some(previous.to_vec());
        self.committed = true;
        self.pending = None;
        self.last_request = None;
        self.last_response = None;
    }

    pub fn transcript(&self) -> Result<&[ChatMessage], PersonaError> {
        self.transcript
            .as_deref()
            .ok_or_else(|| PersonaError::invalid("conversation has not been initialized"))
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    pub fn last_request(&self) -> Option<&ChatCompletionRequest> {
        self.last_request.as_ref()
    }

    pub fn last_response(&self) -> Option<&ChatCompletionResponse> {
        self.last_response.as_ref()
    }

    /// Builds the request for a new turn: the current transcript plus the
    /// new message.
    pub fn prepare_query(
        &self,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatCompletionRequest, PersonaError> {
        self.ensure_committed()?;
        if content.is_empty() {
            log::debug!("statement is empty");
            return Err(PersonaError::invalid("statement is empty"));
        }
        let mut working = self.transcript()?.to_vec();
        working.push(ChatMessage::new(role, content));
        Ok(self.request_for(working))
    }

    /// Builds the request that replays the transcript with the message at
    /// `index` rewritten. A trailing assistant reply is dropped so it can be
    /// derived again; messages between `index` and the end are resent as
    /// they are.
    pub fn prepare_edit(
        &self,
        index: usize,
        content: &str,
    ) -> Result<ChatCompletionRequest, PersonaError> {
        if self.pending == Some(Pending::Stream) {
            return Err(PersonaError::invalid(
                "a streamed response has not been committed yet",
            ));
        }
        let transcript = self.transcript()?;
        if index >= transcript.len() {
            log::debug!(
                "invalid index ({index}) must be between 0 and {}",
                transcript.len().saturating_sub(1)
            );
            return Err(PersonaError::invalid(format!(
                "index {index} out of range for {} messages",
                transcript.len()
            )));
        }
        if content.is_empty() {
            log::debug!("statement is empty");
            return Err(PersonaError::invalid("statement is empty"));
        }
        if transcript[index].is_assistant() {
            log::debug!("unable to edit the response to queries/prompts");
            return Err(PersonaError::invalid(
                "assistant replies cannot be edited, only derived again",
            ));
        }

        let last = transcript.len() - 1;
        let mut working = Vec::with_capacity(transcript.len());
        for (pos, msg) in transcript.iter().enumerate() {
            if pos == last && msg.is_assistant() {
                log::trace!("skip last response for a redo");
                break;
            }
            if pos == index {
                log::trace!("replacing {:?} with {:?}", msg.content, content);
                working.push(ChatMessage {
                    role: msg.role,
                    content: content.to_string(),
                    name: msg.name.clone(),
                });
            } else {
                working.push(msg.clone());
            }
        }
        Ok(self.request_for(working))
    }

    /// Same as [`SessionState::prepare_edit`] but also requires the session
    /// to be settled, as opening a stream does.
    pub fn prepare_edit_stream(
        &self,
        index: usize,
        content: &str,
    ) -> Result<ChatCompletionRequest, PersonaError> {
        self.ensure_committed()?;
        self.prepare_edit(index, content)
    }

    /// Swaps in the request's transcript once the upstream call succeeded. A
    /// single choice is committed right away; several leave the session
    /// pending until [`SessionState::commit_choice`].
    pub fn apply_response(
        &mut self,
        request: ChatCompletionRequest,
        response: ChatCompletionResponse,
    ) -> Result<Vec<Choice>, PersonaError> {
        if response.choices.is_empty() {
            log::debug!("upstream returned no choices, transcript left untouched");
            return Err(PersonaError::EmptyChoices);
        }
        let mut transcript = request.messages.clone();
        let single = response.choices.len() == 1;
        if single {
            transcript.push(response.choices[0].message.clone());
        }
        let choices = response.choices.clone();

        self.transcript = Some(transcript);
        self.committed = single;
        self.pending = if single { None } else { Some(Pending::Choices) };
        self.last_request = Some(request);
        self.last_response = Some(response);
        Ok(choices)
    }

    /// Swaps in the request's transcript once a stream was opened.
    pub fn begin_stream(&mut self, request: ChatCompletionRequest) {
        self.transcript = Some(request.messages.clone());
        self.committed = false;
        self.pending = Some(Pending::Stream);
        self.last_request = Some(request);
        self.last_response = None;
    }

    /// Appends a system message without contacting the upstream.
    pub fn add_directive(&mut self, text: &str) -> Result<(), PersonaError> {
        if text.is_empty() {
            log::debug!("directives is empty");
            return Err(PersonaError::invalid("directive is empty"));
        }
        let transcript = self
            .transcript
            .as_mut()
            .ok_or_else(|| PersonaError::invalid("conversation has not been initialized"))?;
        transcript.push(ChatMessage::system().content(text).build());
        Ok(())
    }

    /// Commits the pending choice carrying `index`.
    pub fn commit_choice(&mut self, index: u32) -> Result<(), PersonaError> {
        if self.committed {
            log::debug!("already appended response");
            return Err(PersonaError::invalid("no response is pending"));
        }
        if self.pending != Some(Pending::Choices) {
            return Err(PersonaError::invalid("no choice list is pending"));
        }
        let response = self
            .last_response
            .as_ref()
            .ok_or_else(|| PersonaError::invalid("response is empty"))?;
        if response.choices.is_empty() {
            return Err(PersonaError::invalid("no choices were generated"));
        }
        let message = response
            .choice(index)
            .map(|choice| choice.message.clone())
            .ok_or_else(|| {
                log::debug!("response {index} not found");
                PersonaError::invalid(format!("choice {index} not found"))
            })?;

        self.push_committed(message)
    }

    /// Commits free text as the assistant reply, as a finished stream does.
    pub fn commit_text(&mut self, text: String) -> Result<(), PersonaError> {
        if self.committed {
            log::debug!("already appended response");
            return Err(PersonaError::invalid("no response is pending"));
        }
        self.push_committed(ChatMessage::assistant().content(text).build())
    }

    fn push_committed(&mut self, message: ChatMessage) -> Result<(), PersonaError> {
        let transcript = self
            .transcript
            .as_mut()
            .ok_or_else(|| PersonaError::invalid("conversation has not been initialized"))?;
        transcript.push(message);
        self.committed = true;
        self.pending = None;
        Ok(())
    }

    fn ensure_committed(&self) -> Result<(), PersonaError> {
        if !self.committed {
            log::debug!("the response hasn't been appended yet");
            return Err(PersonaError::invalid(
                "previous response has not been committed",
            ));
        }
        Ok(())
    }

    fn request_for(&self, messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest::new(self.model.clone(), messages)
    }
}

fn pick_model(model: &str, default_model: &str) -> String {
    if model.is_empty() {
        default_model.to_string()
    } else {
        model.to_string()
    }
}
