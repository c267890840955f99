use thiserror::Error;
use tracing::debug;

use super::message::{Attachment, Message};
use super::session_identity::SessionIdentity;

/// A transition the current generation state does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("A generation is already in flight for conversation {conversation_id}")]
    GenerationInFlight { conversation_id: String },

    #[error("No generation is streaming for conversation {conversation_id}")]
    NotStreaming { conversation_id: String },
}

/// Why a generation did not commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    Transport(String),
    Cancelled,
}

/// Lifecycle of the current generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Streaming,
    Committed,
    Failed(GenerationFailure),
}

/// In-memory working state of one tab: the active conversation, its
/// committed turns, the assistant turn being streamed and the images waiting
/// for the next submission.
///
/// The committed list is append-only. A partial assistant turn lives in
/// `in_progress` and only moves into the committed list on commit.
#[derive(Debug)]
pub struct SessionContext {
    identity: SessionIdentity,
    messages: Vec<Message>,
    in_progress: Option<Message>,
    generation: GenerationState,
    pending_images: Vec<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            identity: SessionIdentity::new(),
            messages: Vec::new(),
            in_progress: None,
            generation: GenerationState::Idle,
            pending_images: Vec::new(),
        }
    }

    /// Resume an existing conversation. An empty history gets a fresh id.
    pub fn resume(conversation_id: impl Into<String>, messages: Vec<Message>) -> Self {
        let mut context = Self {
            identity: SessionIdentity::with_id(conversation_id),
            messages,
            in_progress: None,
            generation: GenerationState::Idle,
            pending_images: Vec::new(),
        };
        context.ensure_session_id();
        context
    }

    pub fn conversation_id(&self) -> &str {
        self.identity.id()
    }

    /// Committed turns, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// What the conversation view shows: committed turns plus the in-progress
    /// (or interrupted) assistant turn.
    pub fn rendered_messages(&self) -> Vec<Message> {
        let mut rendered = self.messages.clone();
        if let Some(partial) = &self.in_progress {
            rendered.push(partial.clone());
        }
        rendered
    }

    pub fn in_progress(&self) -> Option<&Message> {
        self.in_progress.as_ref()
    }

    pub fn generation_state(&self) -> &GenerationState {
        &self.generation
    }

    pub fn is_generating(&self) -> bool {
        self.generation == GenerationState::Streaming
    }

    pub fn pending_images(&self) -> &[String] {
        &self.pending_images
    }

    pub fn set_pending_images(&mut self, images: Vec<String>) {
        self.pending_images = images;
    }

    /// Re-issue the conversation id if the committed list is empty.
    pub fn ensure_session_id(&mut self) -> bool {
        self.identity.ensure_session_id(&self.messages)
    }

    /// A conversation may be written only when it has at least one message,
    /// nothing is streaming and the last generation did not fail.
    pub fn can_persist(&self) -> bool {
        !self.messages.is_empty()
            && !matches!(
                self.generation,
                GenerationState::Streaming | GenerationState::Failed(_)
            )
    }

    /// Append the user's turn, consuming the pending images.
    ///
    /// Clears a previous failure (and its partial output) so the new turn can
    /// be persisted. Rejected while a generation is in flight.
    pub fn append_user_message(&mut self, content: &str) -> Result<Message, ContextError> {
        if self.is_generating() {
            return Err(ContextError::GenerationInFlight {
                conversation_id: self.conversation_id().to_string(),
            });
        }

        if self.in_progress.take().is_some() {
            debug!(conversation_id = %self.conversation_id(), "Dropping interrupted partial reply");
        }
        self.generation = GenerationState::Idle;

        let attachments = std::mem::take(&mut self.pending_images)
            .into_iter()
            .map(Attachment::image)
            .collect();
        let message =
            Message::user_with_attachments(content, self.conversation_id(), attachments);
        self.messages.push(message.clone());
        Ok(message)
    }

    /// `Idle → Streaming`.
    pub fn start_streaming(&mut self) -> Result<(), ContextError> {
        if self.is_generating() {
            return Err(ContextError::GenerationInFlight {
                conversation_id: self.conversation_id().to_string(),
            });
        }
        self.in_progress = None;
        self.generation = GenerationState::Streaming;
        Ok(())
    }

    /// Replace the in-progress assistant turn. Ignored unless streaming.
    pub fn update_in_progress(&mut self, message: Message) {
        if self.is_generating() {
            self.in_progress = Some(message);
        }
    }

    /// `Streaming → Committed`: the final assistant turn joins the
    /// committed list.
    pub fn commit(&mut self, message: Message) -> Result<(), ContextError> {
        if !self.is_generating() {
            return Err(ContextError::NotStreaming {
                conversation_id: self.conversation_id().to_string(),
            });
        }
        self.in_progress = None;
        self.messages.push(message);
        self.generation = GenerationState::Committed;
        Ok(())
    }

    /// `Streaming → Failed`. Partial output stays visible, never committed.
    pub fn fail(&mut self, failure: GenerationFailure) {
        if self.is_generating() {
            self.generation = GenerationState::Failed(failure);
        }
    }

    /// Start a new chat: everything is dropped and a fresh id is issued.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.in_progress = None;
        self.generation = GenerationState::Idle;
        self.pending_images.clear();
        self.ensure_session_id();
    }

    /// Swap in the committed list re-read from storage.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.in_progress = None;
        self.generation = GenerationState::Idle;
        self.ensure_session_id();
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
