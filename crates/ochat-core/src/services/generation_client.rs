use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Message, Role};

/// Raw bytes of one streamed piece of the reply. A fragment may end in the
/// middle of a multi-byte character.
pub type Fragment = Vec<u8>;

/// Lazy, finite sequence of fragments. An `Err` item ends the generation.
pub type FragmentStream = BoxStream<'static, Result<Fragment, GenerationError>>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Protocol(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// One role-tagged turn of the history handed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Everything a backend needs to produce one assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub turns: Vec<ChatTurn>,
    /// Data URLs of the images attached to the latest user turn.
    pub images: Vec<String>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, turns: Vec<ChatTurn>, images: Vec<String>) -> Self {
        Self {
            model: model.into(),
            turns,
            images,
        }
    }

    /// Build a request from the full ordered history; the images come from
    /// the most recent user message.
    pub fn from_messages(model: impl Into<String>, messages: &[Message]) -> Self {
        let images = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.attachments().iter().map(|a| a.url.clone()).collect())
            .unwrap_or_default();

        Self::new(model, messages.iter().map(ChatTurn::from).collect(), images)
    }

    /// Index of the turn the images belong to.
    pub fn image_turn_index(&self) -> Option<usize> {
        if self.images.is_empty() {
            return None;
        }
        self.turns.iter().rposition(|t| t.role == Role::User)
    }
}

/// Seam between the session and a model backend.
///
/// `stream` returns once the request is accepted; fragments then arrive in
/// order. Errors before the first fragment come back as `Err`, later ones as
/// an `Err` item in the stream.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GenerationError>;

    /// Human-readable backend name for notices and logs.
    fn name(&self) -> &str;
}
